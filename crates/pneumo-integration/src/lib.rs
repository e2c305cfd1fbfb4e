//! # Pneumo上游集成模块
//!
//! 负责与上游病例/诊断服务交互，并将其松散的JSON记录整理为稳定的领域模型：
//! - 上游HTTP客户端
//! - 病例聚合（列表与详情）
//! - 诊断提交
//! - 预诊断严格映射

pub mod cases;
pub mod diagnostic;
pub mod normalize;
pub mod prediagnostic;
pub mod upstream;

pub use cases::CaseService;
pub use diagnostic::DiagnosticService;
pub use prediagnostic::PreDiagnosticService;
pub use upstream::{DiagnosticSubmission, HttpUpstreamClient, UpstreamStore};

#[cfg(test)]
pub(crate) mod testing;
