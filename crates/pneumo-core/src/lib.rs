//! # Pneumo Core
//!
//! 网关的核心模块，提供错误定义、领域模型、字段提取和归一化工具。

pub mod error;
pub mod extract;
pub mod models;
pub mod utils;

pub use error::{GatewayError, Result};
pub use extract::{FieldError, FieldProblem, MappingError, RawRecord};
pub use models::*;
