//! 预诊断查询

use crate::normalize;
use crate::upstream::UpstreamStore;
use pneumo_core::{GatewayError, PreDiagnostic, Result};
use std::sync::Arc;

/// 预诊断服务，严格映射，不填充默认值
#[derive(Clone)]
pub struct PreDiagnosticService {
    upstream: Arc<dyn UpstreamStore>,
}

impl PreDiagnosticService {
    pub fn new(upstream: Arc<dyn UpstreamStore>) -> Self {
        Self { upstream }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<PreDiagnostic> {
        if id.trim().is_empty() {
            return Err(GatewayError::validation("prediagnostic id is required"));
        }

        let record = self.upstream.prediagnostic(id).await?;
        let pre_diagnostic = normalize::strict_pre_diagnostic(id, &record).map_err(|e| {
            tracing::warn!(prediagnostic_id = id, error = %e, "Rejecting incomplete prediagnostic");
            GatewayError::from(e)
        })?;

        Ok(pre_diagnostic)
    }
}
