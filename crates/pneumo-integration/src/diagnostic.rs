//! 诊断提交服务

use crate::upstream::{DiagnosticSubmission, UpstreamStore};
use chrono::Utc;
use pneumo_core::extract::{lenient_id, lenient_string};
use pneumo_core::{Approval, DiagnosticResponse, RawRecord};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// 上游确认中缺少 `message` 时的默认文本
pub const DEFAULT_ACK_MESSAGE: &str = "Diagnostic processed";

/// 上游即使 `success` 缺失或为false，这些消息也表示已保存
const SUCCESS_MESSAGES: [&str; 3] = [
    "Diagnostic saved successfully",
    "Diagnóstico guardado exitosamente",
    "Diagnostic created successfully",
];

/// 诊断提交服务
///
/// 输入校验失败和上游失败都以 `success = false` 的响应返回，而不是错误。
#[derive(Clone)]
pub struct DiagnosticService {
    upstream: Arc<dyn UpstreamStore>,
}

impl DiagnosticService {
    pub fn new(upstream: Arc<dyn UpstreamStore>) -> Self {
        Self { upstream }
    }

    pub async fn create_diagnostic(
        &self,
        case_id: &str,
        approval: &str,
        comment: &str,
    ) -> DiagnosticResponse {
        if case_id.trim().is_empty() {
            return DiagnosticResponse::rejected("Case id is required");
        }
        let Some(approval) = Approval::from_input(approval) else {
            return DiagnosticResponse::rejected("Approval must be 'Yes' or 'No'");
        };
        if comment.trim().is_empty() {
            return DiagnosticResponse::rejected("Comment is required");
        }

        let submission = DiagnosticSubmission {
            case_id: case_id.to_string(),
            approval: approval.as_wire(),
            comment: comment.to_string(),
            review_timestamp: Utc::now().timestamp().to_string(),
        };

        match self.upstream.submit_diagnostic(&submission).await {
            Ok(ack) => {
                let response = interpret_ack(&ack);
                info!(
                    case_id,
                    approval = approval.as_str(),
                    success = response.success,
                    "Diagnostic submitted"
                );
                response
            }
            Err(e) => {
                warn!(case_id, error = %e, "Diagnostic submission failed");
                DiagnosticResponse::rejected(format!("Failed to create diagnostic: {}", e))
            }
        }
    }
}

/// 解析上游确认
fn interpret_ack(ack: &RawRecord) -> DiagnosticResponse {
    let message = lenient_string(ack, "message").unwrap_or_else(|| DEFAULT_ACK_MESSAGE.to_string());
    let success = matches!(ack.get("success"), Some(Value::Bool(true)))
        || SUCCESS_MESSAGES.contains(&message.as_str());

    DiagnosticResponse {
        success,
        message,
        diagnostic_id: lenient_id(ack, &["diagnostic_id"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, FakeUpstream};
    use serde_json::json;

    #[tokio::test]
    async fn test_invalid_approval_never_calls_upstream() {
        let upstream = Arc::new(FakeUpstream::new());
        let service = DiagnosticService::new(upstream.clone());

        for approval in ["Si", "yes", "", "true"] {
            let response = service.create_diagnostic("c-1", approval, "Looks fine").await;
            assert!(!response.success);
            assert!(response.diagnostic_id.is_none());
        }
        assert_eq!(upstream.calls("submit_diagnostic"), 0);
    }

    #[tokio::test]
    async fn test_empty_comment_is_rejected() {
        let upstream = Arc::new(FakeUpstream::new());
        let service = DiagnosticService::new(upstream.clone());

        let response = service.create_diagnostic("c-1", "Yes", "   ").await;
        assert!(!response.success);
        assert_eq!(response.message, "Comment is required");
        assert_eq!(upstream.calls("submit_diagnostic"), 0);
    }

    #[tokio::test]
    async fn test_submission_body() {
        let upstream = Arc::new(FakeUpstream::new());
        *upstream.ack.lock().unwrap() = Some(record(json!({
            "success": true,
            "message": "stored",
            "diagnostic_id": "d-9"
        })));
        let service = DiagnosticService::new(upstream.clone());

        let response = service.create_diagnostic("c-1", "No", "Normal lungs").await;
        assert!(response.success);
        assert_eq!(response.message, "stored");
        assert_eq!(response.diagnostic_id.as_deref(), Some("d-9"));

        let submissions = upstream.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].case_id, "c-1");
        assert!(!submissions[0].approval);
        assert!(submissions[0].review_timestamp.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_in_band() {
        let upstream = Arc::new(FakeUpstream::new().failing(503));
        let service = DiagnosticService::new(upstream.clone());

        let response = service.create_diagnostic("c-1", "Yes", "Opacity").await;
        assert!(!response.success);
        assert!(response.message.starts_with("Failed to create diagnostic"));
        assert_eq!(upstream.calls("submit_diagnostic"), 1);
    }

    #[test]
    fn test_interpret_ack() {
        let ack = interpret_ack(&record(json!({ "message": "Diagnostic saved successfully" })));
        assert!(ack.success);

        let ack = interpret_ack(&record(json!({
            "success": false,
            "message": "Diagnóstico guardado exitosamente"
        })));
        assert!(ack.success);

        let ack = interpret_ack(&record(json!({})));
        assert!(!ack.success);
        assert_eq!(ack.message, DEFAULT_ACK_MESSAGE);

        let ack = interpret_ack(&record(json!({ "success": false, "message": "Case locked" })));
        assert!(!ack.success);
    }
}
