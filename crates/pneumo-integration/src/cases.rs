//! 病例聚合服务

use crate::normalize;
use crate::upstream::UpstreamStore;
use pneumo_core::extract::lenient_id;
use pneumo_core::{Case, CaseDetail, GatewayError, RawRecord, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 病例聚合服务
///
/// 每次请求都直接读取上游，不做缓存。
#[derive(Clone)]
pub struct CaseService {
    upstream: Arc<dyn UpstreamStore>,
    image_base_url: String,
}

impl CaseService {
    pub fn new(upstream: Arc<dyn UpstreamStore>, image_base_url: impl Into<String>) -> Self {
        Self {
            upstream,
            image_base_url: image_base_url.into(),
        }
    }

    /// 当前用户的病例列表
    ///
    /// 上游404表示"尚无病例"，返回空列表。记录中的 `user_id` 与请求者不一致时丢弃该记录。
    pub async fn list_cases_for_user(&self, user_id: &str) -> Result<Vec<Case>> {
        require_id("user id", user_id)?;

        let Some(records) = self.upstream.cases_for_user(user_id).await? else {
            info!(user_id, "No cases found for user");
            return Ok(Vec::new());
        };

        let total = records.len();
        let cases: Vec<Case> = records
            .iter()
            .filter_map(|record| {
                if !embedded_owner_matches(record, user_id) {
                    warn!(user_id, "Dropping case owned by another user");
                    return None;
                }

                let mut case = self.normalize_or_drop(record)?;
                case.patient_id = user_id.to_string();
                Some(case)
            })
            .collect();

        debug!(user_id, total, returned = cases.len(), "Listed cases for user");
        Ok(cases)
    }

    /// 全部病例（医生视图）
    pub async fn list_all_cases(&self) -> Result<Vec<Case>> {
        let records = self.upstream.all_cases().await?;
        let total = records.len();

        let cases: Vec<Case> = records
            .iter()
            .filter_map(|record| self.normalize_or_drop(record))
            .collect();

        debug!(total, returned = cases.len(), "Listed all cases");
        Ok(cases)
    }

    /// 病例详情
    ///
    /// 先校验归属，再映射其它字段；仅当状态为"已确认"时才读取诊断，读取失败只记录日志。
    pub async fn get_case_detail(&self, case_id: &str, caller_user_id: &str) -> Result<CaseDetail> {
        require_id("case id", case_id)?;
        require_id("user id", caller_user_id)?;

        let context = format!("case {}", case_id);
        let record = self.upstream.case(case_id).await?;

        let owner = normalize::case_owner(&record, &context)?;
        if owner != caller_user_id {
            warn!(case_id, user_id = caller_user_id, "Case ownership check failed");
            return Err(GatewayError::OwnershipDenied);
        }

        let mut detail =
            normalize::case_detail(&record, case_id, &owner, &self.image_base_url, &context)?;

        if detail.status.is_validated() {
            detail.diagnostic = match self.upstream.diagnostic(case_id).await {
                Ok(Some(raw)) => match normalize::diagnostic(&raw, case_id) {
                    Ok(diagnostic) => Some(diagnostic),
                    Err(e) => {
                        warn!(case_id, error = %e, "Ignoring unreadable diagnostic");
                        None
                    }
                },
                Ok(None) => {
                    debug!(case_id, "Validated case has no diagnostic yet");
                    None
                }
                Err(e) => {
                    warn!(case_id, error = %e, "Failed to fetch diagnostic for case");
                    None
                }
            };
        }

        Ok(detail)
    }

    fn normalize_or_drop(&self, record: &RawRecord) -> Option<Case> {
        let case = normalize::lenient_case(record, &self.image_base_url);
        if case.is_none() {
            warn!("Dropping case record without a usable id");
        }
        case
    }
}

/// 记录未携带 `user_id` 时视为归属请求者；携带时必须与请求者一致
fn embedded_owner_matches(record: &RawRecord, user_id: &str) -> bool {
    match record.get("user_id") {
        None | Some(Value::Null) => true,
        Some(_) => lenient_id(record, &["user_id"]).as_deref() == Some(user_id),
    }
}

fn require_id(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::validation(format!("{} is required", name)));
    }
    Ok(())
}
