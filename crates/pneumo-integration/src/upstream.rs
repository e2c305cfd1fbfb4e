//! 上游服务客户端
//!
//! 将上游病例/诊断服务的REST接口包装为类型化调用，并把HTTP状态码转换为领域结果：
//! - 非2xx响应 → `Upstream`（含状态码与上游 `detail`）
//! - 2xx但响应体为空或无法解析 → `MalformedUpstreamResponse`
//! - 网络/超时错误 → `UpstreamTransport`
//!
//! 只有文档约定的两处404被视为正常结果：用户病例列表（尚无病例）和诊断（尚未审核）。

use async_trait::async_trait;
use pneumo_core::extract::json_type_name;
use pneumo_core::{GatewayError, RawRecord, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// 提交给上游的诊断请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticSubmission {
    pub case_id: String,
    pub approval: bool,
    pub comment: String,
    /// Unix秒时间戳字符串
    pub review_timestamp: String,
}

/// 上游病例/诊断存储接口
#[async_trait]
pub trait UpstreamStore: Send + Sync {
    /// 用户的病例列表，上游404时返回 `None`
    async fn cases_for_user(&self, user_id: &str) -> Result<Option<Vec<RawRecord>>>;

    /// 全部病例
    async fn all_cases(&self) -> Result<Vec<RawRecord>>;

    /// 单个病例
    async fn case(&self, case_id: &str) -> Result<RawRecord>;

    /// 单个预诊断
    async fn prediagnostic(&self, id: &str) -> Result<RawRecord>;

    /// 病例的诊断，上游404（尚未审核）时返回 `None`
    async fn diagnostic(&self, case_id: &str) -> Result<Option<RawRecord>>;

    /// 创建诊断，返回上游确认
    async fn submit_diagnostic(&self, submission: &DiagnosticSubmission) -> Result<RawRecord>;
}

/// 基于reqwest的上游客户端
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Self::with_client(client, base_url)
    }

    /// 使用已有的 `reqwest::Client`（共享连接池）
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid upstream url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "upstream url '{}' cannot be used as a base",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 在基础地址后追加路径段（逐段转义）
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>)> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, e))?;

        debug!(operation, status = status.as_u16(), bytes = body.len(), "Upstream response received");
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl UpstreamStore for HttpUpstreamClient {
    async fn cases_for_user(&self, user_id: &str) -> Result<Option<Vec<RawRecord>>> {
        let operation = format!("GET /cases/{}", user_id);
        let request = self.client.get(self.endpoint(&["cases", user_id]));
        let (status, body) = self.execute(&operation, request).await?;

        if status == StatusCode::NOT_FOUND {
            debug!(user_id, "Upstream reports no cases for user");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(upstream_error(&operation, status, &body));
        }

        parse_case_list(&operation, &body).map(Some)
    }

    async fn all_cases(&self) -> Result<Vec<RawRecord>> {
        let operation = "GET /cases";
        let request = self.client.get(self.endpoint(&["cases"]));
        let (status, body) = self.execute(operation, request).await?;

        if !status.is_success() {
            return Err(upstream_error(operation, status, &body));
        }

        parse_case_list(operation, &body)
    }

    async fn case(&self, case_id: &str) -> Result<RawRecord> {
        let operation = format!("GET /case/{}", case_id);
        let request = self.client.get(self.endpoint(&["case", case_id]));
        let (status, body) = self.execute(&operation, request).await?;

        if !status.is_success() {
            return Err(upstream_error(&operation, status, &body));
        }

        parse_object(&operation, &body)
    }

    async fn prediagnostic(&self, id: &str) -> Result<RawRecord> {
        let operation = format!("GET /prediagnostic/case/{}", id);
        let request = self
            .client
            .get(self.endpoint(&["prediagnostic", "case", id]));
        let (status, body) = self.execute(&operation, request).await?;

        if !status.is_success() {
            return Err(upstream_error(&operation, status, &body));
        }

        parse_object(&operation, &body)
    }

    async fn diagnostic(&self, case_id: &str) -> Result<Option<RawRecord>> {
        let operation = format!("GET /diagnostic/{}", case_id);
        let request = self.client.get(self.endpoint(&["diagnostic", case_id]));
        let (status, body) = self.execute(&operation, request).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(upstream_error(&operation, status, &body));
        }

        parse_object(&operation, &body).map(Some)
    }

    async fn submit_diagnostic(&self, submission: &DiagnosticSubmission) -> Result<RawRecord> {
        let operation = format!("POST /diagnostic/{}", submission.case_id);
        let request = self
            .client
            .post(self.endpoint(&["diagnostic", &submission.case_id]))
            .json(submission);
        let (status, body) = self.execute(&operation, request).await?;

        if !status.is_success() {
            return Err(upstream_error(&operation, status, &body));
        }

        parse_object(&operation, &body)
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> GatewayError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };

    GatewayError::UpstreamTransport {
        operation: operation.to_string(),
        message,
    }
}

/// 非成功状态转换为上游错误，尽量提取 `detail` 字段
fn upstream_error(operation: &str, status: StatusCode, body: &[u8]) -> GatewayError {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        });

    warn!(operation, status = status.as_u16(), detail = detail.as_deref(), "Upstream returned an error");

    GatewayError::Upstream {
        operation: operation.to_string(),
        status: status.as_u16(),
        detail,
    }
}

fn parse_json(operation: &str, body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::malformed(operation, "empty response body"));
    }

    serde_json::from_slice(body)
        .map_err(|e| GatewayError::malformed(operation, format!("invalid JSON: {}", e)))
}

fn parse_object(operation: &str, body: &[u8]) -> Result<RawRecord> {
    match parse_json(operation, body)? {
        Value::Object(record) => Ok(record),
        other => Err(GatewayError::malformed(
            operation,
            format!("expected a JSON object, found {}", json_type_name(&other)),
        )),
    }
}

/// 病例列表既可能是裸数组，也可能包装为 `{"cases": [...]}`
fn parse_case_list(operation: &str, body: &[u8]) -> Result<Vec<RawRecord>> {
    let items = match parse_json(operation, body)? {
        Value::Array(items) => items,
        Value::Object(mut wrapper) => match wrapper.remove("cases") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(GatewayError::malformed(
                    operation,
                    format!("'cases' must be an array, found {}", json_type_name(&other)),
                ))
            }
            None => {
                return Err(GatewayError::malformed(
                    operation,
                    "object response without a 'cases' field",
                ))
            }
        },
        other => {
            return Err(GatewayError::malformed(
                operation,
                format!("expected a case list, found {}", json_type_name(&other)),
            ))
        }
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();

    if records.len() < total {
        warn!(operation, skipped = total - records.len(), "Skipped non-object entries in case list");
    }

    Ok(records)
}
