//! 测试用上游替身

use crate::upstream::{DiagnosticSubmission, UpstreamStore};
use async_trait::async_trait;
use pneumo_core::{GatewayError, RawRecord, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// 可编程的上游替身，记录每个接口的调用次数
#[derive(Default)]
pub struct FakeUpstream {
    pub user_cases: Mutex<HashMap<String, Vec<RawRecord>>>,
    pub all_cases: Mutex<Vec<RawRecord>>,
    pub cases: Mutex<HashMap<String, RawRecord>>,
    pub diagnostics: Mutex<HashMap<String, RawRecord>>,
    pub fail_with_status: Mutex<Option<u16>>,
    pub fail_diagnostic: Mutex<bool>,
    pub ack: Mutex<Option<RawRecord>>,
    pub submissions: Mutex<Vec<DiagnosticSubmission>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

pub fn record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        _ => panic!("test record must be an object"),
    }
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn with_case(self, case_id: &str, value: Value) -> Self {
        self.cases.lock().unwrap().insert(case_id.to_string(), record(value));
        self
    }

    pub fn with_diagnostic(self, case_id: &str, value: Value) -> Self {
        self.diagnostics
            .lock()
            .unwrap()
            .insert(case_id.to_string(), record(value));
        self
    }

    pub fn with_user_cases(self, user_id: &str, values: Vec<Value>) -> Self {
        self.user_cases
            .lock()
            .unwrap()
            .insert(user_id.to_string(), values.into_iter().map(record).collect());
        self
    }

    pub fn failing(self, status: u16) -> Self {
        *self.fail_with_status.lock().unwrap() = Some(status);
        self
    }

    fn hit(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;
        match *self.fail_with_status.lock().unwrap() {
            Some(status) => Err(GatewayError::Upstream {
                operation: operation.to_string(),
                status,
                detail: Some("simulated failure".to_string()),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UpstreamStore for FakeUpstream {
    async fn cases_for_user(&self, user_id: &str) -> Result<Option<Vec<RawRecord>>> {
        self.hit("cases_for_user")?;
        Ok(self.user_cases.lock().unwrap().get(user_id).cloned())
    }

    async fn all_cases(&self) -> Result<Vec<RawRecord>> {
        self.hit("all_cases")?;
        Ok(self.all_cases.lock().unwrap().clone())
    }

    async fn case(&self, case_id: &str) -> Result<RawRecord> {
        self.hit("case")?;
        self.cases
            .lock()
            .unwrap()
            .get(case_id)
            .cloned()
            .ok_or_else(|| GatewayError::Upstream {
                operation: format!("GET /case/{}", case_id),
                status: 404,
                detail: Some("Case not found".to_string()),
            })
    }

    async fn prediagnostic(&self, id: &str) -> Result<RawRecord> {
        self.hit("prediagnostic")?;
        self.cases
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::Upstream {
                operation: format!("GET /prediagnostic/case/{}", id),
                status: 404,
                detail: None,
            })
    }

    async fn diagnostic(&self, case_id: &str) -> Result<Option<RawRecord>> {
        self.hit("diagnostic")?;
        if *self.fail_diagnostic.lock().unwrap() {
            return Err(GatewayError::UpstreamTransport {
                operation: format!("GET /diagnostic/{}", case_id),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.diagnostics.lock().unwrap().get(case_id).cloned())
    }

    async fn submit_diagnostic(&self, submission: &DiagnosticSubmission) -> Result<RawRecord> {
        self.hit("submit_diagnostic")?;
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(self.ack.lock().unwrap().clone().unwrap_or_default())
    }
}
