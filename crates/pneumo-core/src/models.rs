//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "paciente")]
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" | "paciente" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// 注册请求
#[derive(Clone, Deserialize)]
pub struct RegistrationRequest {
    #[serde(alias = "nombre_completo")]
    pub full_name: String,
    #[serde(alias = "edad")]
    pub age: i32,
    #[serde(alias = "rol")]
    pub role: Role,
    #[serde(alias = "identificacion")]
    pub national_id: String,
    #[serde(alias = "correo")]
    pub email: String,
    #[serde(alias = "contrasena")]
    pub password: String,
    #[serde(alias = "acepta_tratamiento_datos")]
    pub data_consent: bool,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("full_name", &self.full_name)
            .field("age", &self.age)
            .field("role", &self.role)
            .field("national_id", &self.national_id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("data_consent", &self.data_consent)
            .finish()
    }
}

/// 注册结果
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 身份库中的用户
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub full_name: String,
    pub age: i32,
    pub role: Role,
    pub national_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub data_consent: bool,
    pub created_at: DateTime<Utc>,
}

/// 待写入身份库的用户（密码已哈希）
#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub full_name: String,
    pub age: i32,
    pub role: Role,
    pub national_id: String,
    pub email: String,
    pub password_hash: String,
    pub data_consent: bool,
}

/// 登录请求
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "correo")]
    pub email: String,
    #[serde(alias = "contrasena")]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 登录响应
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub token: String,
}

/// 从令牌中还原的会话声明
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
}

/// 病例状态
///
/// 未识别的上游状态原样保留。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CaseStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Reviewed,
    Unknown,
    Other(String),
}

/// 上游表示"医生已确认"的状态值
pub const VALIDATED_STATUS_VALUES: [&str; 2] = ["Validated", "Validado"];

impl CaseStatus {
    /// 按固定映射表归一化上游状态（区分大小写），缺失时为 `Unknown`
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            None => CaseStatus::Unknown,
            Some("pending") => CaseStatus::Pending,
            Some("processing") => CaseStatus::Processing,
            Some("completed") => CaseStatus::Completed,
            Some("error") => CaseStatus::Error,
            Some("reviewed") => CaseStatus::Reviewed,
            Some(other) => CaseStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CaseStatus::Pending => "Pending",
            CaseStatus::Processing => "Processing",
            CaseStatus::Completed => "Completed",
            CaseStatus::Error => "Error",
            CaseStatus::Reviewed => "Reviewed",
            CaseStatus::Unknown => "Unknown",
            CaseStatus::Other(value) => value,
        }
    }

    /// 是否已由医生确认（仅此时才会有诊断）
    pub fn is_validated(&self) -> bool {
        matches!(self, CaseStatus::Other(value) if VALIDATED_STATUS_VALUES.contains(&value.as_str()))
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CaseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => CaseStatus::Pending,
            "Processing" => CaseStatus::Processing,
            "Completed" => CaseStatus::Completed,
            "Error" => CaseStatus::Error,
            "Reviewed" => CaseStatus::Reviewed,
            "Unknown" => CaseStatus::Unknown,
            _ => CaseStatus::Other(value),
        }
    }
}

impl From<CaseStatus> for String {
    fn from(status: CaseStatus) -> Self {
        status.as_str().to_string()
    }
}

/// 模型推理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    /// 阳性（肺炎）概率 0.0 - 1.0
    pub probability: f64,
    pub label: String,
    pub processed_at: String,
}

/// 病例（列表视图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub uploaded_at: String,
    pub status: CaseStatus,
    pub image_url: String,
    pub model_result: Option<ModelResult>,
    pub assigned_doctor_id: Option<String>,
}

/// 预诊断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreDiagnostic {
    pub case_id: String,
    pub patient_id: String,
    pub image_path: String,
    pub status: CaseStatus,
    pub model_result: Option<ModelResult>,
    pub uploaded_at: String,
}

/// 医生审核结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Approval {
    #[serde(rename = "Yes")]
    Approved,
    #[serde(rename = "No")]
    NotApproved,
}

impl Approval {
    /// 客户端输入只接受 "Yes" / "No"
    pub fn from_input(value: &str) -> Option<Self> {
        match value {
            "Yes" => Some(Approval::Approved),
            "No" => Some(Approval::NotApproved),
            _ => None,
        }
    }

    /// 上游返回的审核结论可能是布尔值，也可能是字符串
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Approval::Approved),
            Value::Bool(false) => Some(Approval::NotApproved),
            Value::String(s) => match s.trim() {
                "Si" | "Sí" | "Yes" | "true" => Some(Approval::Approved),
                "No" | "false" => Some(Approval::NotApproved),
                _ => None,
            },
            _ => None,
        }
    }

    /// 上游写入接口使用布尔值
    pub fn as_wire(&self) -> bool {
        matches!(self, Approval::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Approved => "Yes",
            Approval::NotApproved => "No",
        }
    }
}

/// 诊断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub case_id: String,
    pub approval: Approval,
    pub comment: String,
    pub reviewed_at: String,
    pub doctor_name: Option<String>,
}

/// 病例详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDetail {
    pub id: String,
    pub image_url: String,
    pub status: CaseStatus,
    pub uploaded_at: String,
    pub pre_diagnostic: PreDiagnostic,
    pub diagnostic: Option<Diagnostic>,
}

/// 创建诊断的响应（校验失败同样通过 `success = false` 返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResponse {
    pub success: bool,
    pub message: String,
    pub diagnostic_id: Option<String>,
}

impl DiagnosticResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            diagnostic_id: None,
        }
    }
}
