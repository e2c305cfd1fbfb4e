//! 错误定义模块

use crate::extract::MappingError;
use thiserror::Error;

/// 网关统一错误类型
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("验证错误: {0}")]
    Validation(String),

    #[error("用户已存在: 邮箱或身份证号已被注册")]
    DuplicateUser,

    #[error("必须同意个人数据处理")]
    ConsentViolation,

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("邮箱或密码错误")]
    InvalidCredentials,

    #[error("无效的令牌")]
    InvalidToken,

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("角色无权执行此操作 (需要 '{required}')")]
    ForbiddenRole { required: String },

    #[error("访问被拒绝: 病例不属于当前用户")]
    OwnershipDenied,

    #[error("上游服务错误 ({operation}): HTTP {status}{}", detail_suffix(.detail))]
    Upstream {
        operation: String,
        status: u16,
        detail: Option<String>,
    },

    #[error("上游服务不可达 ({operation}): {message}")]
    UpstreamTransport { operation: String, message: String },

    #[error("上游响应格式错误 ({operation}): {message}")]
    MalformedUpstreamResponse { operation: String, message: String },

    #[error("上游数据无效: {0}")]
    InvalidUpstreamData(#[from] MappingError),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" - {}", detail),
        None => String::new(),
    }
}

impl GatewayError {
    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::DuplicateUser => "USER_ALREADY_EXISTS",
            GatewayError::ConsentViolation => "BUSINESS_RULE_VIOLATION",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::InvalidCredentials => "INVALID_CREDENTIALS",
            GatewayError::InvalidToken => "INVALID_TOKEN",
            GatewayError::ExpiredToken => "EXPIRED_TOKEN",
            GatewayError::ForbiddenRole { .. } => "FORBIDDEN_ROLE",
            GatewayError::OwnershipDenied => "OWNERSHIP_DENIED",
            GatewayError::Upstream { .. } => "UPSTREAM_ERROR",
            GatewayError::UpstreamTransport { .. } => "UPSTREAM_UNAVAILABLE",
            GatewayError::MalformedUpstreamResponse { .. } => "MALFORMED_UPSTREAM_RESPONSE",
            GatewayError::InvalidUpstreamData(_) => "INVALID_UPSTREAM_DATA",
            GatewayError::Database(_) | GatewayError::Config(_) | GatewayError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::MalformedUpstreamResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // 23505: unique_violation
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                GatewayError::DuplicateUser
            }
            sqlx::Error::RowNotFound => GatewayError::NotFound(err.to_string()),
            _ => GatewayError::Database(err.to_string()),
        }
    }
}

/// 网关统一结果类型
pub type Result<T> = std::result::Result<T, GatewayError>;
