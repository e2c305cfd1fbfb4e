//! HTTP处理器

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use pneumo_core::{
    CaseDetail, DiagnosticResponse, GatewayError, LoginRequest, LoginResponse, PreDiagnostic,
    RegistrationRequest, Role, SessionClaims,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::require_role;
use crate::server::AppState;

/// 5xx响应对外展示的统一文本
const GENERIC_SERVER_ERROR: &str = "Internal server error";

/// HTTP层错误，包装 [`GatewayError`] 并负责状态码映射
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GatewayError::validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::DuplicateUser => StatusCode::CONFLICT,
            GatewayError::ConsentViolation => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidCredentials
            | GatewayError::InvalidToken
            | GatewayError::ExpiredToken => StatusCode::UNAUTHORIZED,
            GatewayError::ForbiddenRole { .. } | GatewayError::OwnershipDenied => {
                StatusCode::FORBIDDEN
            }
            GatewayError::Upstream { status: 404, .. } => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. }
            | GatewayError::UpstreamTransport { .. }
            | GatewayError::MalformedUpstreamResponse { .. }
            | GatewayError::InvalidUpstreamData(_)
            | GatewayError::Database(_)
            | GatewayError::Config(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 错误处理
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
            GENERIC_SERVER_ERROR.to_string()
        } else if let GatewayError::Upstream { .. } = self.0 {
            "Resource not found".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "error": self.0.code(),
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 注册处理器
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let outcome = state.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": outcome.id,
            "message": "User registered successfully",
            "registered_at": outcome.created_at.to_rfc3339()
        })),
    ))
}

/// 登录处理器
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    Ok(Json(state.auth.login(request).await?))
}

/// 返回当前令牌中的会话声明
pub async fn validation(Extension(claims): Extension<SessionClaims>) -> Json<SessionClaims> {
    Json(claims)
}

/// 当前患者的病例列表
pub async fn list_my_cases(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> ApiResult<Json<Value>> {
    let claims = require_role(claims, Role::Patient)?;
    let cases = state
        .cases
        .list_cases_for_user(&claims.user_id.to_string())
        .await?;

    Ok(Json(json!({ "total": cases.len(), "cases": cases })))
}

/// 全部病例（医生）
pub async fn list_all_cases(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> ApiResult<Json<Value>> {
    require_role(claims, Role::Doctor)?;
    let cases = state.cases.list_all_cases().await?;

    Ok(Json(json!({ "total": cases.len(), "cases": cases })))
}

/// 病例详情（仅限病例所属患者）
pub async fn get_case_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<CaseDetail>> {
    let claims = require_role(claims, Role::Patient)?;
    let detail = state
        .cases
        .get_case_detail(&case_id, &claims.user_id.to_string())
        .await?;

    Ok(Json(detail))
}

/// 诊断请求体
#[derive(Debug, Deserialize)]
pub struct DiagnosticRequest {
    #[serde(default, alias = "aprobacion")]
    pub approval: String,
    #[serde(default, alias = "comentario")]
    pub comment: String,
}

/// 提交诊断（医生），校验失败以 `success = false` 返回
pub async fn create_diagnostic(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(case_id): Path<String>,
    payload: std::result::Result<Json<DiagnosticRequest>, JsonRejection>,
) -> ApiResult<Json<DiagnosticResponse>> {
    let claims = require_role(claims, Role::Doctor)?;
    let Json(request) = payload?;

    let response = state
        .diagnostics
        .create_diagnostic(&case_id, &request.approval, &request.comment)
        .await;
    info!(case_id = %case_id, doctor_id = %claims.user_id, success = response.success, "Diagnostic request handled");

    Ok(Json(response))
}

/// 预诊断（医生）
pub async fn get_prediagnostic(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<String>,
) -> ApiResult<Json<PreDiagnostic>> {
    require_role(claims, Role::Doctor)?;
    Ok(Json(state.prediagnostics.get_by_id(&id).await?))
}
