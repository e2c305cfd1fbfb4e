//! 用户认证和授权
//!
//! 无状态认证：令牌是HS256签名的JWT，每次请求只依据令牌和共享密钥校验，不保存会话。

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pneumo_core::{
    GatewayError, LoginRequest, LoginResponse, NewUserAccount, RegistrationOutcome,
    RegistrationRequest, Result, Role, SessionClaims, UserAccount,
};
use pneumo_database::IdentityStore;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handlers::ApiError;
use crate::server::AppState;

/// 密码最小长度
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// 年龄上限
const MAX_AGE: i32 = 150;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    email: String,
    role: Role,
    name: String,
    iat: i64,
    exp: i64,
}

impl TokenClaims {
    fn into_session(self) -> Result<SessionClaims> {
        let expires_at = DateTime::<Utc>::from_timestamp(self.exp, 0).ok_or(GatewayError::InvalidToken)?;
        Ok(SessionClaims {
            user_id: self.sub,
            email: self.email,
            role: self.role,
            display_name: self.name,
            expires_at,
        })
    }
}

/// 认证服务
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn IdentityStore>, jwt_secret: &str, token_ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            store,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            token_ttl: Duration::hours(token_ttl_hours),
        }
    }

    /// 注册新用户
    ///
    /// 校验顺序：字段 → 同意书 → 唯一性；任一失败都不会写入身份库。
    pub async fn register(&self, request: RegistrationRequest) -> Result<RegistrationOutcome> {
        validate_registration(&request)?;

        if !request.data_consent {
            return Err(GatewayError::ConsentViolation);
        }

        let email = request.email.trim().to_lowercase();
        let national_id = request.national_id.trim().to_string();

        if self.store.exists(&email, &national_id).await? {
            warn!("Registration rejected: email or national id already registered");
            return Err(GatewayError::DuplicateUser);
        }

        let password_hash = hash_password(request.password).await?;

        let outcome = self
            .store
            .insert(NewUserAccount {
                full_name: request.full_name.trim().to_string(),
                age: request.age,
                role: request.role,
                national_id,
                email,
                password_hash,
                data_consent: request.data_consent,
            })
            .await?;

        info!(user_id = %outcome.id, role = %request.role, "Registration completed");
        Ok(outcome)
    }

    /// 用户登录
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(GatewayError::validation("email and password are required"));
        }

        let account = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| GatewayError::NotFound("user".to_string()))?;

        if !verify_password(request.password, account.password_hash.clone()).await? {
            warn!(user_id = %account.id, "Login failed: wrong password");
            return Err(GatewayError::InvalidCredentials);
        }

        let token = self.issue_token(&account, Utc::now())?;
        info!(user_id = %account.id, role = %account.role, "User logged in");

        Ok(LoginResponse {
            user_id: account.id,
            email: account.email,
            role: account.role,
            name: account.full_name,
            token,
        })
    }

    /// 签发令牌，有效期从 `issued_at` 起算
    pub fn issue_token(&self, account: &UserAccount, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            name: account.full_name.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.token_ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("failed to sign token: {}", e)))
    }

    /// 校验令牌签名与有效期
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => GatewayError::ExpiredToken,
                kind => {
                    debug!(reason = ?kind, "Token rejected");
                    GatewayError::InvalidToken
                }
            })?;

        data.claims.into_session()
    }

    /// 校验令牌并要求指定角色
    pub fn authorize(&self, token: &str, required: Role) -> Result<SessionClaims> {
        let claims = self.validate_token(token)?;
        require_role(claims, required)
    }
}

/// 要求会话具备指定角色
pub fn require_role(claims: SessionClaims, required: Role) -> Result<SessionClaims> {
    if claims.role != required {
        warn!(user_id = %claims.user_id, role = %claims.role, required = %required, "Role check failed");
        return Err(GatewayError::ForbiddenRole {
            required: required.to_string(),
        });
    }
    Ok(claims)
}

fn validate_registration(request: &RegistrationRequest) -> Result<()> {
    if request.full_name.trim().is_empty() {
        return Err(GatewayError::validation("full name is required"));
    }
    if request.email.trim().is_empty() {
        return Err(GatewayError::validation("email is required"));
    }
    if !request.email.contains('@') {
        return Err(GatewayError::validation("email is not valid"));
    }
    if request.password.trim().is_empty() {
        return Err(GatewayError::validation("password is required"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(GatewayError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if request.national_id.trim().is_empty() {
        return Err(GatewayError::validation("national id is required"));
    }
    if !(0..=MAX_AGE).contains(&request.age) {
        return Err(GatewayError::validation(format!(
            "age must be between 0 and {}",
            MAX_AGE
        )));
    }
    Ok(())
}

/// Argon2id 哈希（在阻塞线程池中执行）
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GatewayError::Internal(format!("failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| GatewayError::Internal(format!("hashing task failed: {}", e)))?
}

/// 校验密码，存储的哈希格式错误时视为不匹配
async fn verify_password(password: String, password_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| GatewayError::Internal(format!("verification task failed: {}", e)))
}

/// 从 `Authorization: Bearer <token>` 中取出令牌
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::InvalidToken)
}

/// 认证中间件：校验令牌并把 [`SessionClaims`] 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let claims = state.auth.validate_token(bearer_token(request.headers())?)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
