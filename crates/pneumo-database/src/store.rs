//! 身份库抽象

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;
use async_trait::async_trait;
use pneumo_core::{NewUserAccount, RegistrationOutcome, Result, UserAccount};

/// 身份库接口
///
/// 认证服务只依赖此接口，生产环境使用 [`PgIdentityStore`]，测试使用
/// [`crate::MemoryIdentityStore`]。
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// 根据邮箱（已小写）查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>>;

    /// 邮箱或身份证号是否已存在
    async fn exists(&self, email: &str, national_id: &str) -> Result<bool>;

    /// 写入新用户，唯一约束冲突时返回 `DuplicateUser`
    async fn insert(&self, user: NewUserAccount) -> Result<RegistrationOutcome>;
}

/// 基于PostgreSQL的身份库
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: DatabasePool,
}

impl PgIdentityStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        DatabaseQueries::new(&self.pool).find_user_by_email(email).await
    }

    async fn exists(&self, email: &str, national_id: &str) -> Result<bool> {
        DatabaseQueries::new(&self.pool)
            .user_exists(email, national_id)
            .await
    }

    async fn insert(&self, user: NewUserAccount) -> Result<RegistrationOutcome> {
        let outcome = DatabaseQueries::new(&self.pool).insert_user(&user).await?;
        tracing::info!(user_id = %outcome.id, role = %user.role, "User registered");
        Ok(outcome)
    }
}
