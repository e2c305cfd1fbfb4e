//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::DbUser;
use chrono::{DateTime, Utc};
use pneumo_core::{GatewayError, NewUserAccount, RegistrationOutcome, Result, UserAccount};
use sqlx::Row;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                full_name VARCHAR(255) NOT NULL,
                age INTEGER NOT NULL,
                role VARCHAR(16) NOT NULL,
                national_id VARCHAR(64) UNIQUE NOT NULL,
                email VARCHAR(320) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                data_consent BOOLEAN NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| GatewayError::Database(e.to_string()))?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
            "CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| GatewayError::Database(e.to_string()))?;
        }

        tracing::debug!("Database indexes created successfully");
        Ok(())
    }

    // ========== 用户相关操作 ==========

    /// 根据邮箱查找用户（邮箱已小写）
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>(
            "SELECT * FROM users WHERE email = $1"
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| GatewayError::Database(e.to_string()))?;

        result.map(UserAccount::try_from).transpose()
    }

    /// 邮箱或身份证号是否已被注册
    pub async fn user_exists(&self, email: &str, national_id: &str) -> Result<bool> {
        let pool = self.pool.pool();

        sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR national_id = $2) AS taken")
            .bind(email)
            .bind(national_id)
            .fetch_one(pool)
            .await
            .map(|row| row.get::<bool, _>("taken"))
            .map_err(|e| GatewayError::Database(e.to_string()))
    }

    /// 写入新用户
    ///
    /// 唯一约束冲突（并发注册）转换为 [`GatewayError::DuplicateUser`]。
    pub async fn insert_user(&self, user: &NewUserAccount) -> Result<RegistrationOutcome> {
        let pool = self.pool.pool();

        let row = sqlx::query(r#"
            INSERT INTO users (id, full_name, age, role, national_id, email, password_hash, data_consent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
        "#)
        .bind(Uuid::new_v4())
        .bind(&user.full_name)
        .bind(user.age)
        .bind(user.role.as_str())
        .bind(&user.national_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.data_consent)
        .fetch_one(pool)
        .await
        .map_err(GatewayError::from)?;

        Ok(RegistrationOutcome {
            id: row.get::<Uuid, _>("id"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
    }
}
