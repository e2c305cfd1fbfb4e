//! 数据库模型

use chrono::{DateTime, Utc};
use pneumo_core::{GatewayError, Role, UserAccount};
use sqlx::FromRow;
use uuid::Uuid;

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub full_name: String,
    pub age: i32,
    pub role: String, // 存储为字符串，转换为Role枚举
    pub national_id: String,
    pub email: String,
    pub password_hash: String,
    pub data_consent: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for UserAccount {
    type Error = GatewayError;

    fn try_from(db_user: DbUser) -> Result<Self, Self::Error> {
        let role = db_user
            .role
            .parse::<Role>()
            .map_err(|e| GatewayError::Database(format!("user {}: {}", db_user.id, e)))?;

        Ok(UserAccount {
            id: db_user.id,
            full_name: db_user.full_name,
            age: db_user.age,
            role,
            national_id: db_user.national_id,
            email: db_user.email,
            password_hash: db_user.password_hash,
            data_consent: db_user.data_consent,
            created_at: db_user.created_at,
        })
    }
}
