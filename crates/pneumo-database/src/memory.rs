//! 内存身份库，用于测试和本地开发

use crate::store::IdentityStore;
use async_trait::async_trait;
use chrono::Utc;
use pneumo_core::{GatewayError, NewUserAccount, RegistrationOutcome, Result, UserAccount};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// 以邮箱为键的内存身份库
///
/// 与数据库一样对邮箱和身份证号强制唯一。
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: RwLock<HashMap<String, UserAccount>>,
    inserts: AtomicUsize,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 成功写入的次数
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn exists(&self, email: &str, national_id: &str) -> Result<bool> {
        let users = self.users.read().await;
        Ok(users.contains_key(email) || users.values().any(|u| u.national_id == national_id))
    }

    async fn insert(&self, user: NewUserAccount) -> Result<RegistrationOutcome> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email)
            || users.values().any(|u| u.national_id == user.national_id)
        {
            return Err(GatewayError::DuplicateUser);
        }

        let account = UserAccount {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            age: user.age,
            role: user.role,
            national_id: user.national_id,
            email: user.email,
            password_hash: user.password_hash,
            data_consent: user.data_consent,
            created_at: Utc::now(),
        };
        let outcome = RegistrationOutcome {
            id: account.id,
            created_at: account.created_at,
        };

        users.insert(account.email.clone(), account);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pneumo_core::Role;

    fn new_user(email: &str, national_id: &str) -> NewUserAccount {
        NewUserAccount {
            full_name: "Luis Pérez".to_string(),
            age: 41,
            role: Role::Patient,
            national_id: national_id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            data_consent: true,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryIdentityStore::new();
        let outcome = store.insert(new_user("luis@example.com", "1")).await.unwrap();

        let found = store.find_by_email("luis@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, outcome.id);
        assert_eq!(store.insert_count(), 1);
        assert!(store.find_by_email("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email_and_national_id() {
        let store = MemoryIdentityStore::new();
        store.insert(new_user("a@example.com", "100")).await.unwrap();

        assert!(store.exists("a@example.com", "999").await.unwrap());
        assert!(store.exists("b@example.com", "100").await.unwrap());
        assert!(!store.exists("b@example.com", "200").await.unwrap());

        let err = store.insert(new_user("b@example.com", "100")).await.unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateUser));
        assert_eq!(store.insert_count(), 1);
        assert_eq!(store.len().await, 1);
    }
}
