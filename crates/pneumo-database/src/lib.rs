//! # Pneumo数据库模块
//!
//! 身份库：用户凭据与资料的存储，提供PostgreSQL连接池、查询操作以及供测试使用的内存实现。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;
pub mod store;

// 重新导出主要类型
pub use connection::{DatabasePool, PoolSettings};
pub use memory::MemoryIdentityStore;
pub use models::*;
pub use queries::DatabaseQueries;
pub use store::{IdentityStore, PgIdentityStore};
