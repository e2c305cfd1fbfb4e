//! # Pneumo Web模块
//!
//! 认证服务与对外HTTP接口。

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthService;
pub use server::{create_app, AppState, WebServer};
