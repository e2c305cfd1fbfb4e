//! # Pneumo管理模块
//!
//! 进程级运维功能：配置加载与校验、全局配置、日志初始化。

pub mod config;
pub mod logging;

pub use config::{
    AuthConfig, ConfigManager, ConfigValidator, DatabaseConfig, GatewayConfig, LoggingConfig,
    ServerConfig, UpstreamConfig, DEFAULT_CONFIG_PATH,
};
pub use config::{global, install};
pub use logging::init_logging;
