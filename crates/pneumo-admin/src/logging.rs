//! 日志初始化
//!
//! 过滤指令的优先级：`RUST_LOG` 环境变量 > 命令行 `--log-level` > 配置文件 `logging.level`。

use crate::config::LoggingConfig;
use anyhow::{anyhow, Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// 按优先级选出生效的过滤指令
pub fn resolve_directive(
    env_directive: Option<&str>,
    cli_level: Option<&str>,
    configured: &str,
) -> String {
    [env_directive, cli_level]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(configured)
        .to_string()
}

/// 构造过滤器，非法指令返回错误
pub fn build_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter directive: {}", directive))
}

/// 安装全局 fmt 订阅器
pub fn init_logging(config: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    let env_directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = resolve_directive(env_directive.as_deref(), cli_level, &config.level);
    let filter = build_filter(&directive)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.show_target)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    debug!(directive = %directive, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_precedence() {
        assert_eq!(resolve_directive(Some("trace"), Some("debug"), "info"), "trace");
        assert_eq!(resolve_directive(None, Some("debug"), "info"), "debug");
        assert_eq!(resolve_directive(None, None, "warn"), "warn");
        assert_eq!(resolve_directive(Some("  "), Some("error"), "info"), "error");
        assert_eq!(
            resolve_directive(Some("pneumo_web=debug,info"), None, "info"),
            "pneumo_web=debug,info"
        );
    }

    #[test]
    fn test_build_filter() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("pneumo_integration=debug,tower_http=info").is_ok());
        assert!(build_filter("pneumo=notalevel").is_err());
    }
}
