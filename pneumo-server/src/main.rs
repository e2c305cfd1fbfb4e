//! 肺炎影像网关主程序

use anyhow::{Context, Result};
use clap::Parser;
use pneumo_admin::{config, init_logging, ConfigManager, GatewayConfig};
use pneumo_database::{DatabasePool, DatabaseQueries, PgIdentityStore, PoolSettings};
use pneumo_integration::{
    CaseService, DiagnosticService, HttpUpstreamClient, PreDiagnosticService, UpstreamStore,
};
use pneumo_web::{AppState, AuthService, WebServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 网关命令行参数
#[derive(Parser, Debug)]
#[command(name = "pneumo-server")]
#[command(about = "肺炎影像网关：认证、病例聚合与诊断提交")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, env = "PNEUMO_CONFIG")]
    config: Option<PathBuf>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env 不存在时忽略
    let dotenv = dotenvy::dotenv();

    let mut manager =
        ConfigManager::new(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        manager.config_mut().server.port = port;
    }

    init_logging(&manager.config().logging, args.log_level.as_deref())?;
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    manager.validate()?;
    let config = config::install(manager.into_config())?;

    info!("Starting pneumonia imaging gateway");
    info!(upstream = %config.upstream.base_url, "Upstream service configured");
    info!(database = %config.database.redacted_url(), "Identity store configured");

    let pool = DatabasePool::connect(&pool_settings(config))
        .await
        .context("Failed to connect to identity database")?;
    if config.database.auto_migrate {
        DatabaseQueries::new(&pool)
            .create_tables()
            .await
            .context("Failed to create identity tables")?;
    } else {
        warn!("Automatic migration disabled, assuming schema exists");
    }

    let state = build_state(config, pool.clone())?;
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.bind_address()))?;

    let result = WebServer::new(addr, state, config.server.request_timeout())
        .run()
        .await;

    pool.close().await;
    info!("Gateway stopped");
    result.context("Web server terminated with an error")
}

fn pool_settings(config: &GatewayConfig) -> PoolSettings {
    PoolSettings {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        acquire_timeout: config.database.acquire_timeout(),
    }
}

fn build_state(config: &GatewayConfig, pool: DatabasePool) -> Result<AppState> {
    let identity = Arc::new(PgIdentityStore::new(pool));
    let auth = AuthService::new(identity, &config.auth.jwt_secret, config.auth.token_ttl_hours);

    let upstream: Arc<dyn UpstreamStore> = Arc::new(
        HttpUpstreamClient::new(&config.upstream.base_url, config.upstream.timeout())
            .context("Failed to build upstream client")?,
    );

    Ok(AppState {
        auth: Arc::new(auth),
        cases: CaseService::new(upstream.clone(), config.upstream.resolved_image_base_url()),
        diagnostics: DiagnosticService::new(upstream.clone()),
        prediagnostics: PreDiagnosticService::new(upstream),
    })
}
