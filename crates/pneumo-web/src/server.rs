//! Web服务器

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use pneumo_core::{GatewayError, Result};
use pneumo_integration::{CaseService, DiagnosticService, PreDiagnosticService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{auth_middleware, AuthService};
use crate::handlers::{
    create_diagnostic, get_case_detail, get_prediagnostic, health, list_all_cases, list_my_cases,
    login, register, validation,
};

/// 请求处理共享状态
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub cases: CaseService,
    pub diagnostics: DiagnosticService,
    pub prediagnostics: PreDiagnosticService,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, request_timeout: Duration) -> Self {
        let app = create_app(state, request_timeout);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to bind {}: {}", self.addr, e)))?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(format!("web server failed: {}", e)))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建路由
pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        // 无需令牌
        .route("/register", post(register))
        .route("/auth", post(login))
        .route("/health", get(health))
        // 需要令牌
        .merge(protected_routes(state.clone()))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/validation", get(validation))
        .route("/api/cases", get(list_my_cases))
        .route("/api/cases/all", get(list_all_cases))
        .route("/api/cases/:id", get(get_case_detail))
        .route("/api/diagnostics/:case_id", post(create_diagnostic))
        .route("/api/prediagnostics/:id", get(get_prediagnostic))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
