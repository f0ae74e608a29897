//! Token Guard API Server
//!
//! Usage:
//!   cargo run --bin guard_api
//!
//! Environment:
//!   PORT / GUARD_PORT - Server port (default: 8080)
//!   GUARD_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG          - Log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use token_guard::api::{create_router, start_cleanup_task, AppState};
use token_guard::utils::constants::{APP_NAME, APP_VERSION, CACHE_SWEEP_INTERVAL_SECS};
use token_guard::{GuardConfig, SecurityAnalyzer};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("🛡️ {} API v{}", APP_NAME, APP_VERSION);

    let config = GuardConfig::from_env().map_err(|e| eyre::eyre!("{}", e))?;
    let analyzer = SecurityAnalyzer::new(&config).map_err(|e| eyre::eyre!("{}", e))?;

    let chains: Vec<&str> = analyzer.supported_chains().iter().map(|c| c.as_str()).collect();
    if chains.is_empty() {
        error!("No chain configured. Set ETH_HTTP_URL or ALCHEMY_API_KEY.");
    } else {
        info!("⛓️ Chains: {}", chains.join(", "));
    }

    let sweeper = analyzer.spawn_sweeper(Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS));
    let limiter_cleanup = start_cleanup_task();
    info!("🧹 Background cleanup tasks started");

    let state = Arc::new(AppState::new(analyzer.clone()));
    let app = create_router(state);

    let host = std::env::var("GUARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("GUARD_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 Listening on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /v1/analyze/token    - Token security analysis");
    info!("  GET  /v1/stats            - Analysis and cache statistics");
    info!("  GET  /v1/health           - Health check");

    let listener = TcpListener::bind(addr).await?;
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("🛑 Shutdown signal received, cleaning up...");
    sweeper.abort();
    limiter_cleanup.abort();
    info!("{}", analyzer.stats().summary());
    info!("👋 {} API shutdown complete", APP_NAME);

    Ok(())
}
