//! OptDesk - Options Trading Decision Server
//!
//! Classifies market regimes, ranks option strategies, sizes positions, and
//! evaluates open positions against adjustment/exit rules, backed by an
//! aggregated market-data layer with tool-server fallbacks.

use anyhow::{Context, Result};
use axum::middleware as axum_mw;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use optdesk_backend::api::{router, AppState};
use optdesk_backend::data::{
    AggregatedProvider, MarketDataProvider, MarketDataService, MockProvider, ToolServerManager,
    ToolServersConfig, TtlCache, YahooProvider,
};
use optdesk_backend::engine::DecisionEngine;
use optdesk_backend::middleware::request_logging;
use optdesk_backend::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("🚀 OptDesk starting (provider: {})", config.provider);

    // Primary provider
    let primary: Arc<dyn MarketDataProvider> = match config.provider.as_str() {
        "yahoo" => Arc::new(YahooProvider::new()),
        _ => Arc::new(MockProvider::new()),
    };

    // External tool servers (fallback layer)
    let tools_config = ToolServersConfig::load(&config.tool_servers_path)
        .context("failed to load tool servers config")?;
    let tools = Arc::new(ToolServerManager::new(tools_config));
    tools.startup().await;

    // Aggregated provider behind the TTL cache
    let aggregated: Arc<dyn MarketDataProvider> =
        Arc::new(AggregatedProvider::new(primary, tools.clone()));
    let cache = Arc::new(TtlCache::new());
    let data = Arc::new(MarketDataService::new(aggregated, cache));

    // Decision engine
    let engine = Arc::new(DecisionEngine::new(data.clone()));

    let state = AppState {
        engine,
        data,
        tools: tools.clone(),
    };

    let app = router(state)
        .layer(axum_mw::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("📡 Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tools))
        .await?;

    Ok(())
}

async fn shutdown_signal(tools: Arc<ToolServerManager>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
    tools.shutdown().await;
}
