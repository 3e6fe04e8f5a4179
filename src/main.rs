mod config;
mod errors;
mod insight;
mod market;
mod portfolio;
mod risk;
mod server;
mod state;

use crate::market::yahoo::YahooClient;
use crate::state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("portfolio_risk starting");

    // Load config once; immutable from here on
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if cfg.insight.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, insights will use fallback text");
    }

    let market = YahooClient::new(
        &cfg.price_api_base_url,
        &cfg.sector_api_base_url,
        cfg.provider_timeout_secs,
    )
    .with_session(&cfg.session_cookie_url, &cfg.crumb_url);

    let port = cfg.server_port;
    let app_state = AppState::new(cfg, Arc::new(market));
    let app = server::router(app_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
