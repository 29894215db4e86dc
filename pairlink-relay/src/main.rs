//! pairlink-relay binary entry point.
//!
//! Usage:
//! ```bash
//! pairlink-relay --config pairlink.toml
//! ```

use anyhow::Context;
use pairlink_relay::config::Config;
use pairlink_relay::server::ChatRelay;
use pairlink_relay::{http, listener};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no config file, using defaults");
        Config::default()
    };

    let relay = Arc::new(ChatRelay::new(config));
    http::health::init_start_time();

    let http_addr = relay.config().http.bind_address.clone();
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("binding operator interface on {http_addr}"))?;
    info!(addr = %http_addr, "operator interface listening");
    let app = http::build_router(relay.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("operator interface failed: {e}");
        }
    });

    tokio::select! {
        result = listener::run(relay.clone()) => result.context("accept loop failed")?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    if let Err(e) = relay.flush().await {
        tracing::error!("failed to flush registered nicknames: {e}");
    }
    Ok(())
}

fn config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pairlink.toml"))
}
