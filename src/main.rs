// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Credibility Gate Service
//!
//! Serves `POST /v1/analyze` behind an API key check and a tiered rate
//! limit:
//!
//! - 30 requests per minute per client on the standard tier (default)
//! - 5 requests per minute per client on the pro tier (default)
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (or a `.env` file):
//!
//! - `API_KEY`: Expected credential. Without it every analyze request fails with 500
//! - `PORT`: Listen port (default: 3000)
//! - `RATE_LIMIT_STANDARD`: Standard tier requests per window (default: 30)
//! - `RATE_LIMIT_PRO`: Pro tier requests per window (default: 5)
//! - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 60)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use credibility_gate::{config::Config, handlers::router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr(),
        standard_per_window = config.rate_limit.standard_per_window,
        pro_per_window = config.rate_limit.pro_per_window,
        window_secs = config.rate_limit.window_secs,
        credential_header = %config.auth.header_name,
        "Starting credibility gate"
    );
    if config.auth.api_key.is_none() {
        warn!("API_KEY is not set; analyze requests will fail with 500");
    }
    if config.rate_limit.pro_per_window < config.rate_limit.standard_per_window {
        warn!(
            standard = config.rate_limit.standard_per_window,
            pro = config.rate_limit.pro_per_window,
            "Pro tier limit is lower than standard tier limit"
        );
    }

    let state = Arc::new(AppState::with_defaults(config.clone())?);

    // Spawn cleanup task
    let cleanup_state = state.clone();
    let cleanup_interval = config.rate_limit.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
