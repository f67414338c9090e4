//! QuizHive backend entry point.
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   QUIZ_CONFIG_PATH  : path to TOML config (caps, economy, question bank)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tracing::info;

use quizhive_backend::lobby::spawn_reaper;
use quizhive_backend::routes::build_router;
use quizhive_backend::state::AppState;
use quizhive_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Shared application state (catalog, quotas, banks, lobby).
    let state = Arc::new(AppState::new());

    // Periodic eviction of abandoned lobby sessions.
    spawn_reaper(
        state.lobby.clone(),
        Duration::from_secs(state.config.session.ttl_secs),
        Duration::from_secs(state.config.session.reap_interval_secs),
    );

    let app = build_router(state);

    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "quizhive_backend", %addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
