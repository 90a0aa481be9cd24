//! Trailhead · Camping & National Parks Backend
//!
//! - Axum HTTP + WebSocket API
//! - Park quiz (score → park) with per-user results
//! - Camping-advice chat assistant with bounded per-session history
//! - Static frontend fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   GEMINI_API_KEY         : enables the Gemini provider if present
//!   GEMINI_BASE_URL        : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL           : default "gemini-1.5-flash"
//!   OPENAI_API_KEY         : enables an OpenAI-compatible provider (used when Gemini is not set)
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_MODEL           : default "gpt-4o-mini"
//!   TRAILHEAD_CONFIG_PATH  : path to TOML config (chat settings, generation, park table)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod history;
mod parks;
mod provider;
mod chat;
mod store;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, park table, provider, sessions and stores.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "trailhead", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "trailhead", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "trailhead", error = %e, "Failed to listen for shutdown signal");
  }
}
