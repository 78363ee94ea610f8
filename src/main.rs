//! Study Tutor Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gamification (points, levels, achievements, streaks) persisted as JSON files
//! - LLM tutoring with a response cache and rate-limit backoff
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   LLM_API_KEY       : enables tutoring (GROQ_API_KEY is accepted too)
//!   LLM_BASE_URL      : default "https://api.groq.com/openai/v1"
//!   LLM_MODEL         : default "llama3-70b-8192"
//!   STUDY_PLAN_MODEL  : defaults to LLM_MODEL
//!   AGENT_CONFIG_PATH : path to TOML config (prompts, LLM tuning, storage)
//!   DATA_DIR          : overrides the storage directory
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod cache;
mod calendar;
mod catalog;
mod chat;
mod clock;
mod config;
mod domain;
mod error;
mod gamification;
mod levels;
mod llm;
mod protocol;
mod retry;
mod routes;
mod state;
mod store;
mod study_plan;
mod telemetry;
mod tutor;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::load_agent_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = load_agent_config_from_env();
  let state = Arc::new(AppState::new(cfg).await?);

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "study_tutor", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "study_tutor", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "study_tutor", "Shutdown signal received");
}
