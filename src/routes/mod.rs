//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{delete, get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/catalog", get(http::http_catalog))
    .route("/api/v1/llm/status", get(http::http_llm_status))
    .route("/api/v1/session", post(http::http_post_session))
    .route("/api/v1/profile", get(http::http_get_profile))
    .route("/api/v1/ask", post(http::http_post_ask))
    .route("/api/v1/chats", get(http::http_list_chats))
    .route("/api/v1/chats/:chat_id", get(http::http_get_chat))
    .route("/api/v1/chats/:chat_id/title", post(http::http_rename_chat))
    .route("/api/v1/cache", delete(http::http_clear_cache))
    .route("/api/v1/study-plan", post(http::http_post_study_plan))
    .route("/api/v1/calendar/schedule", post(http::http_post_schedule))
    .route("/api/v1/calendar/events", get(http::http_get_events))
    .route("/api/v1/calendar/complete", post(http::http_post_complete))
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .fallback_service(static_service)
}
