//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{AskOut, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::tutor;
use crate::util::non_blank;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "study_tutor", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "study_tutor", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "study_tutor", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "study_tutor", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "study_tutor", "WebSocket disconnected");
}

async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { user_id } => match non_blank(Some(user_id.as_str())) {
      None => missing_user(),
      Some(user_id) => match state.gamification.update_streak(user_id).await {
        Ok(streak) => ServerWsMessage::Session { streak },
        Err(e) => storage_failure(e),
      },
    },

    ClientWsMessage::Ask(mut req) => {
      let Some(user_id) = non_blank(Some(req.user_id.as_str())) else {
        return missing_user();
      };
      req.user_id = user_id.to_string();
      if non_blank(Some(req.question.as_str())).is_none() {
        return ServerWsMessage::Error { message: "question is required".into() };
      }
      match tutor::ask(state, &req).await {
        Ok(outcome) => ServerWsMessage::Answer(AskOut::from(outcome)),
        Err(e) => storage_failure(e),
      }
    }

    ClientWsMessage::Profile { user_id } => match non_blank(Some(user_id.as_str())) {
      None => missing_user(),
      Some(user_id) => match state.gamification.dashboard(user_id).await {
        Ok(dashboard) => ServerWsMessage::Profile { dashboard },
        Err(e) => storage_failure(e),
      },
    },
  }
}

fn missing_user() -> ServerWsMessage {
  ServerWsMessage::Error { message: "user_id is required".into() }
}

fn storage_failure(e: crate::error::StoreError) -> ServerWsMessage {
  error!(target: "study_tutor", error = %e, "Persistence failure");
  ServerWsMessage::Error { message: "An internal error occurred".into() }
}
