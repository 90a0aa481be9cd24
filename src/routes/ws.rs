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
use tracing::{info, error, instrument, debug};

use crate::logic::{chat_turn, submit_quiz, user_or_anonymous};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "trailhead", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "trailhead", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match on_frame(msg, &state).await {
      Inbound::Reply(out) => {
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "trailhead", error = %e, "WS send error");
          break;
        }
      }
      Inbound::Ignore => {}
      Inbound::Close => break,
    }
  }
  info!(target: "trailhead", "WebSocket disconnected");
}

/// What the loop does with one inbound frame.
#[derive(Debug, PartialEq)]
enum Inbound {
  Reply(String),
  Ignore,
  Close,
}

async fn on_frame(msg: Message, state: &AppState) -> Inbound {
  match msg {
    Message::Text(txt) => {
      let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "trailhead", "WS received: {:?}", &incoming);
          handle_client_ws(incoming, state).await
        }
        Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
      };

      let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
      });
      Inbound::Reply(out)
    }
    Message::Close(_) => Inbound::Close,
    // axum answers pings itself.
    _ => Inbound::Ignore,
  }
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Chat { session_id, user_input, category } => {
      match chat_turn(state, session_id.as_deref(), &user_input, category.as_deref()).await {
        Ok(reply) => ServerWsMessage::ChatReply { reply },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::SubmitQuiz { user, total_points } => {
      let user = user_or_anonymous(user.as_deref());
      match submit_quiz(state, user, total_points).await {
        Ok(result) => ServerWsMessage::QuizResult { result },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::ResetChat { session_id } => {
      if state.remove_session(&session_id).await {
        ServerWsMessage::Reset { session_id }
      } else {
        ServerWsMessage::Error { message: "Chat session not found".into() }
      }
    }
  }
}
