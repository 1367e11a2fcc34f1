//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request;
//! chat answers come back whole (use `/api/ai-chat` for streaming).

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "medlearn_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

fn encode(msg: &ServerWsMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "medlearn_backend", "WebSocket connected");
  let mut handled = 0usize;
  while let Some(Ok(msg)) = socket.recv().await {
    let reply = match msg {
      Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "medlearn_backend", "WS received: {:?}", &incoming);
          handled += 1;
          handle_client_ws(incoming, &state).await
        }
        Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
      },
      Message::Binary(_) => ServerWsMessage::Error { message: "Binary frames are not supported".into() },
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
        continue;
      }
      Message::Close(_) => break,
      Message::Pong(_) => continue,
    };

    if let Err(e) = socket.send(Message::Text(encode(&reply))).await {
      error!(target: "medlearn_backend", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "medlearn_backend", handled, "WebSocket disconnected");
}

/// Dispatch one client message. Failures become `error` messages carrying
/// the same text the HTTP endpoints would return.
#[instrument(level = "info", skip(state))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::Categories => Ok(ServerWsMessage::Categories { categories: state.catalog.categories_sorted() }),

    ClientWsMessage::Category { id } => {
      category_detail(state, &id).map(|detail| ServerWsMessage::Category { detail })
    }

    ClientWsMessage::Ask { question, video_title } => {
      match validate_chat(Some(&question), Some(&video_title)) {
        Ok((question, video_title)) => answer_once(state, &question, &video_title)
          .await
          .map(|out| ServerWsMessage::Answer { text: out.text, references: out.references }),
        Err(e) => Err(e),
      }
    }

    ClientWsMessage::GenerateMcqs { video_title } => match validate_video_title(Some(&video_title)) {
      Ok(video_title) => generate_mcqs(state, &video_title)
        .await
        .map(|mcqs| ServerWsMessage::Mcqs { video_title, mcqs }),
      Err(e) => Err(e),
    },

    ClientWsMessage::QuizAnswer { video_title, index, selected } => {
      grade_answer(state, &video_title, index, selected)
        .await
        .map(|result| ServerWsMessage::QuizResult { result })
    }
  };
  result.unwrap_or_else(|e| ServerWsMessage::Error { message: e.to_string() })
}
