//! MedLearn · Medical Education Portal Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini integration for chat and quizzes (via environment variables)
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : enables chat/quiz generation if present
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-2.5-pro"
//!   GEMINI_TIMEOUT_SECS : upstream request timeout (default 60)
//!   PORTAL_CONFIG_PATH  : path to TOML config (prompts, generation, catalog)
//!   STATIC_DIR          : SPA bundle directory (default "./static")
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use medlearn_backend::{build_router, telemetry, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (catalog, prompts, Gemini client, quiz cache).
  let state = Arc::new(AppState::from_env());
  let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "medlearn_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "medlearn_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "medlearn_backend", "Shutdown signal received");
}
