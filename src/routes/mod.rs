//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
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
/// - JSON / SSE API under `/api/...`
/// - Static SPA from `STATIC_DIR` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.settings.static_dir.clone();
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Catalog
        .route("/api/health", get(http::http_health))
        .route("/api/categories", get(http::http_get_categories))
        .route("/api/categories/:id", get(http::http_get_category))
        .route("/api/groups", get(http::http_get_groups))
        .route("/api/videos", get(http::http_get_video))
        // AI
        .route(
            "/api/ai-chat",
            post(http::http_post_chat).fallback(http::method_not_allowed),
        )
        .route(
            "/api/generate-mcqs",
            post(http::http_post_generate_mcqs).fallback(http::method_not_allowed),
        )
        .route(
            "/api/quiz/answer",
            post(http::http_post_quiz_answer).fallback(http::method_not_allowed),
        )
        .route(
            "/api/test-gemini",
            get(http::http_test_gemini).fallback(http::method_not_allowed),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
