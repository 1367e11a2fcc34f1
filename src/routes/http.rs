//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::{rejection::JsonRejection, Path, Query, State},
  response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse, Response,
  },
  Json,
};
use futures_util::StreamExt;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, gemini: state.gemini.is_some() })
}

pub async fn method_not_allowed() -> AppError {
  AppError::MethodNotAllowed
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.catalog.categories_sorted())
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_category(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<CategoryDetailOut>, AppError> {
  let detail = category_detail(&state, &id)?;
  info!(target: "medlearn_backend", %id, videos = detail.videos.len(), "Category served");
  Ok(Json(detail))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_groups(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.catalog.category_groups())
}

#[instrument(level = "info", skip(state), fields(title = %q.title))]
pub async fn http_get_video(
  State(state): State<Arc<AppState>>,
  Query(q): Query<VideoQuery>,
) -> Result<Json<VideoOut>, AppError> {
  let video = state
    .catalog
    .find_video(&q.title)
    .cloned()
    .ok_or_else(|| AppError::NotFound(format!("Video not found: {}", q.title)))?;
  Ok(Json(VideoOut::from(video)))
}

/// Answers as an event stream of cumulative `{"text"}` frames ending with
/// `END_STREAM`; `?stream=false` returns a single JSON object instead.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ChatQuery>,
  body: Result<Json<ChatIn>, JsonRejection>,
) -> Result<Response, AppError> {
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let (question, video_title) = validate_chat(body.question.as_deref(), body.video_title.as_deref())?;
  info!(target: "chat", %video_title, question_len = question.len(), stream = q.stream.unwrap_or(true), "Chat request");

  if q.stream == Some(false) {
    let out = answer_once(&state, &question, &video_title).await?;
    return Ok(Json(out).into_response());
  }

  let frames = stream_answer(&state, &question, &video_title)?;
  let events = frames.map(|frame| Ok::<Event, Infallible>(Event::default().data(frame.payload())));
  Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_generate_mcqs(
  State(state): State<Arc<AppState>>,
  body: Result<Json<McqIn>, JsonRejection>,
) -> Result<Json<McqOut>, AppError> {
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let video_title = validate_video_title(body.video_title.as_deref())?;
  let mcqs = generate_mcqs(&state, &video_title).await?;
  Ok(Json(McqOut { mcqs }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_quiz_answer(
  State(state): State<Arc<AppState>>,
  body: Result<Json<QuizAnswerIn>, JsonRejection>,
) -> Result<Json<QuizAnswerOut>, AppError> {
  let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
  let out = grade_answer(&state, &body.video_title, body.index, body.selected).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_test_gemini(State(state): State<Arc<AppState>>) -> Result<Json<ProbeOut>, AppError> {
  let results = probe_upstream(&state).await?;
  Ok(Json(ProbeOut { results }))
}
