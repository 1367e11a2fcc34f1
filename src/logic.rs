//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Catalog views (category detail with player URLs)
//!   - Chat: prompt building, one-shot answers and the streaming answer task
//!   - Quizzes: MCQ generation, caching and grading
//!   - Upstream diagnostics

use std::ops::ControlFlow;

use serde_json::json;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, instrument, warn};

use crate::domain::Mcq;
use crate::error::AppError;
use crate::gemini::{Gemini, GeminiError, ProbeResult};
use crate::protocol::{CategoryDetailOut, ChatOut, QuizAnswerOut, VideoOut};
use crate::quiz::{extract_mcqs, McqParseError};
use crate::references::{clean_double_numbering, extract_references};
use crate::state::AppState;
use crate::stream::END_STREAM;
use crate::util::{fill_template, is_blank, trunc_for_log};

pub const CHAT_FAILED: &str = "Failed to generate response";
pub const NO_ANSWER: &str = "Sorry, I could not generate a response.";
const NOT_CONFIGURED: &str = "Gemini API key not configured";
const CHAT_FRAME_BUFFER: usize = 32;

/// One frame of the chat event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatFrame {
  /// Full answer text so far.
  Text(String),
  Error(String),
  End,
}

impl ChatFrame {
  /// The `data:` payload for this frame.
  pub fn payload(&self) -> String {
    match self {
      ChatFrame::Text(text) => json!({ "text": text }).to_string(),
      ChatFrame::Error(msg) => json!({ "error": msg }).to_string(),
      ChatFrame::End => END_STREAM.to_string(),
    }
  }
}

fn require_gemini(state: &AppState) -> Result<&Gemini, AppError> {
  state.gemini.as_ref().ok_or_else(|| AppError::Upstream(NOT_CONFIGURED.into()))
}

#[instrument(level = "info", skip(state))]
pub fn category_detail(state: &AppState, id: &str) -> Result<CategoryDetailOut, AppError> {
  let category = state
    .catalog
    .category(id)
    .cloned()
    .ok_or_else(|| AppError::NotFound("Category not found".into()))?;
  let videos = state.catalog.videos_for_category(id).into_iter().map(VideoOut::from).collect();
  let subcategories = state.catalog.grouped_by_subcategory(id);
  Ok(CategoryDetailOut { category, videos, subcategories })
}

/// Both fields are required and must not be blank.
pub fn validate_chat(question: Option<&str>, video_title: Option<&str>) -> Result<(String, String), AppError> {
  match (question, video_title) {
    (Some(q), Some(t)) if !is_blank(q) && !is_blank(t) => Ok((q.trim().to_string(), t.trim().to_string())),
    _ => Err(AppError::BadRequest("Question and video title are required".into())),
  }
}

/// Quiz requests need a non-blank lecture title.
pub fn validate_video_title(video_title: Option<&str>) -> Result<String, AppError> {
  match video_title {
    Some(t) if !is_blank(t) => Ok(t.trim().to_string()),
    _ => Err(AppError::BadRequest("Missing videoTitle".into())),
  }
}

pub fn chat_prompt(state: &AppState, video_title: &str, question: &str) -> String {
  fill_template(&state.prompts.chat_template, &[("video_title", video_title), ("question", question)])
}

pub fn mcq_prompt(state: &AppState, video_title: &str) -> String {
  let count = state.mcq_count.to_string();
  fill_template(&state.prompts.mcq_template, &[("video_title", video_title), ("count", &count)])
}

/// Non-streaming answer with the references pulled out.
#[instrument(level = "info", skip(state, question), fields(question_len = question.len()))]
pub async fn answer_once(state: &AppState, question: &str, video_title: &str) -> Result<ChatOut, AppError> {
  let gemini = require_gemini(state)?;
  let prompt = chat_prompt(state, video_title, question);
  match gemini.generate(&prompt).await {
    Ok(text) => {
      let text = if is_blank(&text) { NO_ANSWER.to_string() } else { clean_double_numbering(&text) };
      let references = extract_references(&text);
      info!(target: "chat", %video_title, reply_len = text.len(), references = references.len(), "Chat answered");
      Ok(ChatOut { text, references })
    }
    Err(e) => {
      error!(target: "chat", %video_title, error = %e, "Chat generation failed");
      Err(AppError::Upstream(CHAT_FAILED.into()))
    }
  }
}

/// Start streaming an answer. The returned stream yields cumulative text
/// frames and always ends with `ChatFrame::End`.
///
/// Frames go through a bounded channel. When it is full an intermediate frame
/// is skipped, since the next one carries the same text and more. Once the
/// receiver is dropped the upstream request is abandoned.
#[instrument(level = "info", skip(state, question), fields(question_len = question.len()))]
pub fn stream_answer(
  state: &AppState,
  question: &str,
  video_title: &str,
) -> Result<ReceiverStream<ChatFrame>, AppError> {
  let gemini = require_gemini(state)?.clone();
  let prompt = chat_prompt(state, video_title, question);
  let title = video_title.to_string();
  let (tx, rx) = mpsc::channel(CHAT_FRAME_BUFFER);

  tokio::spawn(async move {
    let mut delivered = 0usize;
    let upstream = gemini.stream_generate(&prompt, |_, full| match tx.try_send(ChatFrame::Text(full.to_string())) {
      Ok(()) => {
        delivered = full.len();
        ControlFlow::Continue(())
      }
      Err(TrySendError::Full(_)) => ControlFlow::Continue(()),
      Err(TrySendError::Closed(_)) => ControlFlow::Break(()),
    });
    let result = tokio::select! {
      result = upstream => result,
      _ = tx.closed() => {
        info!(target: "chat", video_title = %title, "Client went away, chat stream dropped");
        return;
      }
    };
    if tx.is_closed() {
      info!(target: "chat", video_title = %title, "Client went away, chat stream stopped");
      return;
    }

    let last = match result {
      Ok(full) if is_blank(&full) => {
        warn!(target: "chat", video_title = %title, "Stream produced no text");
        Some(ChatFrame::Text(NO_ANSWER.into()))
      }
      Ok(full) => {
        info!(target: "chat", video_title = %title, reply_len = full.len(), "Chat stream finished");
        // the final text may have been skipped on a full channel
        (delivered != full.len()).then_some(ChatFrame::Text(full))
      }
      Err(e) => {
        error!(target: "chat", video_title = %title, error = %e, "Chat stream failed");
        Some(ChatFrame::Error(CHAT_FAILED.into()))
      }
    };
    for frame in last.into_iter().chain(std::iter::once(ChatFrame::End)) {
      if tx.send(frame).await.is_err() {
        break;
      }
    }
  });

  Ok(ReceiverStream::new(rx))
}

/// Ask the model for a quiz on this lecture and cache it for grading.
#[instrument(level = "info", skip(state))]
pub async fn generate_mcqs(state: &AppState, video_title: &str) -> Result<Vec<Mcq>, AppError> {
  let gemini = require_gemini(state)?;
  let text = gemini.generate(&mcq_prompt(state, video_title)).await.map_err(|e| {
    error!(target: "quiz", %video_title, error = %e, "MCQ generation failed");
    match e {
      GeminiError::Http { message, .. } => AppError::Upstream(message),
      other => AppError::Upstream(other.to_string()),
    }
  })?;

  let mcqs = extract_mcqs(&text).map_err(|e| match e {
    McqParseError::NoArray { raw } => {
      error!(target: "quiz", %video_title, raw = %trunc_for_log(&raw, 200), "No JSON array in model output");
      AppError::UpstreamParse { message: "Failed to parse MCQ JSON from Gemini response".into(), raw }
    }
    McqParseError::Json(err) => AppError::Upstream(err.to_string()),
  })?;

  info!(target: "quiz", %video_title, count = mcqs.len(), "MCQs generated");
  state.store_quiz(video_title, mcqs.clone()).await;
  Ok(mcqs)
}

/// Grade one answer against the cached quiz for this lecture.
#[instrument(level = "info", skip(state))]
pub async fn grade_answer(
  state: &AppState,
  video_title: &str,
  index: usize,
  selected: usize,
) -> Result<QuizAnswerOut, AppError> {
  let mcqs = state
    .quiz(video_title)
    .await
    .ok_or_else(|| AppError::NotFound(format!("No quiz generated for: {video_title}")))?;
  let mcq = mcqs
    .get(index)
    .ok_or_else(|| AppError::NotFound(format!("Question {index} does not exist")))?;
  if selected >= mcq.options.len() {
    return Err(AppError::BadRequest(format!("Option {selected} is out of range")));
  }
  let correct = selected == mcq.answer;
  info!(target: "quiz", %video_title, index, correct, "Quiz answer graded");
  Ok(QuizAnswerOut {
    correct,
    answer: mcq.answer,
    correct_option: mcq.correct_option().unwrap_or_default().to_string(),
    explanation: mcq.explanation.clone(),
    reference: mcq.reference.clone(),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn probe_upstream(state: &AppState) -> Result<Vec<ProbeResult>, AppError> {
  let gemini = state.gemini.as_ref().ok_or_else(|| AppError::Upstream("No API key found".into()))?;
  Ok(gemini.probe(&state.probe_endpoints).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{PortalConfig, Settings};

  fn offline_state() -> AppState {
    AppState::from_parts(Settings::default(), PortalConfig::default())
  }

  #[test]
  fn chat_validation() {
    assert!(validate_chat(Some("q"), None).is_err());
    assert!(validate_chat(Some("  "), Some("t")).is_err());
    assert_eq!(validate_chat(Some(" q "), Some("t")).unwrap(), ("q".to_string(), "t".to_string()));
    assert!(matches!(validate_video_title(Some(" \t")), Err(AppError::BadRequest(_))));
    assert_eq!(validate_video_title(Some(" Sepsis ")).unwrap(), "Sepsis");
  }

  #[test]
  fn prompts_are_filled() {
    let state = offline_state();
    let p = chat_prompt(&state, "Acute Kidney Injury", "What causes it?");
    assert!(p.contains("titled: \"Acute Kidney Injury\""));
    assert!(p.contains("Question: What causes it?"));
    let m = mcq_prompt(&state, "Sepsis");
    assert!(m.starts_with("You are an expert medical educator. Generate 3 "));
    assert!(m.contains("\"Sepsis\""));
  }

  #[test]
  fn frames_render_payloads() {
    assert_eq!(ChatFrame::Text("hi".into()).payload(), r#"{"text":"hi"}"#);
    assert_eq!(ChatFrame::End.payload(), "END_STREAM");
  }

  #[tokio::test]
  async fn offline_chat_is_not_configured() {
    let state = offline_state();
    match answer_once(&state, "q", "t").await {
      Err(AppError::Upstream(msg)) => assert_eq!(msg, NOT_CONFIGURED),
      other => panic!("unexpected {other:?}"),
    }
    assert!(stream_answer(&state, "q", "t").is_err());
  }

  #[tokio::test]
  async fn grading_uses_cached_quiz() {
    let state = offline_state();
    assert!(matches!(grade_answer(&state, "Sepsis", 0, 0).await, Err(AppError::NotFound(_))));
    state
      .store_quiz(
        "Sepsis",
        vec![Mcq {
          question: "First-line vasopressor?".into(),
          options: vec!["Dopamine".into(), "Norepinephrine".into()],
          answer: 1,
          explanation: "Per guidelines".into(),
          reference: String::new(),
        }],
      )
      .await;
    let out = grade_answer(&state, "Sepsis", 0, 1).await.unwrap();
    assert!(out.correct);
    assert_eq!(out.correct_option, "Norepinephrine");
    assert!(!grade_answer(&state, "Sepsis", 0, 0).await.unwrap().correct);
    assert!(matches!(grade_answer(&state, "Sepsis", 0, 5).await, Err(AppError::BadRequest(_))));
    assert!(matches!(grade_answer(&state, "Sepsis", 3, 0).await, Err(AppError::NotFound(_))));
  }

  #[test]
  fn category_detail_resolves_players() {
    let state = offline_state();
    let detail = category_detail(&state, "nephrology").unwrap();
    assert!(!detail.videos.is_empty());
    assert!(detail.videos.iter().all(|v| v.embed_url.is_some()));
    assert!(matches!(category_detail(&state, "nope"), Err(AppError::NotFound(_))));
  }
}
