//! HTTP client for the portal API, used by tooling and the integration tests.
//!
//! `ask_streaming` drives a `ChatSession` the way the portal's chat panel
//! does: the reply message is created up front and its text replaced on every
//! stream update.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::chat::ChatSession;
use crate::domain::{Category, Mcq};
use crate::stream::{ChatStreamAssembler, StreamUpdate};

pub const DEFAULT_VIDEO_TITLE: &str = "Medical Lecture";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("server returned {status}: {body}")]
  Status { status: u16, body: String },
  #[error("stream reported an error: {0}")]
  Stream(String),
}

#[derive(Clone, Debug)]
pub struct PortalClient {
  client: reqwest::Client,
  base_url: String,
}

#[derive(Deserialize)]
struct McqsOut {
  #[serde(default)]
  mcqs: Vec<Mcq>,
}

impl PortalClient {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self::with_client(reqwest::Client::new(), base_url)
  }

  pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
    Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn ok(res: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = res.status();
    if status.is_success() {
      return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ClientError::Status { status: status.as_u16(), body })
  }

  pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
    let res = self.client.get(self.url("/api/categories")).send().await?;
    Ok(Self::ok(res).await?.json().await?)
  }

  pub async fn generate_mcqs(&self, video_title: &str) -> Result<Vec<Mcq>, ClientError> {
    let res = self
      .client
      .post(self.url("/api/generate-mcqs"))
      .json(&json!({ "videoTitle": video_title }))
      .send()
      .await?;
    let out: McqsOut = Self::ok(res).await?.json().await?;
    Ok(out.mcqs)
  }

  /// Ask the question currently typed into `session`. Returns `Ok(None)` when
  /// the session refuses the turn (blank input or a reply in flight), else the
  /// final reply text. Failures leave the error reply in the transcript.
  #[instrument(level = "info", skip(self, session, video_title), fields(title = video_title.unwrap_or(DEFAULT_VIDEO_TITLE)))]
  pub async fn ask_streaming(
    &self,
    session: &mut ChatSession,
    video_title: Option<&str>,
  ) -> Result<Option<String>, ClientError> {
    let Some(question) = session.begin_turn() else { return Ok(None) };
    match self.stream_reply(session, &question, video_title.unwrap_or(DEFAULT_VIDEO_TITLE)).await {
      Ok(text) => {
        session.finish();
        info!(target: "chat", reply_len = text.len(), "Chat reply assembled");
        Ok(Some(text))
      }
      Err(e) => {
        warn!(target: "chat", error = %e, "Chat turn failed");
        session.fail();
        Err(e)
      }
    }
  }

  async fn stream_reply(
    &self,
    session: &mut ChatSession,
    question: &str,
    video_title: &str,
  ) -> Result<String, ClientError> {
    let res = self
      .client
      .post(self.url("/api/ai-chat"))
      .json(&json!({ "question": question, "videoTitle": video_title }))
      .send()
      .await?;
    let res = Self::ok(res).await?;

    let reply_id = session.start_reply();
    let mut assembler = ChatStreamAssembler::new();
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
      for update in assembler.push(&chunk?) {
        match update {
          StreamUpdate::Replace(text) => {
            session.replace_reply(&reply_id, &text);
          }
          StreamUpdate::Error(message) => return Err(ClientError::Stream(message)),
          StreamUpdate::Done => return Ok(assembler.text().to_string()),
        }
      }
    }
    // ending without the sentinel is a normal completion
    Ok(assembler.text().to_string())
  }
}
