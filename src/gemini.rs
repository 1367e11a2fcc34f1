//! Minimal Gemini (Google generative-language API) client for our use-cases.
//!
//! We call `generateContent` for one-shot answers, `streamGenerateContent`
//! (SSE framing) for live chat, and a bare "Hello" probe for diagnostics.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: the API key travels as the `key` query parameter and is never logged.

use std::{
  ops::ControlFlow,
  time::{Duration, Instant},
};

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::config::{GenerationConfig, ProbeEndpoint, Settings};
use crate::stream::{data_payload, LineBuffer};

const HARM_CATEGORIES: [&str; 4] = [
  "HARM_CATEGORY_HARASSMENT",
  "HARM_CATEGORY_HATE_SPEECH",
  "HARM_CATEGORY_SEXUALLY_EXPLICIT",
  "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const BLOCK_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const UA: &str = concat!("medlearn-backend/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
  #[error("Gemini transport error: {0}")]
  Transport(reqwest::Error),
  #[error("Gemini API error: {status} - {message}")]
  Http { status: u16, message: String },
  #[error("Gemini response decode error: {0}")]
  Decode(#[from] serde_json::Error),
}

// Request URLs carry the API key, so they are stripped from transport errors.
impl From<reqwest::Error> for GeminiError {
  fn from(e: reqwest::Error) -> Self {
    GeminiError::Transport(e.without_url())
  }
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  pub generation: GenerationConfig,
}

impl std::fmt::Debug for Gemini {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Gemini")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .finish_non_exhaustive()
  }
}

/// Outcome of probing one endpoint.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProbeResult {
  pub name: String,
  pub status: ProbeStatus,
  pub ok: bool,
  pub error: Option<String>,
}

/// HTTP status code, or the literal "ERROR" when the request never completed.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProbeStatus {
  Code(u16),
  Failed(&'static str),
}

impl Gemini {
  /// Construct the client if an API key is configured; otherwise return None.
  pub fn from_settings(settings: &Settings, generation: GenerationConfig) -> Option<Self> {
    let api_key = settings.gemini_api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.gemini_timeout_secs))
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key,
      base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
      model: settings.gemini_model.clone(),
      generation,
    })
  }

  fn model_url(&self, model: &str, method: &str) -> String {
    format!("{}/models/{}:{}", self.base_url, model, method)
  }

  fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
      contents: vec![Content { parts: vec![Part { text: prompt }] }],
      generation_config: GenerationParams {
        temperature: self.generation.temperature,
        top_k: self.generation.top_k,
        top_p: self.generation.top_p,
        max_output_tokens: self.generation.max_output_tokens,
      },
      safety_settings: HARM_CATEGORIES
        .iter()
        .map(|&category| SafetySetting { category, threshold: BLOCK_THRESHOLD })
        .collect(),
    }
  }

  /// One-shot completion. Returns the first candidate's first text part, or
  /// an empty string when the model produced none.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
    let start = Instant::now();
    let res = self
      .client
      .post(self.model_url(&self.model, "generateContent"))
      .query(&[("key", self.api_key.as_str())])
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .json(&self.request_body(prompt))
      .send()
      .await?;
    let res = ensure_success(res).await?;

    let body: GenerateResponse = res.json().await?;
    body.log_usage();
    let text = body.first_part_text();
    info!(target: "gemini", elapsed = ?start.elapsed(), text_len = text.len(), "Gemini response received");
    Ok(text)
  }

  /// Streaming completion. `on_text(delta, full)` runs for every non-empty
  /// chunk and returns `Break` to stop reading; the text gathered so far is
  /// returned either way.
  #[instrument(level = "info", skip(self, prompt, on_text), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn stream_generate<F>(&self, prompt: &str, mut on_text: F) -> Result<String, GeminiError>
  where
    F: FnMut(&str, &str) -> ControlFlow<()>,
  {
    let start = Instant::now();
    let res = self
      .client
      .post(self.model_url(&self.model, "streamGenerateContent"))
      .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .json(&self.request_body(prompt))
      .send()
      .await?;
    let res = ensure_success(res).await?;

    let mut body = res.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut full = String::new();
    let mut chunks = 0usize;
    'read: while let Some(chunk) = body.next().await {
      let chunk = chunk?;
      for line in lines.push(&chunk) {
        let Some(payload) = data_payload(&line) else { continue };
        match serde_json::from_str::<GenerateResponse>(payload) {
          Ok(resp) => {
            resp.log_usage();
            let delta = resp.candidate_text();
            if delta.is_empty() {
              continue;
            }
            chunks += 1;
            full.push_str(&delta);
            if on_text(&delta, &full).is_break() {
              info!(target: "gemini", chunks, "Stream consumer stopped, closing upstream");
              break 'read;
            }
          }
          Err(e) => debug!(target: "gemini", error = %e, "Skipping undecodable stream chunk"),
        }
      }
    }
    info!(target: "gemini", elapsed = ?start.elapsed(), chunks, text_len = full.len(), "Gemini stream finished");
    Ok(full)
  }

  /// Send "Hello" to each endpoint and report what came back.
  #[instrument(level = "info", skip(self, endpoints), fields(count = endpoints.len()))]
  pub async fn probe(&self, endpoints: &[ProbeEndpoint]) -> Vec<ProbeResult> {
    let body = json!({ "contents": [{ "parts": [{ "text": "Hello" }] }] });
    let mut results = Vec::with_capacity(endpoints.len());
    for ep in endpoints {
      let url = match (&ep.url, &ep.model) {
        (Some(url), _) => url.clone(),
        (None, Some(model)) => self.model_url(model, "generateContent"),
        (None, None) => self.model_url(&self.model, "generateContent"),
      };
      let sent = self
        .client
        .post(&url)
        .query(&[("key", self.api_key.as_str())])
        .header(CONTENT_TYPE, "application/json")
        .json(&body)
        .send()
        .await;
      let result = match sent {
        Ok(res) => {
          let status = res.status();
          let error = if status.is_success() { None } else { Some(res.text().await.unwrap_or_default()) };
          ProbeResult { name: ep.name.clone(), status: ProbeStatus::Code(status.as_u16()), ok: status.is_success(), error }
        }
        Err(e) => {
          let e = e.without_url();
          error!(target: "gemini", endpoint = %ep.name, error = %e, "Probe request failed");
          ProbeResult { name: ep.name.clone(), status: ProbeStatus::Failed("ERROR"), ok: false, error: Some(e.to_string()) }
        }
      };
      info!(target: "gemini", endpoint = %result.name, ok = result.ok, "Probe finished");
      results.push(result);
    }
    results
  }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let message = extract_gemini_error(&body).unwrap_or(body);
  error!(target: "gemini", status = status.as_u16(), "Gemini returned an error status");
  Err(GeminiError::Http { status: status.as_u16(), message })
}

// --- Request DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  contents: Vec<Content<'a>>,
  generation_config: GenerationParams,
  safety_settings: Vec<SafetySetting>,
}
#[derive(Serialize)]
struct Content<'a> {
  parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Part<'a> {
  text: &'a str,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
  temperature: f32,
  top_k: u32,
  top_p: f32,
  max_output_tokens: u32,
}
#[derive(Serialize)]
struct SafetySetting {
  category: &'static str,
  threshold: &'static str,
}

// --- Response DTOs ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<ContentResp>,
}
#[derive(Deserialize)]
struct ContentResp {
  #[serde(default)]
  parts: Vec<PartResp>,
}
#[derive(Deserialize)]
struct PartResp {
  #[serde(default)]
  text: Option<String>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

impl GenerateResponse {
  fn parts(&self) -> impl Iterator<Item = &PartResp> {
    self.candidates.first().and_then(|c| c.content.as_ref()).into_iter().flat_map(|c| c.parts.iter())
  }

  fn first_part_text(&self) -> String {
    self.parts().next().and_then(|p| p.text.clone()).unwrap_or_default()
  }

  /// All text parts of the first candidate, concatenated. Stream chunks may
  /// split one delta across parts.
  fn candidate_text(&self) -> String {
    self.parts().filter_map(|p| p.text.as_deref()).collect()
  }

  fn log_usage(&self) {
    if let Some(u) = &self.usage_metadata {
      debug!(target: "gemini", prompt_tokens = ?u.prompt_token_count, completion_tokens = ?u.candidates_token_count, total_tokens = ?u.total_token_count, "Gemini usage");
    }
  }
}

/// Try to extract a clean error message from a Google API error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> Gemini {
    let settings = Settings { gemini_api_key: Some("k".into()), ..Settings::default() };
    Gemini::from_settings(&settings, GenerationConfig::default()).unwrap()
  }

  #[test]
  fn disabled_without_key() {
    assert!(Gemini::from_settings(&Settings::default(), GenerationConfig::default()).is_none());
  }

  #[test]
  fn request_body_shape() {
    let g = client();
    let v = serde_json::to_value(g.request_body("hi")).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(v["generationConfig"]["topK"], 40);
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 4096);
    assert_eq!(v["safetySettings"].as_array().unwrap().len(), 4);
    assert_eq!(v["safetySettings"][0]["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
  }

  #[test]
  fn model_url_uses_base_and_method() {
    let g = client();
    assert_eq!(
      g.model_url("gemini-2.5-pro", "generateContent"),
      "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
    );
  }

  #[test]
  fn response_text_extraction() {
    let r: GenerateResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}],"usageMetadata":{"totalTokenCount":3}}"#,
    )
    .unwrap();
    assert_eq!(r.first_part_text(), "a");
    assert_eq!(r.candidate_text(), "ab");

    let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
    assert_eq!(empty.first_part_text(), "");
    let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
    assert_eq!(blocked.candidate_text(), "");
  }

  #[test]
  fn error_envelope_is_unwrapped() {
    assert_eq!(
      extract_gemini_error(r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#).as_deref(),
      Some("API key not valid")
    );
    assert_eq!(extract_gemini_error("nope"), None);
  }

  #[test]
  fn debug_hides_key() {
    assert!(!format!("{:?}", client()).contains("api_key"));
  }

  #[test]
  fn probe_status_serializes_untagged() {
    assert_eq!(serde_json::to_string(&ProbeStatus::Code(200)).unwrap(), "200");
    assert_eq!(serde_json::to_string(&ProbeStatus::Failed("ERROR")).unwrap(), "\"ERROR\"");
  }
}
