//! Runtime settings (environment) and portal configuration (TOML).
//!
//! The TOML file named by `PORTAL_CONFIG_PATH` may override prompts, generation
//! parameters, the catalog and the diagnostic probe endpoints. Any section left
//! out keeps its default. See `PortalConfig` for the schema.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Category, VideoItem};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// Process-level settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub gemini_api_key: Option<String>,
  pub gemini_base_url: String,
  pub gemini_model: String,
  pub gemini_timeout_secs: u64,
  pub config_path: Option<String>,
  pub static_dir: String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      port: 3000,
      gemini_api_key: None,
      gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
      gemini_model: DEFAULT_GEMINI_MODEL.into(),
      gemini_timeout_secs: 60,
      config_path: None,
      static_dir: "./static".into(),
    }
  }
}

impl Settings {
  pub fn from_env() -> Self {
    let defaults = Self::default();
    Self {
      port: std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(defaults.port),
      gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
      gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
      gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
      gemini_timeout_secs: std::env::var("GEMINI_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.gemini_timeout_secs),
      config_path: std::env::var("PORTAL_CONFIG_PATH").ok(),
      static_dir: std::env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PortalConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationConfig,
  /// When non-empty, replaces the built-in category list.
  #[serde(default)]
  pub categories: Vec<Category>,
  /// When non-empty, replaces the built-in video list.
  #[serde(default)]
  pub videos: Vec<VideoItem>,
  /// When non-empty, replaces the default diagnostic probe list.
  #[serde(default)]
  pub probe_endpoints: Vec<ProbeEndpoint>,
}

/// Sampling parameters forwarded as Gemini `generationConfig`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
  pub temperature: f32,
  pub top_k: u32,
  pub top_p: f32,
  pub max_output_tokens: u32,
  /// How many questions the quiz prompt asks for.
  pub mcq_count: u32,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self { temperature: 0.3, top_k: 40, top_p: 0.95, max_output_tokens: 4096, mcq_count: 3 }
  }
}

/// A model endpoint checked by `/api/test-gemini`. `model` is resolved
/// against the configured base URL; `url` is used verbatim when given.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProbeEndpoint {
  pub name: String,
  #[serde(default)]
  pub model: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
}

pub fn default_probe_endpoints() -> Vec<ProbeEndpoint> {
  ["gemini-2.5-pro", "gemini-1.5-flash", "gemini-pro"]
    .iter()
    .map(|m| ProbeEndpoint { name: format!("Google AI Studio - {m}"), model: Some((*m).to_string()), url: None })
    .collect()
}

/// Prompt templates. Placeholders: `{video_title}`, `{question}`, `{count}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub chat_template: String,
  pub mcq_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      chat_template: r#"You are an expert medical AI assistant. The user is watching a medical lecture titled: "{video_title}".

Please answer the following medical question with detailed, accurate information. When possible, reference verified medical sources like PubMed, MedScape, or other peer-reviewed medical literature.

Question: {question}

Please provide a comprehensive answer that:
1. Directly addresses the question
2. Includes relevant medical information
3. References verified sources when applicable
4. Is appropriate for medical education
5. Maintains professional medical terminology

Keep your answer concise and focused on the most important key points. Use bullet points or short paragraphs. Avoid unnecessary elaboration or repetition.

Format your response with:
- Use **bold** for section headers, but do NOT number the section headers (e.g., use **Infections:** not **1. Infections:**)
- Only use numbered references [1], [2], etc. for citations in the text
- At the end, provide a "References" section with clickable links to PubMed, MedScape, or other medical sources
- For PubMed references, use format: [1] Author et al. (Year). Title. Journal. PMID: [PubMed ID]
- For MedScape references, use format: [2] Article Title. MedScape. [URL]
- Do NOT include any disclaimer section

Answer:"#
        .into(),
      mcq_template: r#"You are an expert medical educator. Generate {count} high-quality multiple-choice questions (MCQs) for the topic: "{video_title}". Each MCQ should have:
- A clear question
- 5 answer options (A, B, C, D, E)
- The correct answer (as the index: 0 for A, 1 for B, etc.)
- A concise explanation for the answer
- A reference (PubMed or MedScape style, with a clickable URL if possible)

Format your response as a JSON array, like this:
[
  {
    "question": "...",
    "options": ["...", "...", "...", "...", "..."],
    "answer": 2,
    "explanation": "...",
    "reference": "[1] Author. Title. Journal. PMID: 12345678"
  },
  ...
]
Do not include any text before or after the JSON array."#
        .into(),
    }
  }
}

/// Load `PortalConfig` from a TOML file. On any parsing/IO error, returns None.
pub fn load_portal_config(path: &Path) -> Option<PortalConfig> {
  let shown = path.display().to_string();
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PortalConfig>(&s) {
      Ok(cfg) => {
        info!(target: "medlearn_backend", path = %shown, "Loaded portal config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "medlearn_backend", path = %shown, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "medlearn_backend", path = %shown, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Resolve the portal config named in the settings, falling back to defaults.
pub fn load_from_settings(settings: &Settings) -> PortalConfig {
  settings
    .config_path
    .as_deref()
    .and_then(|p| load_portal_config(Path::new(p)))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: PortalConfig = toml::from_str(
      r#"
      [generation]
      temperature = 0.7

      [[categories]]
      id = "cardiology"
      name = "Cardiology"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.generation.temperature, 0.7);
    assert_eq!(cfg.generation.top_k, 40);
    assert_eq!(cfg.generation.mcq_count, 3);
    assert_eq!(cfg.categories.len(), 1);
    assert!(cfg.categories[0].icon.is_empty());
    assert!(cfg.prompts.chat_template.contains("{question}"));
  }

  #[test]
  fn videos_use_capitalized_keys() {
    let cfg: PortalConfig = toml::from_str(
      r#"
      [[videos]]
      Title = "Hyponatremia"
      Category = "Renal"
      Subcategory = 3
      URL = "https://youtu.be/abc"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.videos[0].title, "Hyponatremia");
    assert_eq!(cfg.videos[0].subcategory, 3);
  }

  #[test]
  fn missing_file_yields_none() {
    assert!(load_portal_config(Path::new("/definitely/not/here.toml")).is_none());
  }
}
