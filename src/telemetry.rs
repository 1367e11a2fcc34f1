//! Logging setup for the portal (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL holds EnvFilter directives, e.g. "debug" or
//!   "info,chat=debug,quiz=debug,gemini=debug,tower_http=info".
//! - LOG_FORMAT is "pretty" (default), "compact" or "json".
//!
//! Targets used across the crate: `medlearn_backend` (server and catalog),
//! `chat`, `quiz` and `gemini` (upstream calls). Request spans come from the
//! TraceLayer in `routes`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,medlearn_backend=debug,chat=debug,quiz=debug,gemini=info,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to pretty output.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // each arm finishes its own builder; the layer types differ
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.init(),
    }
    tracing::debug!(target: "medlearn_backend", ?format, "Tracing initialized");
}
