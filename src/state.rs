//! Application state: catalog, prompts, optional Gemini client, and the
//! in-memory quiz cache.
//!
//! Quizzes are cached per video title so that answers can be graded against
//! the exact questions the learner was shown. Regenerating replaces the entry.
//! Titles come from clients, so the cache is capped and the oldest quiz is
//! evicted first.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::catalog::Catalog;
use crate::config::{default_probe_endpoints, load_from_settings, PortalConfig, ProbeEndpoint, Prompts, Settings};
use crate::domain::Mcq;
use crate::gemini::Gemini;

pub const QUIZ_CACHE_CAPACITY: usize = 256;

/// Quizzes keyed by video title, bounded to `capacity` entries.
#[derive(Debug)]
pub struct QuizCache {
    capacity: usize,
    entries: HashMap<String, Vec<Mcq>>,
    /// Titles from oldest to newest store.
    order: VecDeque<String>,
}

impl QuizCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), order: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&Vec<Mcq>> {
        self.entries.get(title)
    }

    /// Store a quiz; storing an existing title makes it the newest again.
    pub fn insert(&mut self, title: &str, mcqs: Vec<Mcq>) {
        if self.entries.insert(title.to_string(), mcqs).is_some() {
            self.order.retain(|t| t != title);
        }
        self.order.push_back(title.to_string());
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.entries.remove(&oldest);
            debug!(target: "quiz", video_title = %oldest, "Evicted cached quiz");
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub catalog: Catalog,
    pub gemini: Option<Gemini>,
    pub prompts: Prompts,
    pub mcq_count: u32,
    pub probe_endpoints: Vec<ProbeEndpoint>,
    pub quizzes: Arc<RwLock<QuizCache>>,
}

impl AppState {
    /// Build state from env: load config, build the catalog, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let settings = Settings::from_env();
        let cfg = load_from_settings(&settings);
        Self::from_parts(settings, cfg)
    }

    pub fn from_parts(settings: Settings, cfg: PortalConfig) -> Self {
        let catalog = Catalog::from_config(&cfg);

        let gemini = Gemini::from_settings(&settings, cfg.generation.clone());
        if let Some(g) = &gemini {
            info!(target: "medlearn_backend", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
        } else {
            info!(target: "medlearn_backend", "Gemini disabled (no GEMINI_API_KEY). Chat and quizzes will answer 500.");
        }

        let probe_endpoints = if cfg.probe_endpoints.is_empty() {
            default_probe_endpoints()
        } else {
            cfg.probe_endpoints
        };

        Self {
            settings,
            catalog,
            gemini,
            prompts: cfg.prompts,
            mcq_count: cfg.generation.mcq_count,
            probe_endpoints,
            quizzes: Arc::new(RwLock::new(QuizCache::new(QUIZ_CACHE_CAPACITY))),
        }
    }

    #[instrument(level = "debug", skip(self, mcqs), fields(count = mcqs.len()))]
    pub async fn store_quiz(&self, video_title: &str, mcqs: Vec<Mcq>) {
        self.quizzes.write().await.insert(video_title, mcqs);
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn quiz(&self, video_title: &str) -> Option<Vec<Mcq>> {
        self.quizzes.read().await.get(video_title).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(question: &str) -> Vec<Mcq> {
        vec![Mcq {
            question: question.into(),
            options: vec!["a".into(), "b".into()],
            answer: 0,
            explanation: String::new(),
            reference: String::new(),
        }]
    }

    #[test]
    fn cache_evicts_oldest_title() {
        let mut cache = QuizCache::new(2);
        cache.insert("Sepsis", quiz("s"));
        cache.insert("Asthma", quiz("a"));
        cache.insert("Sepsis", quiz("s2"));
        cache.insert("Gout", quiz("g"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("Asthma").is_none(), "least recently stored goes first");
        assert_eq!(cache.get("Sepsis").map(|q| q[0].question.as_str()), Some("s2"));
        assert!(cache.get("Gout").is_some());
    }

    #[tokio::test]
    async fn state_cache_stays_bounded() {
        let state = AppState::from_parts(Settings::default(), PortalConfig::default());
        for i in 0..QUIZ_CACHE_CAPACITY + 10 {
            state.store_quiz(&format!("Lecture {i}"), quiz("q")).await;
        }
        assert_eq!(state.quizzes.read().await.len(), QUIZ_CACHE_CAPACITY);
        assert!(state.quiz("Lecture 0").await.is_none());
        assert!(state.quiz(&format!("Lecture {}", QUIZ_CACHE_CAPACITY + 9)).await.is_some());
    }
}
