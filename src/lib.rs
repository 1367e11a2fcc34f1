//! MedLearn portal backend: lecture catalog, Gemini-backed chat with streamed
//! answers, and generated multiple-choice quizzes.

pub mod catalog;
pub mod chat;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod gemini;
pub mod logic;
pub mod protocol;
pub mod quiz;
pub mod references;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod util;

pub use routes::build_router;
pub use state::AppState;
