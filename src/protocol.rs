//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::catalog::{embed_url, youtube_id};
use crate::domain::{Category, Mcq, SubcategoryGroup, VideoItem};
use crate::gemini::ProbeResult;
use crate::references::Reference;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Categories,
    Category {
        id: String,
    },
    Ask {
        question: String,
        #[serde(rename = "videoTitle")]
        video_title: String,
    },
    GenerateMcqs {
        #[serde(rename = "videoTitle")]
        video_title: String,
    },
    QuizAnswer {
        #[serde(rename = "videoTitle")]
        video_title: String,
        index: usize,
        selected: usize,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Categories {
        categories: Vec<Category>,
    },
    Category {
        detail: CategoryDetailOut,
    },
    Answer {
        text: String,
        references: Vec<Reference>,
    },
    Mcqs {
        #[serde(rename = "videoTitle")]
        video_title: String,
        mcqs: Vec<Mcq>,
    },
    QuizResult {
        result: QuizAnswerOut,
    },
    Error {
        message: String,
    },
}

/// A video plus its resolved player URLs.
#[derive(Debug, Serialize)]
pub struct VideoOut {
    #[serde(flatten)]
    pub video: VideoItem,
    #[serde(rename = "youtubeId")]
    pub youtube_id: Option<String>,
    #[serde(rename = "embedUrl")]
    pub embed_url: Option<String>,
}

impl From<VideoItem> for VideoOut {
    fn from(video: VideoItem) -> Self {
        let youtube_id = youtube_id(&video.url);
        let embed_url = youtube_id.as_deref().map(embed_url);
        Self { video, youtube_id, embed_url }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryDetailOut {
    pub category: Category,
    pub videos: Vec<VideoOut>,
    pub subcategories: Vec<SubcategoryGroup>,
}

//
// HTTP request/response DTOs
//

/// Fields are optional so a missing value reaches the handler's own
/// validation instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct ChatIn {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "videoTitle")]
    pub video_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub text: String,
    pub references: Vec<Reference>,
}

#[derive(Debug, Default, Deserialize)]
pub struct McqIn {
    #[serde(default, rename = "videoTitle")]
    pub video_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct McqOut {
    pub mcqs: Vec<Mcq>,
}

#[derive(Debug, Deserialize)]
pub struct QuizAnswerIn {
    #[serde(rename = "videoTitle")]
    pub video_title: String,
    pub index: usize,
    pub selected: usize,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct QuizAnswerOut {
    pub correct: bool,
    pub answer: usize,
    #[serde(rename = "correctOption")]
    pub correct_option: String,
    pub explanation: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub title: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub gemini: bool,
}

#[derive(Serialize)]
pub struct ProbeOut {
    pub results: Vec<ProbeResult>,
}
