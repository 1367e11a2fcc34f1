//! Domain models used by the backend: catalog entries, quiz items, chat messages.

use serde::{Deserialize, Serialize};

/// A browsable course category (one tile on the catalogue page).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
  /// URL slug, e.g. "cardiology".
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub icon: String,
}

/// A single lecture video. Field names keep the capitalized spelling used by
/// the catalog data files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoItem {
  #[serde(rename = "Title")]
  pub title: String,
  #[serde(rename = "Category")]
  pub category: String,
  #[serde(rename = "Subcategory")]
  pub subcategory: u32,
  #[serde(rename = "URL")]
  pub url: String,
}

/// Videos sharing a `Category` value (sidebar filter).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CategoryGroup {
  pub category: String,
  pub videos: Vec<VideoItem>,
}

/// Videos of one category sharing a `Subcategory` number.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SubcategoryGroup {
  pub subcategory: u32,
  pub videos: Vec<VideoItem>,
}

/// One generated multiple-choice question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mcq {
  pub question: String,
  pub options: Vec<String>,
  /// Index into `options`.
  pub answer: usize,
  #[serde(default)]
  pub explanation: String,
  #[serde(default)]
  pub reference: String,
}

impl Mcq {
  pub fn correct_option(&self) -> Option<&str> {
    self.options.get(self.answer).map(String::as_str)
  }
}

/// A chat transcript entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
  pub id: String,
  pub text: String,
  #[serde(rename = "isUser")]
  pub is_user: bool,
  /// Milliseconds since the unix epoch.
  pub timestamp: u64,
}
