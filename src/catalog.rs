//! Video catalog: categories, lecture lookup and YouTube embed helpers.
//!
//! The catalog is immutable after startup. It is built from the built-in seeds
//! unless the portal config provides its own `[[categories]]` / `[[videos]]`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::config::PortalConfig;
use crate::domain::{Category, CategoryGroup, SubcategoryGroup, VideoItem};
use crate::seeds::{seed_categories, seed_videos};
use crate::util::normalize_key;

/// Category ids whose videos are filed under a different name.
const CATEGORY_ALIASES: &[(&str, &str)] = &[("nephrology", "Renal"), ("endocrinology", "Endocrine")];

const EMBED_PARAMS: &str =
  "controls=1&modestbranding=1&rel=0&fs=1&cc_load_policy=0&iv_load_policy=3&autoplay=0";

#[derive(Clone, Debug)]
pub struct Catalog {
  categories: Vec<Category>,
  videos: Vec<VideoItem>,
}

impl Catalog {
  pub fn new(categories: Vec<Category>, videos: Vec<VideoItem>) -> Self {
    Self { categories, videos }
  }

  pub fn seeded() -> Self {
    Self::new(seed_categories(), seed_videos())
  }

  /// Seeds, with each list replaced by the config's version when it has one.
  pub fn from_config(cfg: &PortalConfig) -> Self {
    let categories = if cfg.categories.is_empty() { seed_categories() } else { cfg.categories.clone() };
    let videos = if cfg.videos.is_empty() { seed_videos() } else { cfg.videos.clone() };
    info!(target: "medlearn_backend", categories = categories.len(), videos = videos.len(), "Catalog loaded");
    Self::new(categories, videos)
  }

  pub fn videos(&self) -> &[VideoItem] {
    &self.videos
  }

  pub fn category(&self, id: &str) -> Option<&Category> {
    self.categories.iter().find(|c| c.id == id)
  }

  pub fn has_content(&self, id: &str) -> bool {
    !self.videos_for_category(id).is_empty()
  }

  /// Categories with lectures first; otherwise the configured order.
  pub fn categories_sorted(&self) -> Vec<Category> {
    let mut out = self.categories.clone();
    // sort_by_key is stable, so ties keep their order
    out.sort_by_key(|c| !self.has_content(&c.id));
    out
  }

  /// The name lectures of this category are filed under.
  fn video_category_name(&self, id: &str) -> Option<String> {
    if let Some((_, alias)) = CATEGORY_ALIASES.iter().find(|(k, _)| *k == id) {
      return Some((*alias).to_string());
    }
    self.category(id).map(|c| c.name.clone())
  }

  pub fn videos_for_category(&self, id: &str) -> Vec<VideoItem> {
    let Some(name) = self.video_category_name(id) else { return Vec::new() };
    let key = normalize_key(&name);
    self.videos.iter().filter(|v| normalize_key(&v.category) == key).cloned().collect()
  }

  /// Videos of a category grouped by subcategory, ascending.
  pub fn grouped_by_subcategory(&self, id: &str) -> Vec<SubcategoryGroup> {
    let mut groups: BTreeMap<u32, Vec<VideoItem>> = BTreeMap::new();
    for v in self.videos_for_category(id) {
      groups.entry(v.subcategory).or_default().push(v);
    }
    groups.into_iter().map(|(subcategory, videos)| SubcategoryGroup { subcategory, videos }).collect()
  }

  /// All videos grouped by their `Category` value, in first-seen order.
  pub fn category_groups(&self) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for v in &self.videos {
      match groups.iter_mut().find(|g| g.category == v.category) {
        Some(g) => g.videos.push(v.clone()),
        None => groups.push(CategoryGroup { category: v.category.clone(), videos: vec![v.clone()] }),
      }
    }
    groups
  }

  pub fn find_video(&self, title: &str) -> Option<&VideoItem> {
    self.videos.iter().find(|v| v.title == title)
  }
}

fn youtube_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"(?:youtu\.be/|youtube\.com/(?:embed/|v/|watch\?v=|watch\?.+&v=))([^&\n?#]+)")
      .expect("static regex")
  })
}

/// Extract the YouTube video id from the common URL shapes.
pub fn youtube_id(url: &str) -> Option<String> {
  youtube_re().captures(url).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Embeddable player URL for a video id.
pub fn embed_url(video_id: &str) -> String {
  format!("https://www.youtube.com/embed/{video_id}?{EMBED_PARAMS}")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(title: &str, category: &str, sub: u32) -> VideoItem {
    VideoItem { title: title.into(), category: category.into(), subcategory: sub, url: String::new() }
  }

  fn c(id: &str, name: &str) -> Category {
    Category { id: id.into(), name: name.into(), icon: String::new() }
  }

  #[test]
  fn categories_with_content_sort_first_and_stay_stable() {
    let cat = Catalog::new(
      vec![c("a", "Alpha"), c("b", "Beta"), c("nephrology", "Nephrology"), c("d", "Delta")],
      vec![v("x", "Beta", 1), v("y", "Renal", 1)],
    );
    let ids: Vec<_> = cat.categories_sorted().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["b", "nephrology", "a", "d"]);
  }

  #[test]
  fn alias_and_whitespace_insensitive_matching() {
    let cat = Catalog::new(
      vec![c("nephrology", "Nephrology"), c("infectious-disease", "Infectious Disease")],
      vec![v("AKI", "Renal", 1), v("Sepsis", "infectious disease", 1), v("Other", "Nephrology", 1)],
    );
    let renal: Vec<_> = cat.videos_for_category("nephrology").into_iter().map(|v| v.title).collect();
    assert_eq!(renal, vec!["AKI"]);
    let inf: Vec<_> = cat.videos_for_category("infectious-disease").into_iter().map(|v| v.title).collect();
    assert_eq!(inf, vec!["Sepsis"]);
    assert!(cat.videos_for_category("unknown").is_empty());
  }

  #[test]
  fn subcategory_groups_are_ascending() {
    let cat = Catalog::new(
      vec![c("cardiology", "Cardiology")],
      vec![v("c", "Cardiology", 2), v("a", "Cardiology", 1), v("b", "Cardiology", 1)],
    );
    let groups = cat.grouped_by_subcategory("cardiology");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].subcategory, 1);
    assert_eq!(groups[0].videos.iter().map(|v| v.title.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(groups[1].videos[0].title, "c");
  }

  #[test]
  fn category_groups_follow_first_seen_order() {
    let cat = Catalog::new(vec![], vec![v("1", "Renal", 1), v("2", "Cardiology", 1), v("3", "Renal", 2)]);
    let groups = cat.category_groups();
    assert_eq!(groups[0].category, "Renal");
    assert_eq!(groups[0].videos.len(), 2);
    assert_eq!(groups[1].category, "Cardiology");
  }

  #[test]
  fn youtube_id_shapes() {
    assert_eq!(youtube_id("https://youtu.be/abc123").as_deref(), Some("abc123"));
    assert_eq!(youtube_id("https://www.youtube.com/embed/abc123?rel=0").as_deref(), Some("abc123"));
    assert_eq!(youtube_id("https://www.youtube.com/v/abc123").as_deref(), Some("abc123"));
    assert_eq!(youtube_id("https://www.youtube.com/watch?v=abc123&t=10").as_deref(), Some("abc123"));
    assert_eq!(youtube_id("https://www.youtube.com/watch?feature=share&v=abc123#x").as_deref(), Some("abc123"));
    assert_eq!(youtube_id("https://vimeo.com/123"), None);
  }

  #[test]
  fn seeded_catalog_is_consistent() {
    let cat = Catalog::seeded();
    for video in cat.videos() {
      assert!(youtube_id(&video.url).is_some(), "bad url for {}", video.title);
    }
    assert!(cat.has_content("nephrology"));
    assert!(cat.has_content("endocrinology"));
    assert!(embed_url("abc").starts_with("https://www.youtube.com/embed/abc?"));
  }
}
