//! Built-in catalog so the portal is browsable without any external config.

use crate::domain::{Category, VideoItem};

fn cat(id: &str, name: &str, icon: &str) -> Category {
  Category { id: id.into(), name: name.into(), icon: icon.into() }
}

fn video(title: &str, category: &str, subcategory: u32, url: &str) -> VideoItem {
  VideoItem {
    title: title.into(),
    category: category.into(),
    subcategory,
    url: url.into(),
  }
}

/// Catalogue tiles, in display order.
pub fn seed_categories() -> Vec<Category> {
  vec![
    cat("cardiology", "Cardiology", "heart.svg"),
    cat("pulmonology", "Pulmonology", "lungs.svg"),
    cat("nephrology", "Nephrology", "kidney.svg"),
    cat("endocrinology", "Endocrinology", "thyroid.svg"),
    cat("gastroenterology", "Gastroenterology", "stomach.svg"),
    cat("neurology", "Neurology", "brain.svg"),
    cat("hematology", "Hematology", "blood.svg"),
    cat("infectious-disease", "Infectious Disease", "virus.svg"),
  ]
}

/// Lecture videos. Nephrology and endocrinology lectures are filed under the
/// shorter "Renal" / "Endocrine" names.
pub fn seed_videos() -> Vec<VideoItem> {
  vec![
    video("Heart Failure Overview", "Cardiology", 1, "https://www.youtube.com/watch?v=Cj0Lz9bDdvE"),
    video("Acute Coronary Syndromes", "Cardiology", 1, "https://youtu.be/3Fv7y0n0sdk"),
    video("Atrial Fibrillation", "Cardiology", 2, "https://www.youtube.com/embed/Fh1HDb1qJYw"),
    video("Acute Kidney Injury", "Renal", 1, "https://www.youtube.com/watch?v=8Pvj9CSdGYk"),
    video("Acid-Base Disorders", "Renal", 2, "https://www.youtube.com/watch?feature=share&v=lTjMkJ9yCqk"),
    video("Diabetes Mellitus", "Endocrine", 1, "https://youtu.be/XfyGv-xwjlI"),
    video("Thyroid Disorders", "Endocrine", 2, "https://www.youtube.com/watch?v=3pwr0qmLBuo"),
    video("Asthma and COPD", "Pulmonology", 1, "https://www.youtube.com/watch?v=Vuxa8mmsm_4"),
    video("Sepsis Management", "Infectious Disease", 1, "https://www.youtube.com/watch?v=5PD3Dh3mzAc"),
  ]
}
