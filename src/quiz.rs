//! Multiple-choice quizzes: pulling MCQs out of model text and walking a
//! learner through them.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::domain::Mcq;

const OPTION_LETTERS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

#[derive(Debug, thiserror::Error)]
pub enum McqParseError {
  #[error("Failed to parse MCQ JSON from Gemini response")]
  NoArray { raw: String },
  #[error("{0}")]
  Json(#[from] serde_json::Error),
}

fn array_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\[[\s\S]*\]").expect("static regex"))
}

/// Letter label for an option index (0 → 'A').
pub fn option_letter(index: usize) -> Option<char> {
  OPTION_LETTERS.get(index).copied()
}

/// Find the JSON array in the model output (first `[` to last `]`) and
/// decode it. Items that are not usable questions are dropped.
pub fn extract_mcqs(text: &str) -> Result<Vec<Mcq>, McqParseError> {
  let Some(m) = array_re().find(text) else {
    return Err(McqParseError::NoArray { raw: text.to_string() });
  };
  let items: Vec<Value> = serde_json::from_str(m.as_str())?;
  let total = items.len();
  let mcqs: Vec<Mcq> = items.into_iter().enumerate().filter_map(|(i, v)| mcq_from_value(i, v)).collect();
  if mcqs.len() < total {
    warn!(target: "quiz", kept = mcqs.len(), total, "Dropped malformed MCQ items");
  }
  Ok(mcqs)
}

fn mcq_from_value(index: usize, v: Value) -> Option<Mcq> {
  let question = v.get("question")?.as_str()?.trim().to_string();
  // one non-string option would shift the indices `answer` refers to
  let Some(options) = v
    .get("options")
    .and_then(Value::as_array)
    .and_then(|opts| opts.iter().map(|o| o.as_str().map(str::to_string)).collect::<Option<Vec<_>>>())
  else {
    warn!(target: "quiz", index, "Skipping MCQ item with non-text options");
    return None;
  };
  let answer = match v.get("answer")? {
    Value::Number(n) => n.as_u64().map(|n| n as usize),
    // models sometimes answer with the letter instead of the index
    Value::String(s) => {
      let s = s.trim();
      let mut chars = s.chars();
      match (chars.next(), chars.next()) {
        (Some(c), None) => OPTION_LETTERS.iter().position(|l| *l == c.to_ascii_uppercase()),
        _ => s.parse::<usize>().ok(),
      }
    }
    _ => None,
  };
  let text_field = |k: &str| v.get(k).and_then(Value::as_str).unwrap_or_default().to_string();

  let valid = !question.is_empty() && options.len() >= 2 && answer.is_some_and(|a| a < options.len());
  if !valid {
    warn!(target: "quiz", index, "Skipping invalid MCQ item");
    return None;
  }
  Some(Mcq {
    question,
    options,
    answer: answer?,
    explanation: text_field("explanation"),
    reference: text_field("reference"),
  })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feedback {
  Correct,
  Incorrect { correct_option: String },
}

/// Learner state for one quiz: which question is shown, what is selected and
/// whether it has been submitted.
#[derive(Clone, Debug, Default)]
pub struct QuizSession {
  mcqs: Vec<Mcq>,
  current: usize,
  selected: Option<usize>,
  submitted: bool,
  /// Per question: `Some(correct)` once submitted.
  results: Vec<Option<bool>>,
}

impl QuizSession {
  pub fn new(mcqs: Vec<Mcq>) -> Self {
    let results = vec![None; mcqs.len()];
    Self { mcqs, results, ..Self::default() }
  }

  pub fn is_empty(&self) -> bool {
    self.mcqs.is_empty()
  }

  pub fn len(&self) -> usize {
    self.mcqs.len()
  }

  pub fn current_index(&self) -> usize {
    self.current
  }

  pub fn current(&self) -> Option<&Mcq> {
    self.mcqs.get(self.current)
  }

  pub fn selected(&self) -> Option<usize> {
    self.selected
  }

  pub fn is_submitted(&self) -> bool {
    self.submitted
  }

  /// Choose an option. Ignored after submission or for an out-of-range index.
  pub fn select(&mut self, option: usize) -> bool {
    let in_range = self.current().is_some_and(|q| option < q.options.len());
    if self.submitted || !in_range {
      return false;
    }
    self.selected = Some(option);
    true
  }

  /// Lock in the selection. Requires a selection; a second submit is a no-op.
  pub fn submit(&mut self) -> Option<Feedback> {
    if self.submitted {
      return self.feedback();
    }
    let selected = self.selected?;
    let correct = self.current()?.answer == selected;
    self.submitted = true;
    if let Some(slot) = self.results.get_mut(self.current) {
      *slot = Some(correct);
    }
    self.feedback()
  }

  pub fn feedback(&self) -> Option<Feedback> {
    if !self.submitted {
      return None;
    }
    let q = self.current()?;
    if self.selected == Some(q.answer) {
      Some(Feedback::Correct)
    } else {
      Some(Feedback::Incorrect { correct_option: q.correct_option().unwrap_or_default().to_string() })
    }
  }

  pub fn next(&mut self) {
    self.move_to((self.current + 1).min(self.mcqs.len().saturating_sub(1)));
  }

  pub fn prev(&mut self) {
    self.move_to(self.current.saturating_sub(1));
  }

  fn move_to(&mut self, index: usize) {
    self.current = index;
    self.selected = None;
    self.submitted = false;
  }

  /// (correct, answered) over every submitted question.
  pub fn score(&self) -> (usize, usize) {
    let answered = self.results.iter().filter(|r| r.is_some()).count();
    let correct = self.results.iter().filter(|r| **r == Some(true)).count();
    (correct, answered)
  }
}
