//! Chat transcript for one lecture: the learner's questions and the
//! assistant's replies, with at most one reply in flight.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use uuid::Uuid;

use crate::domain::Message;

pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

fn now_millis() -> u64 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

fn message(text: String, is_user: bool) -> Message {
  Message { id: Uuid::new_v4().to_string(), text, is_user, timestamp: now_millis() }
}

#[derive(Clone, Debug, Default)]
pub struct ChatSession {
  messages: Vec<Message>,
  input: String,
  loading: bool,
}

impl ChatSession {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn input(&self) -> &str {
    &self.input
  }

  pub fn set_input(&mut self, text: impl Into<String>) {
    self.input = text.into();
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// Start a turn from the current input. Returns the trimmed question, or
  /// `None` when the input is blank or a reply is still in flight.
  pub fn begin_turn(&mut self) -> Option<String> {
    let question = self.input.trim().to_string();
    if question.is_empty() || self.loading {
      return None;
    }
    self.messages.push(message(question.clone(), true));
    self.input.clear();
    self.loading = true;
    Some(question)
  }

  /// Append the empty assistant message that streamed text will fill.
  pub fn start_reply(&mut self) -> String {
    let m = message(String::new(), false);
    let id = m.id.clone();
    self.messages.push(m);
    id
  }

  /// Replace the text of one message; other messages are untouched.
  pub fn replace_reply(&mut self, id: &str, text: &str) -> bool {
    match self.messages.iter_mut().find(|m| m.id == id) {
      Some(m) => {
        m.text = text.to_string();
        true
      }
      None => false,
    }
  }

  pub fn finish(&mut self) {
    self.loading = false;
  }

  pub fn fail(&mut self) {
    debug!(target: "chat", "Chat turn failed");
    self.messages.push(message(ERROR_REPLY.to_string(), false));
    self.loading = false;
  }

  /// Forget everything; used when the learner switches lectures.
  pub fn reset(&mut self) {
    self.messages.clear();
    self.input.clear();
    self.loading = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_input_is_rejected() {
    let mut s = ChatSession::new();
    s.set_input("   ");
    assert_eq!(s.begin_turn(), None);
    assert!(s.messages().is_empty());
  }

  #[test]
  fn turn_lifecycle() {
    let mut s = ChatSession::new();
    s.set_input("  What is AKI? ");
    assert_eq!(s.begin_turn().as_deref(), Some("What is AKI?"));
    assert!(s.is_loading());
    assert_eq!(s.input(), "");

    s.set_input("second");
    assert_eq!(s.begin_turn(), None, "only one reply in flight");

    let id = s.start_reply();
    assert!(s.replace_reply(&id, "Acute"));
    assert!(s.replace_reply(&id, "Acute kidney injury"));
    s.finish();

    let texts: Vec<_> = s.messages().iter().map(|m| (m.text.as_str(), m.is_user)).collect();
    assert_eq!(texts, vec![("What is AKI?", true), ("Acute kidney injury", false)]);
    assert!(!s.is_loading());
  }

  #[test]
  fn failure_appends_error_reply_and_reset_clears() {
    let mut s = ChatSession::new();
    s.set_input("q");
    s.begin_turn();
    s.fail();
    assert_eq!(s.messages().last().map(|m| m.text.as_str()), Some(ERROR_REPLY));
    assert!(!s.is_loading());
    assert!(!s.replace_reply("missing", "x"));

    s.set_input("draft");
    s.reset();
    assert!(s.messages().is_empty());
    assert_eq!(s.input(), "");
  }
}
