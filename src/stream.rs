//! Incremental reassembly of `data:`-framed event streams.
//!
//! Two consumers share the line handling here:
//!   - the chat client, which turns the portal's `/api/ai-chat` stream into
//!     replace-the-whole-message updates (`ChatStreamAssembler`)
//!   - the Gemini client, which reads `streamGenerateContent?alt=sse` chunks
//!
//! Bytes may arrive split anywhere, including inside a UTF-8 sequence or in
//! the middle of a line. Nothing is emitted until a line is complete.

use serde_json::Value;

/// Sentinel payload that ends a portal chat stream.
pub const END_STREAM: &str = "END_STREAM";

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
  /// Bytes of an incomplete UTF-8 sequence carried to the next chunk.
  pending: Vec<u8>,
  /// Decoded text not yet terminated by `\n`.
  text: String,
}

impl LineBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed a chunk and collect every line it completes. Line terminators
  /// (`\n` or `\r\n`) are stripped.
  pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
    self.decode(chunk);
    let mut lines = Vec::new();
    while let Some(end) = self.text.find('\n') {
      let mut line: String = self.text.drain(..=end).collect();
      line.pop();
      if line.ends_with('\r') {
        line.pop();
      }
      lines.push(line);
    }
    lines
  }

  /// The unterminated tail held for the next `push`.
  pub fn tail(&self) -> &str {
    &self.text
  }

  fn decode(&mut self, chunk: &[u8]) {
    self.pending.extend_from_slice(chunk);
    loop {
      match std::str::from_utf8(&self.pending) {
        Ok(s) => {
          self.text.push_str(s);
          self.pending.clear();
          return;
        }
        Err(e) => {
          let valid = e.valid_up_to();
          self.text.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
          match e.error_len() {
            Some(bad) => {
              self.text.push(char::REPLACEMENT_CHARACTER);
              self.pending.drain(..valid + bad);
            }
            None => {
              // incomplete sequence at the end; wait for more bytes
              self.pending.drain(..valid);
              return;
            }
          }
        }
      }
    }
  }
}

/// Payload of a `data:` line, with the single optional space after the colon
/// removed. Other lines (blank, `event:`, comments) yield `None`.
pub fn data_payload(line: &str) -> Option<&str> {
  let rest = line.strip_prefix("data:")?;
  Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamUpdate {
  /// The in-flight assistant message now reads exactly this.
  Replace(String),
  /// The server reported a failure in-band.
  Error(String),
  /// `END_STREAM` seen; the read loop should stop.
  Done,
}

/// Turns the portal chat stream into message updates.
#[derive(Debug, Default)]
pub struct ChatStreamAssembler {
  lines: LineBuffer,
  text: String,
  done: bool,
}

impl ChatStreamAssembler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed a chunk of the response body. Input after `Done` is ignored.
  pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
    let mut updates = Vec::new();
    if self.done {
      return updates;
    }
    for line in self.lines.push(chunk) {
      let Some(payload) = data_payload(&line) else { continue };
      if payload == END_STREAM {
        self.done = true;
        updates.push(StreamUpdate::Done);
        break;
      }
      // malformed JSON is skipped
      let Ok(value) = serde_json::from_str::<Value>(payload) else { continue };
      match value.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => {
          self.text = text.to_string();
          updates.push(StreamUpdate::Replace(self.text.clone()));
        }
        _ => {
          if let Some(err) = value.get("error").and_then(Value::as_str) {
            updates.push(StreamUpdate::Error(err.to_string()));
          }
        }
      }
    }
    updates
  }

  /// Latest assembled text.
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn is_done(&self) -> bool {
    self.done
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lines_split_across_chunks_are_joined() {
    let mut buf = LineBuffer::new();
    assert!(buf.push(b"data: {\"te").is_empty());
    assert_eq!(buf.tail(), "data: {\"te");
    let lines = buf.push(b"xt\":\"a\"}\n\ndata: x");
    assert_eq!(lines, vec!["data: {\"text\":\"a\"}".to_string(), String::new()]);
    assert_eq!(buf.tail(), "data: x");
  }

  #[test]
  fn crlf_is_stripped() {
    let mut buf = LineBuffer::new();
    assert_eq!(buf.push(b"a\r\nb\n"), vec!["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn utf8_sequence_split_between_chunks() {
    let bytes = "data: ü\n".as_bytes();
    // 'ü' is two bytes starting at index 6
    let mut buf = LineBuffer::new();
    assert!(buf.push(&bytes[..7]).is_empty());
    assert_eq!(buf.push(&bytes[7..]), vec!["data: ü".to_string()]);
  }

  #[test]
  fn invalid_utf8_becomes_replacement_char() {
    let mut buf = LineBuffer::new();
    assert_eq!(buf.push(b"a\xffb\n"), vec!["a\u{FFFD}b".to_string()]);
  }

  #[test]
  fn data_payload_prefix_handling() {
    assert_eq!(data_payload("data: {}"), Some("{}"));
    assert_eq!(data_payload("data:{}"), Some("{}"));
    assert_eq!(data_payload("data:  x"), Some(" x"));
    assert_eq!(data_payload("event: message"), None);
    assert_eq!(data_payload(""), None);
  }

  #[test]
  fn assembler_replaces_rather_than_appends() {
    let mut asm = ChatStreamAssembler::new();
    let ups = asm.push(b"data: {\"text\":\"Hel\"}\n\ndata: {\"text\":\"Hello\"}\n\n");
    assert_eq!(ups, vec![StreamUpdate::Replace("Hel".into()), StreamUpdate::Replace("Hello".into())]);
    assert_eq!(asm.text(), "Hello");
  }

  #[test]
  fn assembler_skips_malformed_and_textless_lines() {
    let mut asm = ChatStreamAssembler::new();
    let ups = asm.push(b"data: {not json\ndata: {\"text\":\"\"}\ndata: {\"other\":1}\n: comment\ndata: {\"text\":\"ok\"}\n");
    assert_eq!(ups, vec![StreamUpdate::Replace("ok".into())]);
  }

  #[test]
  fn sentinel_stops_processing() {
    let mut asm = ChatStreamAssembler::new();
    let ups = asm.push(b"data: {\"text\":\"a\"}\ndata: END_STREAM\ndata: {\"text\":\"b\"}\n");
    assert_eq!(ups, vec![StreamUpdate::Replace("a".into()), StreamUpdate::Done]);
    assert!(asm.is_done());
    assert!(asm.push(b"data: {\"text\":\"c\"}\n").is_empty());
    assert_eq!(asm.text(), "a");
  }

  #[test]
  fn unterminated_tail_waits_for_more_input() {
    let mut asm = ChatStreamAssembler::new();
    assert!(asm.push(b"data: {\"text\":\"partial\"}").is_empty());
    assert_eq!(asm.push(b"\n"), vec![StreamUpdate::Replace("partial".into())]);
    // stream may end without the sentinel
    assert!(!asm.is_done());
  }

  #[test]
  fn in_band_error_is_reported() {
    let mut asm = ChatStreamAssembler::new();
    let ups = asm.push(b"data: {\"error\":\"Failed to generate response\"}\n");
    assert_eq!(ups, vec![StreamUpdate::Error("Failed to generate response".into())]);
  }
}
