//! Structure for model answers: bold headers, `[n]` citations, and the
//! trailing references section with PubMed / MedScape links.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

const PUBMED_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
  Text { text: String },
  Bold { text: String },
  Citation { number: u32 },
  Reference { line: ReferenceLine },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceLine {
  Link { before: String, label: String, url: String, after: String },
  Plain { text: String },
}

/// An outbound source link found in an answer.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Reference {
  pub label: String,
  pub url: String,
}

struct Patterns {
  repeated_citation: Regex,
  numbered_bold: Regex,
  bold: Regex,
  citation: Regex,
  pmid: Regex,
  url: Regex,
}

fn patterns() -> &'static Patterns {
  static P: OnceLock<Patterns> = OnceLock::new();
  P.get_or_init(|| Patterns {
    repeated_citation: Regex::new(r"\[(\d+)\][\s.:\-]*(\d+)").expect("static regex"),
    numbered_bold: Regex::new(r"\*\*\d+[.:\-]?\s*").expect("static regex"),
    bold: Regex::new(r"\*\*(.*?)\*\*").expect("static regex"),
    citation: Regex::new(r"\[(\d+)\]").expect("static regex"),
    pmid: Regex::new(r"PMID:\s*(\d+)").expect("static regex"),
    url: Regex::new(r"https?://[^\s]+").expect("static regex"),
  })
}

/// Undo the model's habit of numbering twice: `[2] 2`, `[2]. 2` and
/// `[2]: 2` become `[2]`, and `**3. Title:**` becomes `**Title:**`.
pub fn clean_double_numbering(text: &str) -> String {
  let p = patterns();
  let cleaned = p.repeated_citation.replace_all(text, |caps: &Captures| {
    // the regex crate has no backreferences; compare the two numbers here
    if caps[1] == caps[2] {
      format!("[{}]", &caps[1])
    } else {
      caps[0].to_string()
    }
  });
  p.numbered_bold.replace_all(&cleaned, "**").into_owned()
}

/// Split an answer into display segments, after `clean_double_numbering`.
/// Everything after a `**References:**` header is treated as reference lines.
pub fn segments(text: &str) -> Vec<Segment> {
  let cleaned = clean_double_numbering(text);
  let text = cleaned.as_str();
  let mut out = Vec::new();
  let mut last = 0;
  let mut in_refs = false;
  for caps in patterns().bold.captures_iter(text) {
    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
    plain_segments(&text[last..whole.start()], in_refs, &mut out);
    let header = inner.as_str();
    in_refs = in_refs || header.trim().trim_end_matches(':').eq_ignore_ascii_case("references");
    out.push(Segment::Bold { text: header.to_string() });
    last = whole.end();
  }
  plain_segments(&text[last..], in_refs, &mut out);
  out
}

fn plain_segments(text: &str, in_refs: bool, out: &mut Vec<Segment>) {
  if text.is_empty() {
    return;
  }
  if in_refs || text.contains("References:") {
    out.extend(reference_lines(text).into_iter().map(|line| Segment::Reference { line }));
    return;
  }
  let mut last = 0;
  for caps in patterns().citation.captures_iter(text) {
    let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else { continue };
    // absurdly long digit runs stay as text
    let Ok(number) = num.as_str().parse::<u32>() else { continue };
    if whole.start() > last {
      out.push(Segment::Text { text: text[last..whole.start()].to_string() });
    }
    out.push(Segment::Citation { number });
    last = whole.end();
  }
  if last < text.len() {
    out.push(Segment::Text { text: text[last..].to_string() });
  }
}

/// Classify each line of a references block.
pub fn reference_lines(text: &str) -> Vec<ReferenceLine> {
  text.split('\n').map(reference_line).collect()
}

fn reference_line(line: &str) -> ReferenceLine {
  let p = patterns();
  if let Some(caps) = p.pmid.captures(line) {
    if let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) {
      return ReferenceLine::Link {
        before: line[..whole.start()].to_string(),
        label: format!("PMID: {}", id.as_str()),
        url: pubmed_url(id.as_str()),
        after: line[whole.end()..].to_string(),
      };
    }
  }
  if line.contains("MedScape") {
    if let Some(m) = p.url.find(line) {
      return ReferenceLine::Link {
        before: line[..m.start()].to_string(),
        label: m.as_str().to_string(),
        url: m.as_str().to_string(),
        after: line[m.end()..].to_string(),
      };
    }
  }
  ReferenceLine::Plain { text: line.to_string() }
}

pub fn pubmed_url(pmid: &str) -> String {
  format!("{PUBMED_BASE}/{pmid}/")
}

/// Every PubMed or MedScape link in the answer, in order of appearance.
pub fn extract_references(text: &str) -> Vec<Reference> {
  reference_lines(text)
    .into_iter()
    .filter_map(|line| match line {
      ReferenceLine::Link { label, url, .. } => Some(Reference { label, url }),
      ReferenceLine::Plain { .. } => None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(s: &str) -> Segment {
    Segment::Text { text: s.into() }
  }

  #[test]
  fn bold_headers_and_citations() {
    let segs = segments("**Infections:** common [1] and rare [2].");
    assert_eq!(
      segs,
      vec![
        Segment::Bold { text: "Infections:".into() },
        text(" common "),
        Segment::Citation { number: 1 },
        text(" and rare "),
        Segment::Citation { number: 2 },
        text("."),
      ]
    );
  }

  #[test]
  fn references_block_becomes_lines() {
    let answer = "Body [1]\n**References:**\n[1] Smith et al. (2020). Title. Journal. PMID: 12345\n[2] Sepsis. MedScape. https://emedicine.medscape.com/article/168402 (accessed)\n[3] Textbook";
    let segs = segments(answer);
    assert_eq!(segs[0], text("Body "));
    assert_eq!(segs[1], Segment::Citation { number: 1 });
    assert_eq!(segs[3], Segment::Bold { text: "References:".into() });
    let refs: Vec<_> = segs
      .iter()
      .filter_map(|s| match s {
        Segment::Reference { line } => Some(line.clone()),
        _ => None,
      })
      .collect();
    // the text after the bold header starts with the newline, hence the empty first line
    assert_eq!(refs[0], ReferenceLine::Plain { text: String::new() });
    assert_eq!(
      refs[1],
      ReferenceLine::Link {
        before: "[1] Smith et al. (2020). Title. Journal. ".into(),
        label: "PMID: 12345".into(),
        url: "https://pubmed.ncbi.nlm.nih.gov/12345/".into(),
        after: String::new(),
      }
    );
    match &refs[2] {
      ReferenceLine::Link { url, after, .. } => {
        assert_eq!(url, "https://emedicine.medscape.com/article/168402");
        assert_eq!(after, " (accessed)");
      }
      other => panic!("unexpected {other:?}"),
    }
    assert_eq!(refs[3], ReferenceLine::Plain { text: "[3] Textbook".into() });
  }

  #[test]
  fn double_numbering_is_collapsed() {
    assert_eq!(clean_double_numbering("seen in AKI [2] 2 and CKD [3]. 3."), "seen in AKI [2] and CKD [3].");
    assert_eq!(clean_double_numbering("[1]: 1 Smith"), "[1] Smith");
    // different numbers, or a longer digit run, stay as written
    assert_eq!(clean_double_numbering("[1] 2 cases, [1] 12 cases"), "[1] 2 cases, [1] 12 cases");
  }

  #[test]
  fn numbered_bold_headers_lose_their_number() {
    assert_eq!(clean_double_numbering("**3. Management:** fluids"), "**Management:** fluids");
    assert_eq!(clean_double_numbering("**4: Prognosis:**"), "**Prognosis:**");
    assert_eq!(
      segments("**2 Causes:** prerenal [1] 1."),
      vec![Segment::Bold { text: "Causes:".into() }, text(" prerenal "), Segment::Citation { number: 1 }, text(".")]
    );
  }

  #[test]
  fn extract_references_collects_links() {
    let refs = extract_references("see PMID:987\nMedScape http://x.y/z\nhttp://not-medscape.example");
    assert_eq!(
      refs,
      vec![
        Reference { label: "PMID: 987".into(), url: pubmed_url("987") },
        Reference { label: "http://x.y/z".into(), url: "http://x.y/z".into() },
      ]
    );
  }
}
