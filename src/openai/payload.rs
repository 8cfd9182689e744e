//! Structured payloads embedded in model output
//!
//! Models asked for JSON often wrap it in prose or code fences. Parsing tries
//! a fenced block first, then the whole text, then the longest balanced
//! array or object embedded in the prose.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex"));

/// Model output after structure detection
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON value
    Structured(serde_json::Value),
    /// Text that contained no parseable JSON
    RawText(String),
}

impl Payload {
    /// Interpret the payload as a list of strings
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` unless the payload is a JSON array of strings
    pub fn into_string_list(self) -> Result<Vec<String>> {
        match self {
            Self::Structured(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s),
                    other => Err(Error::MalformedResponse(other.to_string())),
                })
                .collect(),
            Self::Structured(other) => Err(Error::MalformedResponse(other.to_string())),
            Self::RawText(text) => Err(Error::MalformedResponse(text)),
        }
    }

    /// Whether JSON was found
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Detect a JSON payload in model output
#[must_use]
pub fn parse_structured(text: &str) -> Payload {
    let trimmed = text.trim();
    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1))
        && let Ok(value) = serde_json::from_str(block.as_str().trim())
    {
        return Payload::Structured(value);
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Payload::Structured(value);
    }
    if let Some(value) = longest_embedded(trimmed) {
        return Payload::Structured(value);
    }

    tracing::debug!(chars = text.len(), "no structured payload found");
    Payload::RawText(text.to_string())
}

/// Longest JSON array or object starting at some `[` or `{` in `text`
///
/// Spans nested inside an already parsed value are skipped.
fn longest_embedded(text: &str) -> Option<serde_json::Value> {
    let mut best: Option<(usize, serde_json::Value)> = None;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(['[', '{']) {
        let start = pos + offset;
        let mut values =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(value)) => {
                let len = values.byte_offset();
                if best.as_ref().is_none_or(|(longest, _)| len > *longest) {
                    best = Some((len, value));
                }
                pos = start + len;
            }
            _ => pos = start + 1,
        }
    }

    best.map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_whole_text_json() {
        assert_eq!(
            parse_structured(r#"["a", "b"]"#),
            Payload::Structured(json!(["a", "b"]))
        );
    }

    #[test]
    fn test_fenced_array() {
        let text = "Here you go:\n```json\n[\"one\",\n\"two\"]\n```\nEnjoy!";
        assert_eq!(
            parse_structured(text).into_string_list().unwrap(),
            vec!["one", "two"]
        );
    }

    #[test]
    fn test_embedded_object() {
        let text = "Result: {\"answer\": 4} done";
        assert_eq!(
            parse_structured(text),
            Payload::Structured(json!({"answer": 4}))
        );
    }

    #[test]
    fn test_raw_text() {
        let payload = parse_structured("Once upon a time");
        assert_eq!(payload, Payload::RawText("Once upon a time".to_string()));
        assert!(!payload.is_structured());
        assert!(matches!(
            payload.into_string_list(),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_string_items_rejected() {
        assert!(parse_structured("[1, 2]").into_string_list().is_err());
    }

    #[test]
    fn test_bracketed_prose_before_array() {
        let text = r#"As noted in [1], here are the segments: ["a", "b"]. See [2]."#;
        assert_eq!(
            parse_structured(text).into_string_list().unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_fence_wins_over_prose_brackets() {
        let text = "Use [this] format:\n```\n[\"x\"]\n```";
        assert_eq!(parse_structured(text), Payload::Structured(json!(["x"])));
    }

    #[test]
    fn test_array_of_objects_kept_whole() {
        let text = r#"Plan: [{"day": 1}, {"day": 2}] ok"#;
        assert_eq!(
            parse_structured(text),
            Payload::Structured(json!([{"day": 1}, {"day": 2}]))
        );
    }
}
