//! Server-sent event decoding for streamed chat completions
//!
//! The endpoint answers with lines of the form `data: <json>` terminated by
//! `data: [DONE]`. Network reads don't respect line boundaries, so bytes are
//! buffered until a full line is available. Buffering at the byte level also
//! keeps multi-byte UTF-8 sequences intact across reads.

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::{Error, Result};

/// Terminal sentinel payload
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded line of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Newly arrived assistant text
    Delta(String),
    /// The server signalled the end of the completion
    Done,
    /// A `data:` payload that could not be parsed
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes from the network, returning frames for every completed line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(frame) = parse_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        parse_line(&String::from_utf8_lossy(&line))
    }

    /// Bytes buffered but not yet forming a full line
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Decode a single line; `None` for blank lines, comments and non-data fields
/// and for deltas carrying no text (role announcements, finish markers)
#[must_use]
pub fn parse_line(line: &str) -> Option<SseFrame> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim_start();

    if payload == DONE_SENTINEL {
        return Some(SseFrame::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .map(SseFrame::Delta),
        Err(_) => Some(SseFrame::Malformed(payload.to_string())),
    }
}

/// Consume a byte stream, forwarding each delta to `on_chunk`
///
/// Resolves with the concatenation of all deltas once `[DONE]` arrives or the
/// stream ends. Malformed frames are logged and skipped.
///
/// # Errors
///
/// Returns error if the underlying transport fails mid-stream
pub async fn accumulate<S, B, E>(mut stream: S, mut on_chunk: impl FnMut(&str)) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    let mut decoder = SseDecoder::new();
    let mut accumulated = String::new();
    let mut fragments = 0usize;

    tracing::debug!("starting streaming completion");

    let mut done = false;
    'read: while let Some(item) = stream.next().await {
        let bytes = item.map_err(Into::into)?;
        for frame in decoder.push(bytes.as_ref()) {
            if apply(frame, &mut accumulated, &mut fragments, &mut on_chunk) {
                tracing::debug!("stream marked done");
                done = true;
                break 'read;
            }
        }
    }

    if !done && let Some(frame) = decoder.finish() {
        apply(frame, &mut accumulated, &mut fragments, &mut on_chunk);
    }

    tracing::debug!(fragments, chars = accumulated.len(), "streaming completion finished");
    Ok(accumulated)
}

/// Apply one frame; returns true when the stream is done
fn apply(
    frame: SseFrame,
    accumulated: &mut String,
    fragments: &mut usize,
    on_chunk: &mut impl FnMut(&str),
) -> bool {
    match frame {
        SseFrame::Delta(text) => {
            accumulated.push_str(&text);
            *fragments += 1;
            on_chunk(&text);
            false
        }
        SseFrame::Malformed(payload) => {
            tracing::warn!(chunk = %payload, "skipping unparseable stream chunk");
            false
        }
        SseFrame::Done => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("data: [DONE]"), Some(SseFrame::Done));
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: ping"), None);
        assert_eq!(
            parse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
        assert_eq!(
            parse_line(r#"data:{"choices":[{"delta":{"content":"Hi"}}]}"#),
            Some(SseFrame::Delta("Hi".to_string()))
        );
        assert_eq!(
            parse_line("data: {broken"),
            Some(SseFrame::Malformed("{broken".to_string()))
        );
    }

    #[test]
    fn test_line_split_across_reads() {
        let line = delta("Hello");
        let (a, b) = line.split_at(10);

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(a.as_bytes()).is_empty());
        assert!(decoder.pending_len() > 0);
        assert_eq!(
            decoder.push(b.as_bytes()),
            vec![SseFrame::Delta("Hello".to_string())]
        );
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let line = delta("नमस्ते");
        let bytes = line.as_bytes();
        // Split inside the first Devanagari character
        let cut = line.find('न').unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(
            decoder.push(&bytes[cut..]),
            vec![SseFrame::Delta("नमस्ते".to_string())]
        );
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: [DONE]\r\n");
        assert_eq!(frames, vec![SseFrame::Done]);
    }

    #[test]
    fn test_trailing_line_flushed() {
        let mut decoder = SseDecoder::new();
        let line = delta("tail");
        assert!(decoder.push(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::Delta("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn test_accumulate_stops_at_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", delta("a"), delta("b"), delta("ignored"));
        let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(body.into_bytes())]);

        let mut seen = Vec::new();
        let text = accumulate(stream, |c| seen.push(c.to_string())).await.unwrap();

        assert_eq!(text, "ab");
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_accumulate_unterminated_close() {
        let first = delta("Hel");
        let last = delta("lo");
        let stream = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(first.into_bytes()),
            Ok(b"data: {oops}\n".to_vec()),
            Ok(last.trim_end().as_bytes().to_vec()),
        ]);

        let text = tokio_test::block_on(accumulate(stream, |_| {})).unwrap();
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_nothing_flushed_after_done() {
        let body = format!("{}data: [DONE]\n{}", delta("x"), delta("y").trim_end());
        let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(body.into_bytes())]);

        let text = tokio_test::block_on(accumulate(stream, |_| {})).unwrap();
        assert_eq!(text, "x");
    }

    #[tokio::test]
    async fn test_accumulate_transport_error() {
        let stream = futures::stream::iter(vec![
            Ok(delta("partial").into_bytes()),
            Err(std::io::Error::other("connection reset")),
        ]);

        let result = accumulate(stream, |_| {}).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
