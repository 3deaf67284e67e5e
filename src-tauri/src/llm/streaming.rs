//! SSE streaming utilities for OpenAI-compatible chat completions.
//!
//! The server sends `data: {json}` lines separated by blank lines and ends
//! the stream with `data: [DONE]`. Chunks from the network can split a line,
//! or a UTF-8 character, anywhere, so bytes are buffered until a full line
//! is available.

use super::{QueryError, QueryFailure};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;

/// Lazy, finite sequence of reply fragments in the order the server sent them.
///
/// Ends after `[DONE]`, after the connection closes, or after the first error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, QueryError>> + Send>>;

/// One decoded SSE payload.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Fragment(String),
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Incremental SSE line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by them, in order.
    ///
    /// Decoding stops at the first malformed line; its error is the last
    /// item and anything after it in the buffer is dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseEvent, QueryError>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match parse_line(&line[..line.len() - 1]) {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    self.buffer.clear();
                    events.push(Err(e));
                    break;
                }
            }
        }
        events
    }

    /// Decode whatever is left once the connection has closed.
    pub fn finish(&mut self) -> Result<Option<SseEvent>, QueryError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<SseEvent>, QueryError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| QueryError::Malformed(format!("stream is not UTF-8: {}", e)))?;
    let line = line.trim_end_matches('\r');

    let Some(data) = line.strip_prefix("data:") else {
        // Comments (`: keep-alive`), `event:`/`id:` fields and blank separators.
        return Ok(None);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    if data.is_empty() {
        return Ok(None);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| QueryError::Malformed(format!("bad stream chunk: {} — {}", e, data)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty())
        .map(SseEvent::Fragment))
}

/// Drain a fragment stream into the full reply.
///
/// `on_fragment` sees every fragment as it arrives. On failure the text
/// accumulated so far is returned alongside the error.
pub async fn collect_reply(
    mut stream: FragmentStream,
    mut on_fragment: impl FnMut(&str),
) -> Result<String, QueryFailure> {
    let mut reply = String::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                on_fragment(&fragment);
                reply.push_str(&fragment);
            }
            Err(error) => {
                return Err(QueryFailure {
                    error,
                    partial: reply,
                });
            }
        }
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": s}}]})
        )
    }

    #[test]
    fn decodes_fragments_and_done() {
        let mut d = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n\n", delta("O"), delta("K"));
        let events: Vec<_> = d.push(body.as_bytes()).into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                SseEvent::Fragment("O".into()),
                SseEvent::Fragment("K".into()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn reassembles_line_split_inside_utf8_character() {
        let mut d = SseDecoder::new();
        let body = delta("héllo");
        let bytes = body.as_bytes();
        // 'é' is two bytes; split between them.
        let split = body.find('é').unwrap() + 1;

        assert!(d.push(&bytes[..split]).is_empty());
        let events = d.push(&bytes[split..]);
        assert!(matches!(&events[..], [Ok(SseEvent::Fragment(s))] if s == "héllo"));
    }

    #[test]
    fn ignores_comments_roles_and_crlf() {
        let mut d = SseDecoder::new();
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        let body = format!(": keep-alive\r\n\r\n{}\r\n\r\n{}", role_only, delta("x"));
        let events = d.push(body.as_bytes());
        assert!(matches!(&events[..], [Ok(SseEvent::Fragment(s))] if s == "x"));
    }

    #[test]
    fn malformed_payload_ends_decoding_after_earlier_fragments() {
        let mut d = SseDecoder::new();
        let body = format!("{}data: {{not json\n\n{}", delta("Hel"), delta("lo"));
        let events = d.push(body.as_bytes());
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(SseEvent::Fragment(s)) if s == "Hel"));
        assert!(matches!(&events[1], Err(QueryError::Malformed(_))));
    }

    #[test]
    fn finish_decodes_unterminated_last_line() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: [DONE]").is_empty());
        assert_eq!(d.finish().unwrap(), Some(SseEvent::Done));
        assert_eq!(d.finish().unwrap(), None);
    }

    #[test]
    fn collect_keeps_partial_text_on_error() {
        let items: Vec<Result<String, QueryError>> = vec![
            Ok("He".into()),
            Ok("l".into()),
            Err(QueryError::Malformed("cut".into())),
        ];
        let stream: FragmentStream = Box::pin(futures::stream::iter(items));

        let mut seen = Vec::new();
        let failure = futures::executor::block_on(collect_reply(stream, |f| {
            seen.push(f.to_string())
        }))
        .unwrap_err();

        assert_eq!(failure.partial, "Hel");
        assert_eq!(seen, vec!["He", "l"]);
        assert!(matches!(failure.error, QueryError::Malformed(_)));
    }

    #[test]
    fn collect_concatenates_in_order() {
        let items: Vec<Result<String, QueryError>> = vec![Ok("O".into()), Ok("K".into())];
        let stream: FragmentStream = Box::pin(futures::stream::iter(items));
        let reply = futures::executor::block_on(collect_reply(stream, |_| {})).unwrap();
        assert_eq!(reply, "OK");
    }
}
