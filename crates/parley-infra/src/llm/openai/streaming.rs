//! Server-sent-event parsing for streamed chat completions.
//!
//! The wire format is line based:
//!
//! - blank lines are keep-alives and are skipped
//! - `data: {json}` carries one [`AnswerChunk`]
//! - `data: [DONE]` ends the stream
//! - any other line is part of an out-of-band error body (for example a
//!   JSON `{"error": {...}}` sent with a non-2xx status). Those lines are
//!   buffered and parsed once the body ends.

use std::fmt::Display;

use futures_util::{Stream, StreamExt, pin_mut};

use parley_types::error::CompletionError;
use parley_types::llm::AnswerChunk;

const DATA_PREFIX: &str = "data:";
const DONE: &str = "data: [DONE]";

/// Incremental line parser. Feed it raw body bytes in arrival order.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    pending: Vec<u8>,
    error_body: String,
    done: bool,
}

impl SseParser {
    /// Parse every complete line in `bytes`. Stops at the end marker.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<Result<AnswerChunk, CompletionError>> {
        let mut items = Vec::new();
        if self.done {
            return items;
        }
        self.pending.extend_from_slice(bytes);

        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(item) = self.line(&String::from_utf8_lossy(&line)) {
                items.push(item);
            }
            if self.done {
                self.pending.clear();
                break;
            }
        }
        items
    }

    /// Flush what is left once the body has ended: a trailing line without
    /// a newline, then the buffered error body if there is one.
    pub(crate) fn finish(&mut self) -> Vec<Result<AnswerChunk, CompletionError>> {
        let mut items = Vec::new();
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            if let Some(item) = self.line(&String::from_utf8_lossy(&rest)) {
                items.push(item);
            }
        }
        if self.done || self.error_body.is_empty() {
            return items;
        }

        let body = std::mem::take(&mut self.error_body);
        items.push(
            serde_json::from_str::<AnswerChunk>(&body)
                .map_err(|e| CompletionError::Deserialization(format!("{e}: {body}"))),
        );
        items
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    fn line(&mut self, raw: &str) -> Option<Result<AnswerChunk, CompletionError>> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            self.error_body.push_str(line);
            return None;
        };
        if line == DONE {
            self.done = true;
            return None;
        }
        Some(
            serde_json::from_str::<AnswerChunk>(data.trim())
                .map_err(|e| CompletionError::Deserialization(format!("stream chunk: {e}"))),
        )
    }
}

/// Turn a response body into a stream of parsed chunks.
///
/// A body read failure is yielded as [`CompletionError::Stream`] and ends
/// the stream.
pub fn parse_sse<S, B, E>(body: S) -> impl Stream<Item = Result<AnswerChunk, CompletionError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    async_stream::stream! {
        pin_mut!(body);
        let mut parser = SseParser::default();

        while let Some(next) = body.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(CompletionError::Stream(format!("response body read: {e}")));
                    return;
                }
            };
            for item in parser.feed(bytes.as_ref()) {
                yield item;
            }
            if parser.is_done() {
                return;
            }
        }

        for item in parser.finish() {
            yield item;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    async fn collect(parts: &[&str]) -> Vec<Result<AnswerChunk, CompletionError>> {
        let body = stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, std::io::Error>(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        );
        parse_sse(body).collect().await
    }

    fn deltas(items: &[Result<AnswerChunk, CompletionError>]) -> String {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .filter_map(|chunk| chunk.delta())
            .collect()
    }

    const HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"index\":0}]}\n\n";
    const WORLD: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"index\":0}]}\n\n";

    #[tokio::test]
    async fn test_chunks_until_done() {
        let items = collect(&[HELLO, WORLD, "data: [DONE]\n\n", HELLO]).await;
        assert_eq!(items.len(), 2);
        assert_eq!(deltas(&items), "Hello");
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let joined = format!("{HELLO}{WORLD}data: [DONE]\n");
        let (a, b) = joined.split_at(17);
        let (b, c) = b.split_at(40);
        let items = collect(&[a, b, c]).await;
        assert_eq!(deltas(&items), "Hello");
    }

    #[tokio::test]
    async fn test_close_without_done_marker_ends_cleanly() {
        let items = collect(&[HELLO, WORLD.trim_end()]).await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn test_non_data_lines_form_error_body() {
        let body = "{\n  \"error\": {\n    \"message\": \"This model's maximum context length is 4097 tokens.\",\n    \"type\": \"invalid_request_error\",\n    \"code\": \"context_length_exceeded\"\n  }\n}\n";
        let items = collect(&[body]).await;
        assert_eq!(items.len(), 1);
        let chunk = items[0].as_ref().unwrap();
        let err = chunk.api_error().unwrap().clone().into_error();
        assert!(err.is_context_length_exceeded());
    }

    #[tokio::test]
    async fn test_malformed_data_line_is_deserialization_error() {
        let items = collect(&["data: {not json}\n", WORLD]).await;
        assert!(matches!(items[0], Err(CompletionError::Deserialization(_))));
        assert!(items[1].is_ok());
    }

    #[tokio::test]
    async fn test_unparseable_error_body() {
        let items = collect(&["<html>bad gateway</html>\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CompletionError::Deserialization(ref m)) if m.contains("bad gateway")));
    }

    #[tokio::test]
    async fn test_body_read_failure() {
        let body = stream::iter(vec![
            Ok(HELLO.as_bytes().to_vec()),
            Err(std::io::Error::other("reset")),
            Ok(WORLD.as_bytes().to_vec()),
        ]);
        let items: Vec<_> = parse_sse(body).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(CompletionError::Stream(_))));
    }
}
