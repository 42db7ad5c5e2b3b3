//! Shared SSE streaming infrastructure for provider adapters.
//!
//! Every adapter follows the same pattern: receive a `reqwest::Response`,
//! buffer chunks, split on `\n\n`, extract `data:` payloads, and feed each
//! payload to an adapter-specific parser that returns zero or more
//! [`ChatEvent`]s.

use futures_core::stream::BoxStream;

use crate::util::from_reqwest;
use gw_domain::chat::ChatEvent;
use gw_domain::error::Result;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// SSE events are delimited by `\n\n`. Each event block may contain
/// `event:`, `data:`, `id:`, or `retry:` lines — only `data:` lines are
/// kept. The buffer is drained in place: consumed bytes are removed and
/// any trailing partial event remains for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] of [`ChatEvent`]s from an SSE `reqwest::Response`
/// and an adapter-specific parser closure.
///
/// `parse_data` is `FnMut` rather than `Fn` because adapters accumulate
/// state across calls (streamed tool-call argument fragments). If the
/// response body closes without the parser ever producing a terminal
/// event, this emits a synthetic [`ChatEvent::Error`] rather than hanging
/// the turn runner on a stream nobody will ever terminate.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<ChatEvent>>
where
    F: FnMut(&str) -> Vec<Result<ChatEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut terminated = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            if matches!(&event, Ok(e) if e.is_terminal()) || event.is_err() {
                                terminated = true;
                            }
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                if matches!(&event, Ok(e) if e.is_terminal()) || event.is_err() {
                                    terminated = true;
                                }
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    terminated = true;
                    break;
                }
            }
        }

        if !terminated {
            yield Ok(ChatEvent::Error {
                message: "provider stream ended without a terminal event".into(),
            });
        }
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_event() {
        let mut buf = String::from("event: message\ndata: {\"hello\":\"world\"}\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_events() {
        let mut buf = String::from("data: first\n\ndata: second\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["first", "second"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_event_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn drain_empty_buffer() {
        let mut buf = String::new();
        assert!(drain_data_lines(&mut buf).is_empty());
    }

    #[test]
    fn drain_skips_empty_data_lines() {
        let mut buf = String::from("data: \n\n");
        assert!(drain_data_lines(&mut buf).is_empty());
    }

    #[test]
    fn drain_ignores_non_data_lines() {
        let mut buf = String::from("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["payload"]);
    }

    #[test]
    fn drain_done_sentinel_preserved() {
        let mut buf = String::from("data: [DONE]\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["[DONE]"]);
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_data_lines(&mut buf).is_empty());
        buf.push_str("\n\ndata: chunk2\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["chunk1", "chunk2"]);
    }
}
