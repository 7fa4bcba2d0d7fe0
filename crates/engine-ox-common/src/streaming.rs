use crate::error::RequestError;
use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::io::BufRead;

/// Marker line the server sends after the last event
pub const DONE_SENTINEL: &str = "[DONE]";

/// Outcome of decoding a single line of an event stream
#[derive(Debug)]
enum Line<T> {
    Skip,
    Done,
    Event(T),
}

/// Each `data:` line carries one complete JSON fragment.
fn decode_line<T: DeserializeOwned>(raw: &[u8]) -> Result<Line<T>, RequestError> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| RequestError::InvalidEventData(format!("UTF-8 decode error: {e}")))?;
    let line = line.trim_end_matches(['\n', '\r']);

    if line.is_empty() || line.starts_with(':') {
        return Ok(Line::Skip);
    }

    let Some(rest) = line.strip_prefix("data:") else {
        // Ignore other SSE fields (event, id, retry)
        return Ok(Line::Skip);
    };

    let data = rest.trim();
    if data == DONE_SENTINEL {
        return Ok(Line::Done);
    }
    if data.is_empty() {
        return Ok(Line::Skip);
    }

    serde_json::from_str(data)
        .map(Line::Event)
        .map_err(|e| RequestError::InvalidEventData(format!("JSON parse error: {e}")))
}

/// Server-Sent Events parser for async streaming responses.
///
/// Once the sentinel is seen, the byte stream is end of input or an error
/// was returned, every further call yields `Ok(None)`.
pub struct SseParser {
    byte_stream: BoxStream<'static, Result<Bytes, RequestError>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl SseParser {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_byte_stream(response.bytes_stream())
    }

    pub fn from_byte_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        RequestError: From<E>,
    {
        Self {
            byte_stream: stream.map(|chunk| chunk.map_err(RequestError::from)).boxed(),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Get the next parsed event from the stream
    pub async fn next_event<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RequestError> {
        if self.finished {
            return Ok(None);
        }

        match self.poll_event().await {
            Ok(Some(event)) => Ok(Some(event)),
            other => {
                self.finished = true;
                self.buffer.clear();
                other
            }
        }
    }

    async fn poll_event<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RequestError> {
        loop {
            while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match decode_line(&line)? {
                    Line::Skip => continue,
                    Line::Done => return Ok(None),
                    Line::Event(event) => return Ok(Some(event)),
                }
            }

            match self.byte_stream.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => {
                    // Stream ended, the last line may lack its newline
                    let line = std::mem::take(&mut self.buffer);
                    return match decode_line(&line)? {
                        Line::Event(event) => Ok(Some(event)),
                        Line::Skip | Line::Done => Ok(None),
                    };
                }
            }
        }
    }
}

/// Blocking counterpart of [`SseParser`] reading from any buffered source
pub struct SseLines<R> {
    reader: R,
    line: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> SseLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            finished: false,
        }
    }

    pub fn next_event<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RequestError> {
        if self.finished {
            return Ok(None);
        }

        match self.read_event() {
            Ok(Some(event)) => Ok(Some(event)),
            other => {
                self.finished = true;
                other
            }
        }
    }

    fn read_event<T: DeserializeOwned>(&mut self) -> Result<Option<T>, RequestError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            match decode_line(&self.line)? {
                Line::Skip => continue,
                Line::Done => return Ok(None),
                Line::Event(event) => return Ok(Some(event)),
            }
        }
    }
}

/// Parse every event contained in a complete chunk of stream text
pub fn parse_sse_events<T: DeserializeOwned>(chunk: &str) -> Result<Vec<T>, RequestError> {
    let mut events = Vec::new();

    for line in chunk.lines() {
        match decode_line(line.as_bytes())? {
            Line::Skip => {}
            Line::Done => break,
            Line::Event(event) => events.push(event),
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::Value;
    use std::io::Cursor;

    #[test]
    fn test_parse_sse_events_empty() {
        let result: Result<Vec<Value>, _> = parse_sse_events("");
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_parse_sse_events_done_message() {
        let sse_data = "data: [DONE]\n";
        let result: Result<Vec<Value>, _> = parse_sse_events(sse_data);
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_parse_sse_events_valid_json() {
        let sse_data = "data: {\"test\": \"value\"}\n\ndata: {\"test\": 2}\n";
        let events: Vec<Value> = parse_sse_events(sse_data).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["test"], "value");
        assert_eq!(events[1]["test"], 2);
    }

    #[test]
    fn test_parse_sse_events_stops_at_sentinel() {
        let sse_data = "data: {\"n\": 1}\ndata: [DONE]\ndata: {\"n\": 2}\n";
        let events: Vec<Value> = parse_sse_events(sse_data).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_parse_sse_events_invalid_json() {
        let sse_data = "data: {invalid json}\n";
        let result: Result<Vec<Value>, _> = parse_sse_events(sse_data);
        assert!(matches!(result, Err(RequestError::InvalidEventData(_))));
    }

    #[test]
    fn test_comments_and_other_fields_are_ignored() {
        let sse_data = ": keep-alive\nevent: message\nid: 7\ndata: {\"ok\": true}\n";
        let events: Vec<Value> = parse_sse_events(sse_data).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["ok"], true);
    }

    #[tokio::test]
    async fn test_parser_handles_split_chunks() {
        let chunks: Vec<Result<Bytes, RequestError>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\"")),
            Ok(Bytes::from_static(b": 1}\n\ndata: {\"a\": 2}")),
            Ok(Bytes::from_static(b"\ndata: [DONE]\n\n")),
        ];
        let mut parser = SseParser::from_byte_stream(stream::iter(chunks));

        let first: Value = parser.next_event().await.unwrap().unwrap();
        let second: Value = parser.next_event().await.unwrap().unwrap();
        assert_eq!(first["a"], 1);
        assert_eq!(second["a"], 2);
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parser_reads_final_line_without_newline() {
        let chunks: Vec<Result<Bytes, RequestError>> =
            vec![Ok(Bytes::from_static(b"data: {\"last\": true}"))];
        let mut parser = SseParser::from_byte_stream(stream::iter(chunks));

        let event: Value = parser.next_event().await.unwrap().unwrap();
        assert_eq!(event["last"], true);
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parser_is_fused_after_error() {
        let chunks: Vec<Result<Bytes, RequestError>> = vec![
            Ok(Bytes::from_static(b"data: nope\n")),
            Ok(Bytes::from_static(b"data: {\"a\": 1}\n")),
        ];
        let mut parser = SseParser::from_byte_stream(stream::iter(chunks));

        assert!(parser.next_event::<Value>().await.is_err());
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[test]
    fn test_blocking_lines() {
        let body = "data: {\"i\": 0}\n\ndata: {\"i\": 1}\r\n\r\ndata: [DONE]\n";
        let mut lines = SseLines::new(Cursor::new(body.as_bytes()));

        let a: Value = lines.next_event().unwrap().unwrap();
        let b: Value = lines.next_event().unwrap().unwrap();
        assert_eq!(a["i"], 0);
        assert_eq!(b["i"], 1);
        assert!(lines.next_event::<Value>().unwrap().is_none());
        assert!(lines.next_event::<Value>().unwrap().is_none());
    }
}
