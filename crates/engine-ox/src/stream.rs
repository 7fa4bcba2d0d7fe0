use crate::object::{ApiObject, TransportMeta};
use async_stream::try_stream;
use engine_ox_common::{RequestError, SseLines, SseParser, error::error_from_payload};
use futures_util::stream::BoxStream;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::sync::Arc;

/// Lazy stream of partial objects from a streaming response.
///
/// The underlying connection lives exactly as long as the stream. After the
/// last event, or after an error, it yields nothing more.
pub type ObjectStream = BoxStream<'static, Result<ApiObject, RequestError>>;

/// Turn one decoded event into an object, surfacing server error events
fn event_to_object(
    event: Value,
    tag: Option<&str>,
    meta: &Arc<TransportMeta>,
) -> Result<ApiObject, RequestError> {
    if event.get("error").is_some_and(|error| !error.is_null()) {
        return Err(error_from_payload(200, meta.request_id.clone(), &event));
    }

    ApiObject::from_json(event, tag, Arc::clone(meta)).ok_or_else(|| {
        RequestError::InvalidEventData("stream event is not a JSON object".to_string())
    })
}

/// Wrap an event parser into an [`ObjectStream`]
pub fn object_stream(
    mut parser: SseParser,
    tag: Option<&'static str>,
    meta: Arc<TransportMeta>,
) -> ObjectStream {
    Box::pin(try_stream! {
        while let Some(event) = parser.next_event::<Value>().await? {
            yield event_to_object(event, tag, &meta)?;
        }
        tracing::debug!(request_id = ?meta.request_id, "stream finished");
    })
}

/// Blocking iterator of partial objects.
///
/// Owns the response reader; dropping the iterator closes the connection.
pub struct BlockingObjectStream<R = BufReader<reqwest::blocking::Response>> {
    lines: SseLines<R>,
    tag: Option<&'static str>,
    meta: Arc<TransportMeta>,
    finished: bool,
}

impl<R: BufRead> BlockingObjectStream<R> {
    pub fn new(reader: R, tag: Option<&'static str>, meta: Arc<TransportMeta>) -> Self {
        Self {
            lines: SseLines::new(reader),
            tag,
            meta,
            finished: false,
        }
    }

    pub fn meta(&self) -> &TransportMeta {
        &self.meta
    }
}

impl<R: BufRead> Iterator for BlockingObjectStream<R> {
    type Item = Result<ApiObject, RequestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = match self.lines.next_event::<Value>() {
            Ok(Some(event)) => event_to_object(event, self.tag, &self.meta),
            Ok(None) => {
                self.finished = true;
                tracing::debug!(request_id = ?self.meta.request_id, "stream finished");
                return None;
            }
            Err(err) => Err(err),
        };

        if item.is_err() {
            self.finished = true;
        }
        Some(item)
    }
}

impl<R: BufRead> FusedIterator for BlockingObjectStream<R> {}
