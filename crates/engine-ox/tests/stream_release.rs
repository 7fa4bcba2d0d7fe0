//! Abandoning a stream early releases its response without errors

use bytes::Bytes;
use engine_ox::{BlockingObjectStream, Client, Credentials, RequestError, RequestOptions, stream};
use engine_ox_common::SseParser;
use futures_util::StreamExt;
use serde_json::json;
use std::io::{BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sets a flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn event(n: usize) -> String {
    let chunk = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": format!("part-{n}")}}]
    });
    format!("data: {chunk}\n\n")
}

#[tokio::test]
async fn test_async_stream_drop_releases_source() {
    let released = Arc::new(AtomicBool::new(false));
    let pulled = Arc::new(AtomicUsize::new(0));

    let guard = DropFlag(Arc::clone(&released));
    let counter = Arc::clone(&pulled);
    let chunks = (0..5).map(|n| Ok::<_, RequestError>(Bytes::from(event(n))));
    let source = futures_util::stream::iter(chunks).map(move |chunk| {
        let _keep_alive = &guard;
        counter.fetch_add(1, Ordering::SeqCst);
        chunk
    });

    let mut objects = stream::object_stream(SseParser::from_byte_stream(source), None, Arc::default());

    let first = objects.next().await.unwrap().unwrap();
    assert_eq!(first.as_chat_chunk().unwrap().delta_content(), Some("part-0"));
    assert!(pulled.load(Ordering::SeqCst) <= 2);
    assert!(!released.load(Ordering::SeqCst));

    drop(objects);
    assert!(released.load(Ordering::SeqCst));
}

/// Reader handing out one event per read call
struct EventReader {
    events: Vec<String>,
    reads: Arc<AtomicUsize>,
    _flag: DropFlag,
}

impl Read for EventReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.events.is_empty() {
            return Ok(0);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let next = self.events.remove(0);
        let bytes = next.as_bytes();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            self.events.insert(0, String::from_utf8_lossy(&bytes[n..]).into_owned());
        }
        Ok(n)
    }
}

#[test]
fn test_blocking_stream_drop_releases_source() {
    let released = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));

    let reader = EventReader {
        events: (0..5).map(event).collect(),
        reads: Arc::clone(&reads),
        _flag: DropFlag(Arc::clone(&released)),
    };

    let mut objects = BlockingObjectStream::new(BufReader::new(reader), None, Arc::default());
    let first = objects.next().unwrap().unwrap();
    assert_eq!(first.as_chat_chunk().unwrap().delta_content(), Some("part-0"));
    assert!(reads.load(Ordering::SeqCst) <= 2);

    drop(objects);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_abandoning_http_stream_is_not_an_error() {
    let server = MockServer::start().await;
    let body: String = (0..5).map(event).chain(["data: [DONE]\n\n".to_string()]).collect();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::with_credentials(
        Credentials::builder()
            .api_key("test-api-key")
            .api_base(server.uri())
            .build(),
    );

    let mut objects = client
        .chat_completions()
        .create_stream(&json!({"model": "gpt-3.5-turbo", "messages": []}), &RequestOptions::default())
        .await
        .unwrap();

    assert!(objects.next().await.unwrap().is_ok());
    drop(objects);

    // The client stays usable after an abandoned stream
    let again = client
        .chat_completions()
        .create_stream(&json!({"model": "gpt-3.5-turbo", "messages": []}), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(again.count().await, 5);
}
