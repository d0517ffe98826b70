#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use easel_client::HttpTransport;
use easel_client::Request;
use easel_client::Response;
use easel_client::StreamResponse;
use easel_client::TransportError;
use easel_core::Config;
use easel_core::DrawingSurface;
use easel_core::Easel;
use easel_core::KeyValueStore;
use easel_core::MemoryStore;
use easel_core::RasterSurface;
use easel_core::protocol::EventMsg;
use easel_core::protocol::INITIAL_SUBMIT_ID;
use http::HeaderMap;
use http::StatusCode;
use serde_json::json;
use tempfile::TempDir;

mod generation;
mod history;

pub(crate) const VALID_KEY: &str = "sk-or-12345678901234";

/// What the fixture transport answers a streaming request with.
#[derive(Clone)]
pub(crate) enum Reply {
    /// SSE body chunks, delivered in order.
    Body(Vec<String>),
    /// A body that never produces a byte.
    Hang,
}

#[derive(Clone)]
pub(crate) struct FixtureTransport {
    reply: Reply,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl FixtureTransport {
    pub(crate) fn new(reply: Reply) -> Self {
        Self {
            reply,
            seen: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for FixtureTransport {
    async fn execute(&self, _req: Request) -> Result<Response, TransportError> {
        Err(TransportError::Build("execute should not run".to_string()))
    }

    async fn stream(&self, req: Request) -> Result<StreamResponse, TransportError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req);
        }
        let bytes = match &self.reply {
            Reply::Body(chunks) => {
                let chunks: Vec<Result<Bytes, TransportError>> = chunks
                    .iter()
                    .map(|chunk| Ok(Bytes::from(chunk.clone())))
                    .collect();
                futures::stream::iter(chunks).boxed()
            }
            Reply::Hang => futures::stream::pending::<Result<Bytes, TransportError>>().boxed(),
        };
        Ok(StreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            bytes,
        })
    }
}

/// A small solid red PNG as a data URI.
pub(crate) fn red_png_data_uri() -> String {
    let mut swatch = RasterSurface::new(2, 2);
    for pixel in swatch.pixels_mut().pixels_mut() {
        *pixel = image::Rgba([255, 0, 0, 255]);
    }
    swatch.export_data_uri().expect("encode swatch")
}

/// One `data:` line carrying `value` as a chunk.
pub(crate) fn sse_line(value: serde_json::Value) -> String {
    format!("data: {value}\n\n")
}

/// A complete body: a progress message, then an image in `delta.images`.
pub(crate) fn image_body(url: &str) -> Vec<String> {
    vec![
        sse_line(json!({"choices": [{"delta": {"content": "Painting the fox"}}]})),
        sse_line(json!({"choices": [{"delta": {"images": [
            {"type": "image_url", "image_url": {"url": url}}
        ]}}]})),
        "data: [DONE]\n\n".to_string(),
    ]
}

pub(crate) struct TestEasel {
    pub(crate) easel: Easel,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) transport: FixtureTransport,
    _home: TempDir,
}

pub(crate) struct Setup {
    pub(crate) reply: Reply,
    pub(crate) stored_key: Option<&'static str>,
    pub(crate) surface: Option<Box<dyn DrawingSurface>>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            reply: Reply::Body(Vec::new()),
            stored_key: None,
            surface: Some(Box::new(RasterSurface::new(8, 6))),
        }
    }
}

/// Spawns a session and consumes its `SessionConfigured` event.
pub(crate) async fn start(setup: Setup) -> TestEasel {
    let home = TempDir::new().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    if let Some(key) = setup.stored_key {
        store
            .set(easel_core::store::API_KEY_STORAGE_KEY, key)
            .expect("store key");
    }
    let transport = FixtureTransport::new(setup.reply);
    let easel = Easel::spawn(
        Config::for_home(home.path().to_path_buf()),
        setup.surface,
        store.clone(),
        transport.clone(),
    );
    let first = easel.next_event().await.expect("first event");
    assert_eq!(first.id, INITIAL_SUBMIT_ID);
    assert!(matches!(first.msg, EventMsg::SessionConfigured(_)));

    TestEasel {
        easel,
        store,
        transport,
        _home: home,
    }
}

/// Waits for the next event matching `predicate`, skipping the rest.
pub(crate) async fn wait_for_event<F>(easel: &Easel, mut predicate: F) -> EventMsg
where
    F: FnMut(&EventMsg) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), easel.next_event())
            .await
            .expect("timeout waiting for event")
            .expect("session ended unexpectedly");
        if predicate(&event.msg) {
            return event.msg;
        }
    }
}

/// The next event, whatever it is.
pub(crate) async fn next_msg(easel: &Easel) -> EventMsg {
    wait_for_event(easel, |_| true).await
}
