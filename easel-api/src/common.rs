use crate::error::ApiError;
use crate::extract::ImageSource;
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use tokio::sync::mpsc;

const INLINE_IMAGE_PREFIX: &str = "data:image/";

/// A generated image: either an inline `data:image/...;base64,` URI or a
/// remote URL that still has to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True for base64 data URIs that need no download.
    pub fn is_inline(&self) -> bool {
        self.0.starts_with(INLINE_IMAGE_PREFIX)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inline payloads can be megabytes long.
        if self.is_inline() && self.0.chars().count() > 64 {
            let head: String = self.0.chars().take(64).collect();
            write!(f, "{head}…")
        } else {
            f.write_str(&self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEvent {
    /// Non-empty `choices[0].delta.content` text, forwarded as it arrives.
    Progress(String),
    /// An extractor found an image; it replaces any earlier capture.
    ImageCaptured { image: ImageRef, source: ImageSource },
    /// The body ended; carries the last captured image. Always the final item.
    Completed(ImageRef),
}

/// Events parsed from one streaming generation response. Dropping the stream
/// stops the background parser at its next send.
pub struct ImageStream {
    pub rx_event: mpsc::Receiver<Result<ImageEvent, ApiError>>,
}

impl ImageStream {
    /// Drains the stream, invoking `on_progress` for every progress chunk,
    /// and returns the final image.
    pub async fn final_image<F>(mut self, mut on_progress: F) -> Result<ImageRef, ApiError>
    where
        F: FnMut(&str),
    {
        while let Some(event) = self.next().await {
            match event? {
                ImageEvent::Progress(content) => on_progress(&content),
                ImageEvent::ImageCaptured { .. } => {}
                ImageEvent::Completed(image) => return Ok(image),
            }
        }
        Err(ApiError::Stream(
            "stream closed before the response completed".to_string(),
        ))
    }
}

impl Stream for ImageStream {
    type Item = Result<ImageEvent, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx_event.poll_recv(cx)
    }
}
