use crate::common::ImageEvent;
use crate::common::ImageRef;
use crate::common::ImageStream;
use crate::error::ApiError;
use crate::extract::ChatChunk;
use crate::extract::scan_chunk;
use crate::sse::lines::SseLine;
use crate::sse::lines::SseLineDecoder;
use crate::sse::lines::classify_line;
use bytes::Bytes;
use easel_client::StreamResponse;
use easel_client::TransportError;
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::debug;
use tracing::trace;

/// How a `data: [DONE]` line affects the read loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneSentinel {
    /// Skip the line and keep reading until the transport closes the body.
    #[default]
    ReadToEof,
    /// Stop reading at the sentinel; anything after it is ignored.
    Stop,
}

pub(crate) fn spawn_image_stream(
    stream_response: StreamResponse,
    idle_timeout: Option<Duration>,
    done: DoneSentinel,
) -> ImageStream {
    let (tx_event, rx_event) = mpsc::channel::<Result<ImageEvent, ApiError>>(256);
    tokio::spawn(async move {
        process_image_sse(stream_response.bytes, tx_event, idle_timeout, done).await;
    });
    ImageStream { rx_event }
}

/// Parses a streaming chat-completions body into [`ImageEvent`]s.
///
/// Always finishes with exactly one terminal item: `Ok(Completed(_))` carrying
/// the last captured image, or an error. Returns early, without a terminal
/// item, once the receiver is gone. A dropped receiver is noticed while
/// waiting on the body too, so the body is released without further input.
pub async fn process_image_sse<S>(
    stream: S,
    tx_event: mpsc::Sender<Result<ImageEvent, ApiError>>,
    idle_timeout: Option<Duration>,
    done: DoneSentinel,
) where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let reader = StreamReader::new(stream.map(|chunk| chunk.map_err(io::Error::other)));
    let mut lines = FramedRead::new(reader, SseLineDecoder::new());
    let mut captured: Option<ImageRef> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = tx_event.closed() => {
                debug!("Image stream consumer dropped, closing response body");
                return;
            }
            next = next_line(&mut lines, idle_timeout) => next,
        };
        let Some(next) = next else {
            let _ = tx_event
                .send(Err(ApiError::Stream("idle timeout waiting for SSE".into())))
                .await;
            return;
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                let _ = tx_event.send(Err(read_error(err))).await;
                return;
            }
            None => break,
        };

        let payload = match classify_line(&line) {
            SseLine::Ignored => continue,
            SseLine::Done => match done {
                DoneSentinel::ReadToEof => continue,
                DoneSentinel::Stop => break,
            },
            SseLine::Data(payload) => payload,
        };

        trace!("SSE event: {payload}");

        let chunk: ChatChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!("Failed to parse image SSE event: {err}, data: {payload}");
                continue;
            }
        };

        if let Some(content) = chunk.delta_content()
            && tx_event
                .send(Ok(ImageEvent::Progress(content.to_string())))
                .await
                .is_err()
        {
            return;
        }

        for (source, image) in scan_chunk(&chunk) {
            captured = Some(image.clone());
            if tx_event
                .send(Ok(ImageEvent::ImageCaptured { image, source }))
                .await
                .is_err()
            {
                return;
            }
        }
    }

    let terminal = match captured {
        Some(image) => Ok(ImageEvent::Completed(image)),
        None => Err(ApiError::NoImageGenerated),
    };
    let _ = tx_event.send(terminal).await;
}

/// Next framed line, or `None` when `idle_timeout` elapses first.
async fn next_line<L>(
    lines: &mut L,
    idle_timeout: Option<Duration>,
) -> Option<Option<Result<String, io::Error>>>
where
    L: Stream<Item = Result<String, io::Error>> + Unpin,
{
    match idle_timeout {
        Some(idle) => timeout(idle, lines.next()).await.ok(),
        None => Some(lines.next().await),
    }
}

fn read_error(err: io::Error) -> ApiError {
    ApiError::Stream(err.to_string())
}
