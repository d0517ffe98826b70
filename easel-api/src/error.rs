use easel_client::TransportError;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(TransportError),
    /// Non-2xx response from the provider.
    #[error("API Error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("stream error: {0}")]
    Stream(String),
    /// The stream ended without any extractable image reference.
    #[error("No image generated in the response")]
    NoImageGenerated,
    #[error("Failed to download image: {0}")]
    Download(String),
    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http { status, body, .. } => {
                let message = body
                    .as_deref()
                    .and_then(|body| serde_json::from_str::<ErrorBody>(body).ok())
                    .and_then(|parsed| parsed.error)
                    .and_then(|detail| detail.message)
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
                ApiError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
            other => ApiError::Transport(other),
        }
    }
}
