use crate::common::ImageRef;
use crate::error::ApiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use easel_client::HttpTransport;
use easel_client::Request;
use http::Method;
use std::time::Duration;
use tracing::debug;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Fetches a remote image and re-encodes it as a base64 data URI, so that it
/// can be placed on the canvas and persisted like an inline result.
///
/// Inline references are returned unchanged. No credentials are attached:
/// image hosts are not the provider.
pub async fn download_as_data_uri<T: HttpTransport>(
    transport: &T,
    image: &ImageRef,
    timeout: Option<Duration>,
) -> Result<ImageRef, ApiError> {
    if image.is_inline() {
        return Ok(image.clone());
    }

    let req = Request::new(Method::GET, image.as_str().to_string()).with_timeout(timeout);
    let response = transport
        .execute(req)
        .await
        .map_err(|err| ApiError::Download(err.to_string()))?;

    let content_type = response
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    debug!(
        url = image.as_str(),
        bytes = response.body.len(),
        content_type,
        "downloaded generated image"
    );

    Ok(ImageRef::new(format!(
        "data:{content_type};base64,{}",
        STANDARD.encode(&response.body)
    )))
}
