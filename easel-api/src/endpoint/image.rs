use crate::auth::AuthProvider;
use crate::common::ImageStream;
use crate::endpoint::session::EndpointSession;
use crate::error::ApiError;
use crate::provider::Provider;
use crate::requests::image::ImageGenerationRequest;
use crate::sse::image::DoneSentinel;
use crate::sse::spawn_image_stream;
use easel_client::HttpTransport;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use serde_json::Value;

/// Streams image generations from the provider's chat-completions endpoint.
pub struct ImageClient<T: HttpTransport, A: AuthProvider> {
    session: EndpointSession<T, A>,
    done: DoneSentinel,
}

impl<T: HttpTransport, A: AuthProvider> ImageClient<T, A> {
    pub fn new(transport: T, provider: Provider, auth: A) -> Self {
        Self {
            session: EndpointSession::new(transport, provider, auth),
            done: DoneSentinel::default(),
        }
    }

    pub fn with_done_sentinel(mut self, done: DoneSentinel) -> Self {
        self.done = done;
        self
    }

    fn path() -> &'static str {
        "chat/completions"
    }

    pub async fn stream_request(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<ImageStream, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Stream(format!("failed to encode image request: {e}")))?;
        self.stream(body).await
    }

    /// Sends a raw JSON body. The response is parsed on a background task;
    /// dropping the returned stream abandons it.
    pub async fn stream(&self, body: Value) -> Result<ImageStream, ApiError> {
        let stream_response = self
            .session
            .stream_with(
                Method::POST,
                Self::path(),
                HeaderMap::new(),
                Some(body),
                |req| {
                    req.headers.insert(
                        http::header::ACCEPT,
                        HeaderValue::from_static("text/event-stream"),
                    );
                    req.headers.insert(
                        http::header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                },
            )
            .await?;

        Ok(spawn_image_stream(
            stream_response,
            self.session.provider().stream_idle_timeout,
            self.done,
        ))
    }
}
