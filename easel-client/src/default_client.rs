use reqwest::Method;
use reqwest::Response;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use serde::Serialize;
use std::time::Duration;

/// Response headers that identify a request on the provider side; logged with
/// every completed request so failures can be correlated with the provider.
const REQUEST_ID_HEADERS: [&str; 3] = ["cf-ray", "x-request-id", "x-generation-id"];

/// `reqwest::Client` wrapper whose requests log their outcome at `debug`.
#[derive(Clone, Debug)]
pub struct EaselHttpClient {
    inner: reqwest::Client,
}

impl EaselHttpClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    pub fn request(&self, method: Method, url: &str) -> EaselRequestBuilder {
        EaselRequestBuilder {
            builder: self.inner.request(method.clone(), url),
            method,
            url: url.to_string(),
        }
    }
}

#[must_use = "requests are not sent unless `send` is awaited"]
#[derive(Debug)]
pub struct EaselRequestBuilder {
    builder: reqwest::RequestBuilder,
    method: Method,
    url: String,
}

impl EaselRequestBuilder {
    fn map(self, f: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder) -> Self {
        Self {
            builder: f(self.builder),
            ..self
        }
    }

    pub fn headers(self, headers: HeaderMap) -> Self {
        self.map(|builder| builder.headers(headers))
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|builder| builder.timeout(timeout))
    }

    pub fn json<T>(self, value: &T) -> Self
    where
        T: ?Sized + Serialize,
    {
        self.map(|builder| builder.json(value))
    }

    pub async fn send(self) -> Result<Response, reqwest::Error> {
        let Self {
            builder,
            method,
            url,
        } = self;
        match builder.send().await {
            Ok(response) => {
                let request_ids: Vec<(&str, &str)> = REQUEST_ID_HEADERS
                    .iter()
                    .filter_map(|&name| {
                        let value = response.headers().get(HeaderName::from_static(name))?;
                        Some((name, value.to_str().ok()?))
                    })
                    .collect();
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status = %response.status(),
                    request_ids = ?request_ids,
                    "Request completed"
                );
                Ok(response)
            }
            Err(error) => {
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status = error.status().map(|s| s.as_u16()),
                    error = %error,
                    "Request failed"
                );
                Err(error)
            }
        }
    }
}
