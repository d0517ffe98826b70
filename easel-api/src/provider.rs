use easel_client::Request;
use http::Method;
use http::header::HeaderMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// HTTP endpoint configuration for the image-generation provider.
///
/// Encapsulates the base URL, default headers and timeouts, plus helpers for
/// building requests against it.
#[derive(Debug, Clone)]
pub struct Provider {
    pub base_url: String,
    /// Sent with every request, e.g. OpenRouter's `HTTP-Referer` and `X-Title`.
    pub headers: HeaderMap,
    /// Per-request timeout applied by the transport. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Longest silence tolerated between two streamed lines. `None` reads
    /// until the transport closes the body.
    pub stream_idle_timeout: Option<Duration>,
}

impl Default for Provider {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headers: HeaderMap::new(),
            request_timeout: None,
            stream_idle_timeout: None,
        }
    }
}

impl Provider {
    pub fn url_for_path(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn build_request(&self, method: Method, path: &str) -> Request {
        let mut req = Request::new(method, self.url_for_path(path));
        req.headers = self.headers.clone();
        req.with_timeout(self.request_timeout)
    }
}
