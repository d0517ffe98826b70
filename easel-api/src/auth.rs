use easel_client::Request;
use http::HeaderMap;
use http::HeaderValue;
use std::fmt;

/// Minimum number of characters (after trimming) a provider key must exceed.
const MIN_API_KEY_LEN: usize = 10;

/// Provides the bearer token attached to provider requests.
///
/// Implementations must be cheap and non-blocking; loading the key from
/// storage happens before a request reaches this interface.
pub trait AuthProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Returns whether `api_key` looks like a usable provider key.
pub fn validate_api_key(api_key: &str) -> bool {
    api_key.trim().chars().count() > MIN_API_KEY_LEN
}

/// The provider API key. Only ever sent as an `Authorization` header to the
/// configured endpoint; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a trimmed key, or returns `None` when the key fails
    /// [`validate_api_key`].
    pub fn parse(raw: &str) -> Option<Self> {
        validate_api_key(raw).then(|| Self(raw.trim().to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl AuthProvider for Credential {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

pub(crate) fn add_auth_headers_to_header_map<A: AuthProvider>(auth: &A, headers: &mut HeaderMap) {
    if let Some(token) = auth.bearer_token()
        && let Ok(mut header) = HeaderValue::from_str(&format!("Bearer {token}"))
    {
        header.set_sensitive(true);
        let _ = headers.insert(http::header::AUTHORIZATION, header);
    }
}

pub(crate) fn add_auth_headers<A: AuthProvider>(auth: &A, mut req: Request) -> Request {
    add_auth_headers_to_header_map(auth, &mut req.headers);
    req
}
