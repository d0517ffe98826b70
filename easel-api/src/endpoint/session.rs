use crate::auth::AuthProvider;
use crate::auth::add_auth_headers;
use crate::error::ApiError;
use crate::provider::Provider;
use easel_client::HttpTransport;
use easel_client::Request;
use easel_client::StreamResponse;
use http::HeaderMap;
use http::Method;
use serde_json::Value;

/// A transport bound to one provider and credential. Every request built
/// here carries the provider's headers and timeout plus the bearer token.
pub(crate) struct EndpointSession<T: HttpTransport, A: AuthProvider> {
    transport: T,
    provider: Provider,
    auth: A,
}

impl<T: HttpTransport, A: AuthProvider> EndpointSession<T, A> {
    pub(crate) fn new(transport: T, provider: Provider, auth: A) -> Self {
        Self {
            transport,
            provider,
            auth,
        }
    }

    pub(crate) fn provider(&self) -> &Provider {
        &self.provider
    }

    fn make_request(
        &self,
        method: Method,
        path: &str,
        extra_headers: HeaderMap,
        body: Option<Value>,
    ) -> Request {
        let mut req = self.provider.build_request(method, path);
        req.headers.extend(extra_headers);
        req.body = body;
        add_auth_headers(&self.auth, req)
    }

    pub(crate) async fn stream_with<C>(
        &self,
        method: Method,
        path: &str,
        extra_headers: HeaderMap,
        body: Option<Value>,
        configure: C,
    ) -> Result<StreamResponse, ApiError>
    where
        C: FnOnce(&mut Request),
    {
        let mut req = self.make_request(method, path, extra_headers, body);
        configure(&mut req);
        Ok(self.transport.stream(req).await?)
    }
}
