mod default_client;
mod error;
mod request;
mod transport;

pub use crate::default_client::EaselHttpClient;
pub use crate::default_client::EaselRequestBuilder;
pub use crate::error::TransportError;
pub use crate::request::Request;
pub use crate::request::Response;
pub use crate::transport::ByteStream;
pub use crate::transport::HttpTransport;
pub use crate::transport::ReqwestTransport;
pub use crate::transport::StreamResponse;
