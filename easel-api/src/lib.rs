pub mod auth;
pub mod common;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod provider;
pub mod requests;
pub mod sse;

pub use crate::auth::AuthProvider;
pub use crate::auth::Credential;
pub use crate::auth::validate_api_key;
pub use crate::common::ImageEvent;
pub use crate::common::ImageRef;
pub use crate::common::ImageStream;
pub use crate::endpoint::download::download_as_data_uri;
pub use crate::endpoint::image::ImageClient;
pub use crate::error::ApiError;
pub use crate::extract::ImageSource;
pub use crate::extract::extract_image_from_content;
pub use crate::provider::DEFAULT_BASE_URL;
pub use crate::provider::Provider;
pub use crate::requests::DEFAULT_INSTRUCTIONS;
pub use crate::requests::DEFAULT_MODEL;
pub use crate::requests::image::ImageGenerationRequest;
pub use crate::requests::image::ImageRequestBuilder;
pub use crate::sse::image::DoneSentinel;
pub use crate::sse::image::process_image_sse;
