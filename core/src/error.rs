use crate::surface::SurfaceError;
use easel_api::ApiError;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EaselErr>;

/// Failures of the session plumbing itself, as opposed to a failed
/// operation reported through an `Error` event.
#[derive(Error, Debug)]
pub enum EaselErr {
    /// The session task exited; no more submissions or events.
    #[error("internal error; session loop died unexpectedly")]
    InternalSessionDied,

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Why a credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    InvalidFormat,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthFailure::Missing => "An API key is required to generate images",
            AuthFailure::InvalidFormat => "Invalid API key format",
        })
    }
}

/// Coarse classification of a failed operation, carried on error events so
/// front ends can react (e.g. open a credential prompt for `Auth`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    Auth,
    Busy,
    Upstream,
    NoImageGenerated,
    Cancelled,
    Surface,
    Storage,
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Auth(AuthFailure),

    #[error("An image generation is already in progress")]
    Busy,

    #[error("Failed to prepare canvas: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Failed to generate image: {0}")]
    Upstream(#[from] ApiError),

    #[error("Image generation was cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl GenerateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerateError::Validation(_) => ErrorKind::Validation,
            GenerateError::Precondition(_) => ErrorKind::Precondition,
            GenerateError::Auth(_) => ErrorKind::Auth,
            GenerateError::Busy => ErrorKind::Busy,
            GenerateError::Surface(_) => ErrorKind::Surface,
            GenerateError::Upstream(ApiError::NoImageGenerated) => ErrorKind::NoImageGenerated,
            GenerateError::Upstream(_) | GenerateError::Internal(_) => ErrorKind::Upstream,
            GenerateError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
