//! Queue-pair protocol between a front end and an [`crate::Easel`] session.
//!
//! Front ends send [`Submission`]s and read [`Event`]s. Every event carries
//! the id of the submission that caused it; events raised at session start
//! use [`INITIAL_SUBMIT_ID`].

use crate::error::ErrorKind;
use crate::record::GeneratedImageRecord;
use crate::record::RecordId;
use serde::Deserialize;
use serde::Serialize;

pub const INITIAL_SUBMIT_ID: &str = "";

/// Submission Queue Entry - requests from the front end
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Submission {
    /// Unique id for this Submission to correlate with Events
    pub id: String,
    /// Payload
    pub op: Op,
}

/// Submission operation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Op {
    /// Capture the current surface after a discrete edit.
    SaveState,
    Undo,
    Redo,
    /// Drop every snapshot. The surface is untouched.
    ClearHistory,
    /// Wipe the surface to its background and restart history from it.
    ClearCanvas,
    ExportCanvas,

    /// Remember `prompt` as the current prompt without generating.
    SetPrompt { prompt: String },
    Generate { prompt: String },
    /// Generate again with the current prompt.
    Retry,
    /// Abort the in-flight generation, if any.
    Interrupt,

    SetApiKey { api_key: String },
    ClearApiKey,

    /// Draw a generated image onto the surface and capture the result.
    CommitImage { id: RecordId },
    RemoveImage { id: RecordId },
    ClearImages,

    /// Stop the session. Answered by `ShutdownComplete`.
    Shutdown,
}

/// Event Queue Entry - events from the session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Event {
    /// Submission `id` that this event is correlated with.
    pub id: String,
    /// Payload
    pub msg: EventMsg,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventMsg {
    /// First event of every session.
    SessionConfigured(SessionConfiguredEvent),

    /// The history log changed length or position.
    HistoryChanged(HistoryChangedEvent),

    /// A snapshot was loaded into the surface by undo or redo.
    SnapshotApplied(SnapshotAppliedEvent),

    CanvasExported(CanvasExportedEvent),

    GenerationStarted(GenerationStartedEvent),

    /// Streamed text from the provider while a generation runs.
    GenerationProgress(GenerationProgressEvent),

    ImageGenerated(ImageGeneratedEvent),

    ImageCommitted(ImageCommittedEvent),

    ImagesChanged(ImagesChangedEvent),

    /// The user needs to supply an API key before generating.
    ApiKeyRequired,

    ApiKeyUpdated(ApiKeyUpdatedEvent),

    Error(ErrorEvent),

    ShutdownComplete,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SessionConfiguredEvent {
    pub model: String,
    pub has_api_key: bool,
    pub image_count: usize,
    pub history_len: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct HistoryChangedEvent {
    /// Active position; `-1` when the log is empty.
    pub step: i64,
    pub len: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct SnapshotAppliedEvent {
    pub step: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CanvasExportedEvent {
    pub data_uri: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenerationStartedEvent {
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenerationProgressEvent {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImageGeneratedEvent {
    pub record: GeneratedImageRecord,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImageCommittedEvent {
    pub id: RecordId,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImagesChangedEvent {
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiKeyUpdatedEvent {
    pub present: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
    pub kind: ErrorKind,
}
