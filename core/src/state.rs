//! Session state and the pure transition function over it.

use crate::history::History;
use crate::history::HistoryAction;
use crate::record::GeneratedImageRecord;
use crate::record::RecordId;
use easel_api::Credential;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub history: History,
    pub ai: AiState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiState {
    /// Last prompt entered; what `Retry` generates with.
    pub prompt: String,
    pub is_generating: bool,
    /// The single current error message, if any.
    pub error: Option<String>,
    pub api_key_prompt_open: bool,
    pub api_key: Option<Credential>,
    /// Oldest first.
    pub images: Vec<GeneratedImageRecord>,
}

impl AiState {
    pub fn image(&self, id: &RecordId) -> Option<&GeneratedImageRecord> {
        self.images.iter().find(|record| &record.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    History(HistoryAction),
    SetPrompt(String),
    GenerationStarted { prompt: String },
    GenerationFinished,
    SetError(String),
    ClearError,
    ShowApiKeyPrompt(bool),
    SetApiKey(Option<Credential>),
    AddImage(GeneratedImageRecord),
    RemoveImage(RecordId),
    ClearImages,
    LoadImages(Vec<GeneratedImageRecord>),
}

/// Applies `action` to `state`. No I/O; the caller performs side effects
/// such as repainting the surface or persisting images.
pub fn reduce(mut state: SessionState, action: Action) -> SessionState {
    let ai = &mut state.ai;
    match action {
        Action::History(action) => {
            state.history.apply(action);
        }
        Action::SetPrompt(prompt) => ai.prompt = prompt,
        Action::GenerationStarted { prompt } => {
            ai.prompt = prompt;
            ai.is_generating = true;
            ai.error = None;
        }
        Action::GenerationFinished => ai.is_generating = false,
        Action::SetError(message) => ai.error = Some(message),
        Action::ClearError => ai.error = None,
        Action::ShowApiKeyPrompt(open) => ai.api_key_prompt_open = open,
        Action::SetApiKey(api_key) => {
            if api_key.is_some() {
                ai.api_key_prompt_open = false;
                ai.error = None;
            }
            ai.api_key = api_key;
        }
        Action::AddImage(record) => ai.images.push(record),
        Action::RemoveImage(id) => ai.images.retain(|record| record.id != id),
        Action::ClearImages => ai.images.clear(),
        Action::LoadImages(images) => ai.images = images,
    }
    state
}
