use std::path::PathBuf;

use easel_core::Config;
use easel_core::protocol::Event;
use easel_core::protocol::SessionConfiguredEvent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    Running,
    InitiateShutdown,
    Shutdown,
}

/// A file the run wrote to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub kind: WrittenFileKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrittenFileKind {
    /// The generated image.
    Image,
    /// The canvas with the generated image drawn onto it.
    Composite,
}

pub(crate) trait EventProcessor {
    /// Print summary of effective configuration and user prompt.
    fn print_config_summary(
        &mut self,
        config: &Config,
        prompt: &str,
        session_configured: &SessionConfiguredEvent,
    );

    /// Handle a single event emitted by the session.
    fn process_event(&mut self, event: Event) -> SessionStatus;

    fn print_final_output(&mut self, _written: &[WrittenFile]) {}
}
