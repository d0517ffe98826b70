use easel_core::Config;
use easel_core::protocol::Event;
use easel_core::protocol::EventMsg;
use easel_core::protocol::INITIAL_SUBMIT_ID;
use easel_core::protocol::SessionConfiguredEvent;
use serde::Serialize;
use tracing::error;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;
use crate::event_processor::WrittenFile;

/// Writes every session event to stdout as one JSON object per line,
/// followed by one `file_written` line per output file.
pub struct EventProcessorWithJsonOutput;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputLine<'a> {
    FileWritten(&'a WrittenFile),
}

impl EventProcessorWithJsonOutput {
    #[allow(clippy::print_stdout)]
    fn emit<T: Serialize>(value: &T) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize event: {e:?}"),
        }
    }
}

impl EventProcessor for EventProcessorWithJsonOutput {
    fn print_config_summary(&mut self, _: &Config, _: &str, ev: &SessionConfiguredEvent) {
        self.process_event(Event {
            id: INITIAL_SUBMIT_ID.to_string(),
            msg: EventMsg::SessionConfigured(ev.clone()),
        });
    }

    fn process_event(&mut self, event: Event) -> SessionStatus {
        Self::emit(&event);
        match event.msg {
            EventMsg::Error(_) | EventMsg::ApiKeyRequired => SessionStatus::InitiateShutdown,
            EventMsg::ShutdownComplete => SessionStatus::Shutdown,
            _ => SessionStatus::Running,
        }
    }

    fn print_final_output(&mut self, written: &[WrittenFile]) {
        for file in written {
            Self::emit(&OutputLine::FileWritten(file));
        }
    }
}
