use easel_core::Config;
use easel_core::protocol::ErrorEvent;
use easel_core::protocol::Event;
use easel_core::protocol::EventMsg;
use easel_core::protocol::GenerationProgressEvent;
use easel_core::protocol::ImageGeneratedEvent;
use easel_core::protocol::SessionConfiguredEvent;
use owo_colors::OwoColorize;
use owo_colors::Style;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;
use crate::event_processor::WrittenFile;

/// Progress goes to stderr; stdout only ever receives the paths written.
pub(crate) struct EventProcessorWithHumanOutput {
    bold: Style,
    dimmed: Style,
    green: Style,
    red: Style,
    /// Streamed text printed since the last newline.
    progress_open: bool,
}

impl EventProcessorWithHumanOutput {
    pub(crate) fn create_with_ansi(with_ansi: bool) -> Self {
        if with_ansi {
            Self {
                bold: Style::new().bold(),
                dimmed: Style::new().dimmed(),
                green: Style::new().green(),
                red: Style::new().red(),
                progress_open: false,
            }
        } else {
            Self {
                bold: Style::new(),
                dimmed: Style::new(),
                green: Style::new(),
                red: Style::new(),
                progress_open: false,
            }
        }
    }

    #[allow(clippy::print_stderr)]
    fn close_progress(&mut self) {
        if self.progress_open {
            eprintln!();
            self.progress_open = false;
        }
    }
}

#[allow(clippy::print_stderr)]
impl EventProcessor for EventProcessorWithHumanOutput {
    fn print_config_summary(
        &mut self,
        config: &Config,
        prompt: &str,
        session_configured: &SessionConfiguredEvent,
    ) {
        eprintln!("{}", "--------".style(self.dimmed));
        eprintln!("{} {}", "model:".style(self.bold), session_configured.model);
        eprintln!("{} {}", "provider:".style(self.bold), config.base_url);
        eprintln!(
            "{} {}",
            "stored images:".style(self.bold),
            session_configured.image_count
        );
        eprintln!("{}", "--------".style(self.dimmed));
        eprintln!("{}\n{prompt}", "prompt".style(self.bold));
    }

    fn process_event(&mut self, event: Event) -> SessionStatus {
        match event.msg {
            EventMsg::GenerationStarted(_) => {
                eprintln!("{}", "generating...".style(self.dimmed));
            }
            EventMsg::GenerationProgress(GenerationProgressEvent { content }) => {
                eprint!("{content}");
                self.progress_open = true;
            }
            EventMsg::ImageGenerated(ImageGeneratedEvent { record }) => {
                self.close_progress();
                eprintln!("{} {}", "image generated".style(self.green), record.id);
            }
            EventMsg::ImageCommitted(_) => {
                eprintln!("{}", "image drawn onto the canvas".style(self.green));
            }
            EventMsg::ApiKeyRequired => {
                self.close_progress();
                eprintln!(
                    "{} An API key is required to generate images. Run `easel login` first.",
                    "ERROR:".style(self.red)
                );
                return SessionStatus::InitiateShutdown;
            }
            EventMsg::Error(ErrorEvent { message, .. }) => {
                self.close_progress();
                eprintln!("{} {message}", "ERROR:".style(self.red));
                return SessionStatus::InitiateShutdown;
            }
            EventMsg::ShutdownComplete => return SessionStatus::Shutdown,
            EventMsg::SessionConfigured(_)
            | EventMsg::HistoryChanged(_)
            | EventMsg::SnapshotApplied(_)
            | EventMsg::CanvasExported(_)
            | EventMsg::ImagesChanged(_)
            | EventMsg::ApiKeyUpdated(_) => {}
        }
        SessionStatus::Running
    }

    #[allow(clippy::print_stdout)]
    fn print_final_output(&mut self, written: &[WrittenFile]) {
        for file in written {
            println!("{}", file.path.display());
        }
    }
}
