// - In the default output mode, stdout only ever receives the paths of the
//   files written.
// - In --json mode, stdout must be valid JSONL, one event per line.
// For both modes, any other output must be written to stderr.
#![deny(clippy::print_stdout)]

mod cli;
mod event_processor;
mod event_processor_with_human_output;
pub mod event_processor_with_jsonl_output;

pub use cli::Cli;
pub use cli::Command;
pub use cli::GenerateArgs;
pub use cli::ImagesCommand;
pub use event_processor::WrittenFile;
pub use event_processor::WrittenFileKind;

use std::io::IsTerminal;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use easel_api::Credential;
use easel_client::ReqwestTransport;
use easel_core::Config;
use easel_core::ConfigOverrides;
use easel_core::Easel;
use easel_core::FileStore;
use easel_core::GeneratedImageRecord;
use easel_core::KeyValueStore;
use easel_core::RasterSurface;
use easel_core::RecordId;
use easel_core::protocol::CanvasExportedEvent;
use easel_core::protocol::Event;
use easel_core::protocol::EventMsg;
use easel_core::protocol::ImageGeneratedEvent;
use easel_core::protocol::Op;
use easel_core::store::API_KEY_STORAGE_KEY;
use easel_core::store::load_images;
use easel_core::store::save_images;
use easel_core::surface::DEFAULT_HEIGHT;
use easel_core::surface::DEFAULT_WIDTH;
use easel_core::surface::decode_data_uri;
use supports_color::Stream;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;
use crate::event_processor_with_human_output::EventProcessorWithHumanOutput;
use crate::event_processor_with_jsonl_output::EventProcessorWithJsonOutput;

const INVALID_API_KEY_MESSAGE: &str = "Please enter a valid API key";

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        model,
        base_url,
        json: json_mode,
        color,
    } = cli;

    // Everything but the final paths is written to stderr.
    let with_ansi = match color {
        cli::Color::Always => true,
        cli::Color::Never => false,
        cli::Color::Auto => supports_color::on_cached(Stream::Stderr).is_some(),
    };

    let default_level = "error";
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(with_ansi)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();

    let config = Config::load_with_overrides(ConfigOverrides { model, base_url })?;
    let store = FileStore::open(&config.easel_home)
        .with_context(|| format!("failed to open storage in {}", config.easel_home.display()))?;

    match command {
        Command::Generate(args) => {
            let mut event_processor: Box<dyn EventProcessor> = match json_mode {
                true => Box::new(EventProcessorWithJsonOutput),
                false => Box::new(EventProcessorWithHumanOutput::create_with_ansi(with_ansi)),
            };
            run_generate(config, Arc::new(store), args, event_processor.as_mut()).await
        }
        Command::Login(args) => login(&store, args.api_key),
        Command::Logout => logout(&store),
        Command::Images(cmd) => run_images(&store, cmd, json_mode),
    }
}

async fn run_generate(
    config: Config,
    store: Arc<dyn KeyValueStore>,
    args: GenerateArgs,
    event_processor: &mut dyn EventProcessor,
) -> anyhow::Result<()> {
    let GenerateArgs {
        prompt,
        canvas,
        output,
        commit,
    } = args;
    let prompt = resolve_prompt(prompt)?;

    let surface = match &canvas {
        Some(path) => {
            let encoded = std::fs::read(path)
                .with_context(|| format!("failed to read canvas {}", path.display()))?;
            RasterSurface::from_encoded(&encoded)
                .with_context(|| format!("failed to decode canvas {}", path.display()))?
        }
        None => RasterSurface::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("easel/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let easel = Arc::new(Easel::spawn(
        config.clone(),
        Some(Box::new(surface)),
        store,
        ReqwestTransport::new(client),
    ));

    let first = easel.next_event().await?;
    if let EventMsg::SessionConfigured(session_configured) = &first.msg {
        event_processor.print_config_summary(&config, &prompt, session_configured);
        info!("Easel initialized with event: {session_configured:?}");
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    {
        let easel = easel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        debug!("Keyboard interrupt");
                        // The session answers with a cancelled error, which
                        // shuts the run down below.
                        easel.submit(Op::Interrupt).await.ok();
                    }
                    res = easel.next_event() => match res {
                        Ok(event) => {
                            let is_shutdown_complete = matches!(event.msg, EventMsg::ShutdownComplete);
                            if let Err(e) = tx.send(event) {
                                error!("Error sending event: {e:?}");
                                break;
                            }
                            if is_shutdown_complete {
                                info!("Received shutdown event, exiting event loop.");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Error receiving event: {e:?}");
                            break;
                        }
                    }
                }
            }
        });
    }

    let sub_id = easel.submit(Op::Generate { prompt }).await?;
    info!("Sent prompt with event ID: {sub_id}");

    let mut run = GenerateRun::new(output, commit);
    let mut error_seen = false;
    let mut shutdown_requested = false;
    while let Some(event) = rx.recv().await {
        if matches!(event.msg, EventMsg::Error(_) | EventMsg::ApiKeyRequired) {
            error_seen = true;
        }
        let follow_up = run.on_event(&event.msg)?;
        let status = event_processor.process_event(event);
        if let Some(op) = follow_up {
            submit_follow_up(&easel, op, &mut shutdown_requested).await?;
        }
        match status {
            SessionStatus::Running => continue,
            SessionStatus::InitiateShutdown => {
                submit_follow_up(&easel, Op::Shutdown, &mut shutdown_requested).await?;
            }
            SessionStatus::Shutdown => break,
        }
    }
    event_processor.print_final_output(&run.written);
    if error_seen {
        std::process::exit(1);
    }

    Ok(())
}

/// Submits `op` unless a shutdown is already on its way. Several events of
/// one failure may each ask to shut down; only the first request reaches the
/// session, which stops reading submissions after it.
async fn submit_follow_up(
    easel: &Easel,
    op: Op,
    shutdown_requested: &mut bool,
) -> anyhow::Result<()> {
    if *shutdown_requested {
        debug!("Shutdown already requested, skipping follow-up op");
        return Ok(());
    }
    if matches!(op, Op::Shutdown) {
        *shutdown_requested = true;
    }
    easel.submit(op).await?;
    Ok(())
}

/// Drives a generate run through its follow-up steps and writes outputs.
struct GenerateRun {
    output: Option<PathBuf>,
    commit: Option<PathBuf>,
    written: Vec<WrittenFile>,
}

impl GenerateRun {
    fn new(output: Option<PathBuf>, commit: Option<PathBuf>) -> Self {
        Self {
            output,
            commit,
            written: Vec::new(),
        }
    }

    /// Returns the op to submit next, if any.
    fn on_event(&mut self, msg: &EventMsg) -> anyhow::Result<Option<Op>> {
        match msg {
            EventMsg::ImageGenerated(ImageGeneratedEvent { record }) => {
                let path = match self.output.take() {
                    Some(path) => path,
                    None => PathBuf::from(record.download_filename(Utc::now())),
                };
                write_data_uri(&record.url, &path)?;
                self.written.push(WrittenFile {
                    kind: WrittenFileKind::Image,
                    path,
                });
                Ok(Some(match self.commit {
                    Some(_) => Op::CommitImage {
                        id: record.id.clone(),
                    },
                    None => Op::Shutdown,
                }))
            }
            EventMsg::ImageCommitted(_) => Ok(Some(Op::ExportCanvas)),
            EventMsg::CanvasExported(CanvasExportedEvent { data_uri }) => {
                if let Some(path) = self.commit.take() {
                    write_data_uri(data_uri, &path)?;
                    self.written.push(WrittenFile {
                        kind: WrittenFileKind::Composite,
                        path,
                    });
                }
                Ok(Some(Op::Shutdown))
            }
            _ => Ok(None),
        }
    }
}

fn write_data_uri(data_uri: &str, path: &Path) -> anyhow::Result<()> {
    let (_, bytes) = decode_data_uri(data_uri)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn resolve_prompt(prompt_arg: Option<String>) -> anyhow::Result<String> {
    match prompt_arg {
        Some(p) if p != "-" => Ok(p),
        maybe_dash => {
            let force_stdin = matches!(maybe_dash.as_deref(), Some("-"));

            if std::io::stdin().is_terminal() && !force_stdin {
                anyhow::bail!(
                    "No prompt provided. Either specify one as an argument or pipe the prompt into stdin."
                );
            }

            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read prompt from stdin")?;
            if buffer.trim().is_empty() {
                anyhow::bail!("No prompt provided via stdin.");
            }
            Ok(buffer)
        }
    }
}

#[allow(clippy::print_stderr)]
fn login(store: &FileStore, api_key: Option<String>) -> anyhow::Result<()> {
    let api_key = match api_key {
        Some(api_key) => api_key,
        None => {
            if std::io::stdin().is_terminal() {
                eprintln!("Paste your OpenRouter API key and press Ctrl-D:");
            }
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read API key from stdin")?;
            buffer
        }
    };

    let credential = Credential::parse(&api_key).context(INVALID_API_KEY_MESSAGE)?;
    store
        .set(API_KEY_STORAGE_KEY, credential.expose())
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    eprintln!("API key saved to {}", store.path().display());
    Ok(())
}

#[allow(clippy::print_stderr)]
fn logout(store: &FileStore) -> anyhow::Result<()> {
    store
        .remove(API_KEY_STORAGE_KEY)
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    eprintln!("API key removed");
    Ok(())
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn run_images(store: &FileStore, cmd: ImagesCommand, json_mode: bool) -> anyhow::Result<()> {
    let mut images = load_images(store);
    match cmd {
        ImagesCommand::List => {
            for record in &images {
                if json_mode {
                    println!("{}", serde_json::to_string(record)?);
                } else {
                    println!(
                        "{}  {}  {}",
                        record.id,
                        record.timestamp.to_rfc3339(),
                        record.prompt
                    );
                }
            }
        }
        ImagesCommand::Save { id, output } => {
            let record = find_image(&images, &id)?;
            let path = output.unwrap_or_else(|| record.download_filename(Utc::now()).into());
            write_data_uri(&record.url, &path)?;
            println!("{}", path.display());
        }
        ImagesCommand::Remove { id } => {
            let id = RecordId::from(id);
            find_image(&images, id.as_str())?;
            images.retain(|record| record.id != id);
            save_images(store, &images)?;
            eprintln!("Removed {id}");
        }
        ImagesCommand::Clear => {
            save_images(store, &[])?;
            eprintln!("Removed {} image(s)", images.len());
        }
    }
    Ok(())
}

fn find_image<'a>(
    images: &'a [GeneratedImageRecord],
    id: &str,
) -> anyhow::Result<&'a GeneratedImageRecord> {
    images
        .iter()
        .find(|record| record.id.as_str() == id)
        .with_context(|| format!("No generated image with id {id}"))
}
