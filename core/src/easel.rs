use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_channel::Receiver;
use async_channel::Sender;
use easel_api::Credential;
use easel_client::HttpTransport;
use tokio::sync::mpsc;
use tracing::Instrument;
use tracing::debug;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::config::Config;
use crate::error::AuthFailure;
use crate::error::EaselErr;
use crate::error::ErrorKind;
use crate::error::GenerateError;
use crate::error::Result as EaselResult;
use crate::generation::GenerationOutcome;
use crate::generation::GenerationTask;
use crate::generation::Generator;
use crate::generation::prepare_generation;
use crate::history::History;
use crate::history::HistoryAction;
use crate::protocol::ApiKeyUpdatedEvent;
use crate::protocol::CanvasExportedEvent;
use crate::protocol::ErrorEvent;
use crate::protocol::Event;
use crate::protocol::EventMsg;
use crate::protocol::GenerationProgressEvent;
use crate::protocol::GenerationStartedEvent;
use crate::protocol::HistoryChangedEvent;
use crate::protocol::INITIAL_SUBMIT_ID;
use crate::protocol::ImageCommittedEvent;
use crate::protocol::ImageGeneratedEvent;
use crate::protocol::ImagesChangedEvent;
use crate::protocol::Op;
use crate::protocol::SessionConfiguredEvent;
use crate::protocol::SnapshotAppliedEvent;
use crate::protocol::Submission;
use crate::record::RecordId;
use crate::state::Action;
use crate::state::AiState;
use crate::state::SessionState;
use crate::state::reduce;
use crate::store::API_KEY_STORAGE_KEY;
use crate::store::KeyValueStore;
use crate::store::load_api_key;
use crate::store::load_images;
use crate::store::save_images;
use crate::surface::DrawingSurface;
use crate::surface::SurfaceError;
use crate::surface::decode_data_uri;

pub(crate) const SUBMISSION_CHANNEL_CAPACITY: usize = 64;

const INVALID_API_KEY_MESSAGE: &str = "Please enter a valid API key";
const NO_CANVAS_MESSAGE: &str = "Canvas is not available";

/// The high-level interface to an Easel drawing session.
/// It operates as a queue pair where you send submissions and receive events.
pub struct Easel {
    next_id: AtomicU64,
    tx_sub: Sender<Submission>,
    rx_event: Receiver<Event>,
}

impl Easel {
    /// Starts a session task. The first event is always `SessionConfigured`.
    ///
    /// `surface` is `None` when no canvas is attached yet; generation and
    /// canvas operations then fail with a precondition error.
    pub fn spawn<T>(
        config: Config,
        surface: Option<Box<dyn DrawingSurface>>,
        store: Arc<dyn KeyValueStore>,
        transport: T,
    ) -> Easel
    where
        T: HttpTransport + Clone + 'static,
    {
        let (tx_sub, rx_sub) = async_channel::bounded(SUBMISSION_CHANNEL_CAPACITY);
        let (tx_event, rx_event) = async_channel::unbounded();
        let (tx_done, rx_done) = mpsc::unbounded_channel();

        let session = Session::new(config, surface, store, transport, tx_event, tx_done);
        tokio::spawn(submission_loop(session, rx_sub, rx_done).instrument(info_span!("session_loop")));

        Easel {
            next_id: AtomicU64::new(0),
            tx_sub,
            rx_event,
        }
    }

    /// Submit the `op` wrapped in a `Submission` with a unique ID.
    pub async fn submit(&self, op: Op) -> EaselResult<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let sub = Submission { id: id.clone(), op };
        self.submit_with_id(sub).await?;
        Ok(id)
    }

    /// Use sparingly: prefer `submit()` so ids stay unique.
    pub async fn submit_with_id(&self, sub: Submission) -> EaselResult<()> {
        self.tx_sub
            .send(sub)
            .await
            .map_err(|_| EaselErr::InternalSessionDied)
    }

    pub async fn next_event(&self) -> EaselResult<Event> {
        self.rx_event
            .recv()
            .await
            .map_err(|_| EaselErr::InternalSessionDied)
    }
}

/// State owned by the session task. Nothing here is shared, so ops are
/// applied strictly in submission order.
struct Session<T: HttpTransport + Clone + 'static> {
    config: Config,
    state: SessionState,
    surface: Option<Box<dyn DrawingSurface>>,
    store: Arc<dyn KeyValueStore>,
    generator: Generator<T>,
    tx_event: Sender<Event>,
    tx_done: mpsc::UnboundedSender<GenerationOutcome>,
    /// At most one generation runs at a time.
    active: Option<GenerationTask>,
}

async fn submission_loop<T: HttpTransport + Clone + 'static>(
    mut sess: Session<T>,
    rx_sub: Receiver<Submission>,
    mut rx_done: mpsc::UnboundedReceiver<GenerationOutcome>,
) {
    sess.start().await;

    // To break out of this loop, send Op::Shutdown or drop the `Easel`.
    loop {
        tokio::select! {
            sub = rx_sub.recv() => {
                let Ok(sub) = sub else {
                    break;
                };
                debug!(id = %sub.id, "Submission");
                if !sess.handle(sub).await {
                    break;
                }
            }
            Some(outcome) = rx_done.recv() => {
                sess.on_generation_finished(outcome).await;
            }
        }
    }
    debug!("Session loop exited");
}

impl<T: HttpTransport + Clone + 'static> Session<T> {
    fn new(
        config: Config,
        surface: Option<Box<dyn DrawingSurface>>,
        store: Arc<dyn KeyValueStore>,
        transport: T,
        tx_event: Sender<Event>,
        tx_done: mpsc::UnboundedSender<GenerationOutcome>,
    ) -> Self {
        Self {
            generator: Generator::new(transport, &config),
            state: SessionState {
                history: History::with_limit(config.max_history_entries),
                ai: AiState::default(),
            },
            config,
            surface,
            store,
            tx_event,
            tx_done,
            active: None,
        }
    }

    fn apply(&mut self, action: Action) {
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    async fn send_event(&self, id: &str, msg: EventMsg) {
        let event = Event {
            id: id.to_string(),
            msg,
        };
        if let Err(e) = self.tx_event.send(event).await {
            debug!("dropping event because channel is closed: {e}");
        }
    }

    async fn send_error(&self, id: &str, message: String, kind: ErrorKind) {
        self.send_event(id, EventMsg::Error(ErrorEvent { message, kind }))
            .await;
    }

    async fn send_history_changed(&self, id: &str) {
        let history = &self.state.history;
        let msg = EventMsg::HistoryChanged(HistoryChangedEvent {
            step: history.step(),
            len: history.len(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
        });
        self.send_event(id, msg).await;
    }

    async fn send_images_changed(&self, id: &str) {
        let count = self.state.ai.images.len();
        self.send_event(id, EventMsg::ImagesChanged(ImagesChangedEvent { count }))
            .await;
    }

    async fn start(&mut self) {
        if let Some(credential) = load_api_key(self.store.as_ref())
            .as_deref()
            .and_then(Credential::parse)
        {
            self.apply(Action::SetApiKey(Some(credential)));
        }
        self.apply(Action::LoadImages(load_images(self.store.as_ref())));

        if let Err(err) = self.capture_surface() {
            warn!("failed to capture initial canvas state: {err}");
        }

        info!(
            images = self.state.ai.images.len(),
            canvas = self.surface.is_some(),
            "session started"
        );
        let msg = EventMsg::SessionConfigured(SessionConfiguredEvent {
            model: self.config.model.clone(),
            has_api_key: self.state.ai.api_key.is_some(),
            image_count: self.state.ai.images.len(),
            history_len: self.state.history.len(),
        });
        self.send_event(INITIAL_SUBMIT_ID, msg).await;
    }

    /// Returns `false` once the loop should stop.
    async fn handle(&mut self, sub: Submission) -> bool {
        let id = sub.id;
        match sub.op {
            Op::SaveState => self.save_state(&id).await,
            Op::Undo => self.move_history(&id, HistoryAction::Undo).await,
            Op::Redo => self.move_history(&id, HistoryAction::Redo).await,
            Op::ClearHistory => {
                self.apply(Action::History(HistoryAction::Clear));
                self.send_history_changed(&id).await;
            }
            Op::ClearCanvas => self.clear_canvas(&id).await,
            Op::ExportCanvas => self.export_canvas(&id).await,
            Op::SetPrompt { prompt } => self.apply(Action::SetPrompt(prompt)),
            Op::Generate { prompt } => self.generate(&id, prompt).await,
            Op::Retry => {
                let prompt = self.state.ai.prompt.clone();
                if !prompt.trim().is_empty() {
                    self.generate(&id, prompt).await;
                }
            }
            Op::Interrupt => {
                if let Some(task) = &self.active {
                    task.cancel();
                }
            }
            Op::SetApiKey { api_key } => self.set_api_key(&id, &api_key).await,
            Op::ClearApiKey => self.clear_api_key(&id).await,
            Op::CommitImage { id: record_id } => self.commit_image(&id, &record_id).await,
            Op::RemoveImage { id: record_id } => {
                self.apply(Action::RemoveImage(record_id));
                self.persist_images();
                self.send_images_changed(&id).await;
            }
            Op::ClearImages => {
                self.apply(Action::ClearImages);
                self.persist_images();
                self.send_images_changed(&id).await;
            }
            Op::Shutdown => {
                if let Some(task) = self.active.take() {
                    task.cancel();
                }
                self.send_event(&id, EventMsg::ShutdownComplete).await;
                return false;
            }
        }
        true
    }

    /// Appends the current surface state to the history. `Ok(false)` when no
    /// surface is attached.
    fn capture_surface(&mut self) -> Result<bool, SurfaceError> {
        let Some(surface) = self.surface.as_ref() else {
            return Ok(false);
        };
        let snapshot = surface.serialize()?;
        self.apply(Action::History(HistoryAction::Capture(snapshot)));
        Ok(true)
    }

    async fn save_state(&mut self, id: &str) {
        match self.capture_surface() {
            Ok(true) => self.send_history_changed(id).await,
            Ok(false) => {}
            Err(err) => {
                self.send_error(id, err.to_string(), ErrorKind::Surface)
                    .await;
            }
        }
    }

    /// Undo or redo. The cursor only moves once the surface has accepted the
    /// target snapshot.
    async fn move_history(&mut self, id: &str, action: HistoryAction) {
        let mut target = self.state.history.clone();
        let Some(snapshot) = target.apply(action.clone()) else {
            return;
        };

        let loaded = match self.surface.as_mut() {
            Some(surface) => surface.load(&snapshot),
            None => Ok(()),
        };
        if let Err(err) = loaded {
            self.send_error(id, err.to_string(), ErrorKind::Surface)
                .await;
            return;
        }
        self.apply(Action::History(action));
        let step = self.state.history.step();
        self.send_event(id, EventMsg::SnapshotApplied(SnapshotAppliedEvent { step }))
            .await;
        self.send_history_changed(id).await;
    }

    async fn clear_canvas(&mut self, id: &str) {
        let Some(surface) = self.surface.as_mut() else {
            self.send_error(id, NO_CANVAS_MESSAGE.to_string(), ErrorKind::Precondition)
                .await;
            return;
        };
        surface.clear();
        self.apply(Action::History(HistoryAction::Clear));
        if let Err(err) = self.capture_surface() {
            self.send_error(id, err.to_string(), ErrorKind::Surface)
                .await;
        }
        self.send_history_changed(id).await;
    }

    async fn export_canvas(&self, id: &str) {
        let Some(surface) = self.surface.as_ref() else {
            self.send_error(id, NO_CANVAS_MESSAGE.to_string(), ErrorKind::Precondition)
                .await;
            return;
        };
        match surface.export_data_uri() {
            Ok(data_uri) => {
                self.send_event(id, EventMsg::CanvasExported(CanvasExportedEvent { data_uri }))
                    .await;
            }
            Err(err) => {
                self.send_error(id, err.to_string(), ErrorKind::Surface)
                    .await;
            }
        }
    }

    async fn generate(&mut self, id: &str, prompt: String) {
        if self.active.is_some() {
            let err = GenerateError::Busy;
            self.send_error(id, err.to_string(), err.kind()).await;
            return;
        }

        self.apply(Action::SetPrompt(prompt));
        let api_key = match &self.state.ai.api_key {
            Some(credential) => Some(credential.expose().to_string()),
            None => load_api_key(self.store.as_ref()),
        };
        let prepared = match prepare_generation(
            &self.state.ai.prompt,
            self.surface.as_deref(),
            api_key.as_deref(),
        ) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.report_generation_error(id, err).await;
                return;
            }
        };

        self.apply(Action::GenerationStarted {
            prompt: prepared.prompt.clone(),
        });
        let msg = EventMsg::GenerationStarted(GenerationStartedEvent {
            prompt: prepared.prompt.clone(),
        });
        self.send_event(id, msg).await;

        let tx_event = self.tx_event.clone();
        let progress_id = id.to_string();
        let on_progress = move |content: &str| {
            let event = Event {
                id: progress_id.clone(),
                msg: EventMsg::GenerationProgress(GenerationProgressEvent {
                    content: content.to_string(),
                }),
            };
            let _ = tx_event.try_send(event);
        };
        self.active = Some(GenerationTask::spawn(
            self.generator.clone(),
            prepared,
            id.to_string(),
            on_progress,
            self.tx_done.clone(),
        ));
    }

    async fn on_generation_finished(&mut self, outcome: GenerationOutcome) {
        let GenerationOutcome { sub_id, result } = outcome;
        if !self
            .active
            .as_ref()
            .is_some_and(|task| task.sub_id == sub_id)
        {
            debug!(sub_id = %sub_id, "ignoring outcome of a generation that is no longer active");
            return;
        }
        self.active = None;
        self.apply(Action::GenerationFinished);

        match result {
            Ok(record) => {
                info!(id = %record.id, "generated image stored");
                self.apply(Action::AddImage(record.clone()));
                self.persist_images();
                self.send_event(&sub_id, EventMsg::ImageGenerated(ImageGeneratedEvent { record }))
                    .await;
                self.send_images_changed(&sub_id).await;
            }
            Err(err) => self.report_generation_error(&sub_id, err).await,
        }
    }

    async fn report_generation_error(&mut self, id: &str, err: GenerateError) {
        if matches!(err, GenerateError::Auth(AuthFailure::Missing)) {
            self.apply(Action::ShowApiKeyPrompt(true));
            self.send_event(id, EventMsg::ApiKeyRequired).await;
            return;
        }

        warn!("image generation failed: {err}");
        let message = err.to_string();
        self.apply(Action::SetError(message.clone()));
        self.send_error(id, message, err.kind()).await;
        if matches!(err, GenerateError::Auth(AuthFailure::InvalidFormat)) {
            self.apply(Action::ShowApiKeyPrompt(true));
            self.send_event(id, EventMsg::ApiKeyRequired).await;
        }
    }

    async fn set_api_key(&mut self, id: &str, api_key: &str) {
        let Some(credential) = Credential::parse(api_key) else {
            self.apply(Action::SetError(INVALID_API_KEY_MESSAGE.to_string()));
            self.send_error(id, INVALID_API_KEY_MESSAGE.to_string(), ErrorKind::Validation)
                .await;
            return;
        };
        if let Err(err) = self.store.set(API_KEY_STORAGE_KEY, credential.expose()) {
            warn!("failed to persist API key: {err}");
        }
        self.apply(Action::SetApiKey(Some(credential)));
        self.send_event(id, EventMsg::ApiKeyUpdated(ApiKeyUpdatedEvent { present: true }))
            .await;
    }

    async fn clear_api_key(&mut self, id: &str) {
        self.apply(Action::SetApiKey(None));
        if let Err(err) = self.store.remove(API_KEY_STORAGE_KEY) {
            warn!("failed to remove stored API key: {err}");
        }
        self.send_event(id, EventMsg::ApiKeyUpdated(ApiKeyUpdatedEvent { present: false }))
            .await;
    }

    async fn commit_image(&mut self, id: &str, record_id: &RecordId) {
        let Some(record) = self.state.ai.image(record_id).cloned() else {
            self.send_error(
                id,
                format!("No generated image with id {record_id}"),
                ErrorKind::Validation,
            )
            .await;
            return;
        };
        let scale = self.config.commit_scale;
        let Some(surface) = self.surface.as_mut() else {
            self.send_error(id, NO_CANVAS_MESSAGE.to_string(), ErrorKind::Precondition)
                .await;
            return;
        };

        let placed = decode_data_uri(&record.url)
            .and_then(|(_, bytes)| surface.add_image_centered(&bytes, scale))
            .and_then(|placement| {
                debug!(?placement, id = %record.id, "image committed to canvas");
                self.capture_surface()
            });
        match placed {
            Ok(_) => {
                self.send_history_changed(id).await;
                let msg = EventMsg::ImageCommitted(ImageCommittedEvent {
                    id: record.id.clone(),
                });
                self.send_event(id, msg).await;
            }
            Err(err) => {
                self.send_error(id, err.to_string(), ErrorKind::Surface)
                    .await;
            }
        }
    }

    fn persist_images(&self) {
        if let Err(err) = save_images(self.store.as_ref(), &self.state.ai.images) {
            warn!("failed to persist generated images: {err}");
        }
    }
}
