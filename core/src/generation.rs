//! Turning a prompt plus the current canvas into a generated image.

use crate::config::Config;
use crate::error::AuthFailure;
use crate::error::GenerateError;
use crate::record::GeneratedImageRecord;
use crate::surface::DrawingSurface;
use easel_api::Credential;
use easel_api::DoneSentinel;
use easel_api::ImageClient;
use easel_api::ImageRequestBuilder;
use easel_api::Provider;
use easel_api::download_as_data_uri;
use easel_client::HttpTransport;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;
use tracing::debug;
use tracing::info_span;
use tracing::trace;

pub const MAX_PROMPT_CHARS: usize = 500;

/// Inputs that passed validation, ready to send.
#[derive(Debug, Clone)]
pub struct PreparedGeneration {
    pub prompt: String,
    pub canvas_data_uri: String,
    pub credential: Credential,
}

/// Validates the inputs of a generation and captures the canvas.
///
/// Checks run in this order: prompt, surface, credential presence,
/// credential format.
pub fn prepare_generation(
    prompt: &str,
    surface: Option<&dyn DrawingSurface>,
    api_key: Option<&str>,
) -> Result<PreparedGeneration, GenerateError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(GenerateError::Validation(
            "Please enter a prompt for image generation".to_string(),
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(GenerateError::Validation(format!(
            "Prompt must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }

    let Some(surface) = surface else {
        return Err(GenerateError::Precondition(
            "Canvas is not available".to_string(),
        ));
    };

    let api_key = api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or(GenerateError::Auth(AuthFailure::Missing))?;
    let credential =
        Credential::parse(api_key).ok_or(GenerateError::Auth(AuthFailure::InvalidFormat))?;

    Ok(PreparedGeneration {
        prompt: prompt.to_string(),
        canvas_data_uri: surface.export_data_uri()?,
        credential,
    })
}

/// Sends generation requests for one provider configuration.
#[derive(Clone)]
pub struct Generator<T: HttpTransport + Clone> {
    transport: T,
    provider: Provider,
    model: String,
    instructions: String,
    done: DoneSentinel,
}

impl<T: HttpTransport + Clone> Generator<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            provider: config.provider(),
            model: config.model.clone(),
            instructions: config.instructions.clone(),
            done: config.done_sentinel,
        }
    }

    /// Validates the inputs, then generates. See [`prepare_generation`] and
    /// [`Generator::run`].
    pub async fn generate<F>(
        &self,
        prompt: &str,
        surface: Option<&dyn DrawingSurface>,
        api_key: Option<&str>,
        on_progress: F,
    ) -> Result<GeneratedImageRecord, GenerateError>
    where
        F: FnMut(&str),
    {
        let prepared = prepare_generation(prompt, surface, api_key)?;
        self.run(prepared, on_progress).await
    }

    /// Streams one generation and returns its record. Remote results are
    /// downloaded so the record always holds an inline image.
    pub async fn run<F>(
        &self,
        prepared: PreparedGeneration,
        on_progress: F,
    ) -> Result<GeneratedImageRecord, GenerateError>
    where
        F: FnMut(&str),
    {
        let PreparedGeneration {
            prompt,
            canvas_data_uri,
            credential,
        } = prepared;

        let request =
            ImageRequestBuilder::new(&self.model, &self.instructions, &prompt, &canvas_data_uri)
                .build()?;
        let client = ImageClient::new(self.transport.clone(), self.provider.clone(), credential)
            .with_done_sentinel(self.done);

        let image = client
            .stream_request(&request)
            .await?
            .final_image(on_progress)
            .await?;
        debug!(%image, inline = image.is_inline(), "image generated");

        let image =
            download_as_data_uri(&self.transport, &image, self.provider.request_timeout).await?;
        Ok(GeneratedImageRecord::new(
            image.into_string(),
            &prompt,
            canvas_data_uri,
        ))
    }
}

/// Result of a spawned generation, delivered back to the session loop.
#[derive(Debug)]
pub(crate) struct GenerationOutcome {
    pub(crate) sub_id: String,
    pub(crate) result: Result<GeneratedImageRecord, GenerateError>,
}

/// Handle on a running generation. Dropping it aborts the task.
pub(crate) struct GenerationTask {
    pub(crate) sub_id: String,
    cancellation_token: CancellationToken,
    _handle: AbortOnDropHandle<()>,
}

impl GenerationTask {
    /// Starts `prepared` on its own task. Exactly one [`GenerationOutcome`]
    /// is sent on `tx_done`, whether the run succeeds, fails, is cancelled
    /// or panics.
    pub(crate) fn spawn<T, P>(
        generator: Generator<T>,
        prepared: PreparedGeneration,
        sub_id: String,
        mut on_progress: P,
        tx_done: mpsc::UnboundedSender<GenerationOutcome>,
    ) -> Self
    where
        T: HttpTransport + Clone + 'static,
        P: FnMut(&str) + Send + 'static,
    {
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.child_token();
        let run = tokio::spawn(
            async move {
                tokio::select! {
                    _ = token.cancelled() => Err(GenerateError::Cancelled),
                    result = generator.run(prepared, &mut on_progress) => result,
                }
            }
            .instrument(info_span!("generation", sub_id = %sub_id)),
        );
        let run = AbortOnDropHandle::new(run);

        let outcome_sub_id = sub_id.clone();
        let handle = tokio::spawn(async move {
            let result = match run.await {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => Err(GenerateError::Cancelled),
                Err(err) => Err(GenerateError::Internal(format!(
                    "image generation task failed: {err}"
                ))),
            };
            trace!(sub_id = %outcome_sub_id, ok = result.is_ok(), "generation finished");
            let _ = tx_done.send(GenerationOutcome {
                sub_id: outcome_sub_id,
                result,
            });
        });

        Self {
            sub_id,
            cancellation_token,
            _handle: AbortOnDropHandle::new(handle),
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancellation_token.cancel();
    }
}
