use crate::{
    api::ImageApi,
    config::ClientConfig,
    error::{Result, SdError, ValidationError},
    logger,
    models::{
        FieldUpdate, GenerationForm, GenerationRequest, GenerationResponse, GenerationResult,
        ImageDimension, EXAMPLE_PROMPTS, MAX_SEED,
    },
    workflow::state::GenerationState,
};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const INTERRUPTED_MESSAGE: &str = "generation was interrupted";

/// Drives one generation session at a time: form edits, the submit call, and its outcome.
///
/// Only one generate call can be outstanding. `submit` holds `&mut self` across the
/// call, and `begin` refuses to start while a request is in flight. A displayed result
/// or error survives form edits until the next submission or `reset`.
pub struct GenerationController {
    api: Arc<dyn ImageApi>,
    config: ClientConfig,
    form: GenerationForm,
    state: GenerationState,
}

impl GenerationController {
    pub fn new(api: Arc<dyn ImageApi>, config: ClientConfig) -> Self {
        Self {
            api,
            config,
            form: GenerationForm::default(),
            state: GenerationState::Idle,
        }
    }

    pub fn form(&self) -> &GenerationForm {
        &self.form
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state.is_in_flight() {
            Err(SdError::Busy)
        } else {
            Ok(())
        }
    }

    pub fn update_field(&mut self, update: FieldUpdate) -> Result<()> {
        self.ensure_idle()?;
        self.form.apply(update)?;
        Ok(())
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        self.update_field(FieldUpdate::Prompt(prompt.into()))
    }

    pub fn set_negative_prompt(&mut self, negative: impl Into<String>) -> Result<()> {
        self.update_field(FieldUpdate::NegativePrompt(negative.into()))
    }

    pub fn set_steps(&mut self, steps: u32) -> Result<()> {
        self.update_field(FieldUpdate::Steps(steps))
    }

    pub fn set_guidance_scale(&mut self, scale: f32) -> Result<()> {
        self.update_field(FieldUpdate::GuidanceScale(scale))
    }

    pub fn set_width(&mut self, width: ImageDimension) -> Result<()> {
        self.update_field(FieldUpdate::Width(width))
    }

    pub fn set_height(&mut self, height: ImageDimension) -> Result<()> {
        self.update_field(FieldUpdate::Height(height))
    }

    pub fn set_seed(&mut self, seed: impl Into<String>) -> Result<()> {
        self.update_field(FieldUpdate::Seed(seed.into()))
    }

    pub fn use_example_prompt(&mut self, index: usize) -> Result<()> {
        let prompt = EXAMPLE_PROMPTS
            .get(index)
            .ok_or(ValidationError::UnknownExample(index))?;
        self.set_prompt(*prompt)
    }

    /// Pick a seed uniformly from `[0, 2147483647]` and store it in the form.
    pub fn randomize_seed(&mut self) -> Result<u64> {
        self.ensure_idle()?;
        let seed = rand::thread_rng().gen_range(0..=MAX_SEED);
        self.form.apply(FieldUpdate::Seed(seed.to_string()))?;
        log::debug!("🎲 Random seed: {}", seed);
        Ok(seed)
    }

    /// Whether the generate action should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.state.is_in_flight() && self.form.validate().is_ok()
    }

    /// Validate the form and enter `InFlight`. Rejections leave the state untouched.
    pub fn begin(&mut self) -> Result<GenerationRequest> {
        self.ensure_idle()?;
        let request = self.form.to_request().map_err(|e| {
            log::debug!("Submission rejected: {}", e);
            e
        })?;

        log::info!(
            "🎨 Generating {}x{} image, {} steps, guidance {}",
            request.width.pixels(),
            request.height.pixels(),
            request.num_inference_steps,
            request.guidance_scale
        );
        self.state = GenerationState::InFlight(request.clone());
        Ok(request)
    }

    /// Resolve the in-flight call with its outcome.
    pub fn complete(&mut self, outcome: Result<GenerationResponse>) -> Result<&GenerationState> {
        let request = match std::mem::take(&mut self.state) {
            GenerationState::InFlight(request) => request,
            other => {
                self.state = other;
                return Err(SdError::InvalidState(
                    "no generation request is in flight".into(),
                ));
            }
        };

        let outcome = outcome.and_then(|response| {
            let image_url = self.config.resolve_image_url(&response.image_url)?;
            Ok(GenerationResult {
                image_url,
                generation_params: response.generation_params,
            })
        });

        self.state = match outcome {
            Ok(result) => {
                log::info!("✅ Image ready: {}", result.image_url);
                GenerationState::Succeeded { request, result }
            }
            Err(e) => {
                let message = e.user_message();
                log::error!("❌ Generation failed: {}", message);
                GenerationState::Failed { request, message }
            }
        };
        Ok(&self.state)
    }

    /// Run one full generation attempt.
    ///
    /// Returns `Err` only when the submission is rejected (empty prompt, bad seed,
    /// already in flight). A failed backend call is reported as `GenerationState::Failed`.
    ///
    /// If the returned future is dropped before the call resolves, the attempt ends
    /// as `Failed` with [`INTERRUPTED_MESSAGE`] instead of staying `InFlight`.
    pub async fn submit(&mut self) -> Result<&GenerationState> {
        let request = self.begin()?;
        let api = Arc::clone(&self.api);
        let guard = InFlightGuard {
            controller: Some(self),
        };

        let outcome = {
            let _timer = logger::timer("image generation");
            api.generate(&request).await
        };
        guard.finish(outcome)
    }

    /// End an in-flight attempt whose call will never be completed.
    fn interrupt(&mut self) {
        let request = match &self.state {
            GenerationState::InFlight(request) => request.clone(),
            _ => return,
        };
        log::warn!("⚠️  Generation dropped before completion");
        self.state = GenerationState::Failed {
            request,
            message: INTERRUPTED_MESSAGE.to_string(),
        };
    }

    /// Drop any result or error and return to `Idle`. Form fields are kept.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.state = GenerationState::Idle;
        Ok(())
    }

    /// Restore every form field to its default.
    pub fn reset_form(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.form = GenerationForm::default();
        Ok(())
    }

    /// Save the generated image into `dir` as `sd-image-<millis>.png`.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf> {
        let result = self.state.result().ok_or_else(|| {
            SdError::InvalidState(format!(
                "nothing to download while {}",
                self.state.name()
            ))
        })?;

        let bytes = self.api.fetch_image(&result.image_url).await?;
        let filename = GenerationResult::download_filename(chrono::Utc::now().timestamp_millis());
        let path = dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;

        log::info!("💾 Image saved to: {}", path.display());
        Ok(path)
    }
}

/// Marks the attempt interrupted unless `finish` runs.
struct InFlightGuard<'a> {
    controller: Option<&'a mut GenerationController>,
}

impl<'a> InFlightGuard<'a> {
    fn finish(mut self, outcome: Result<GenerationResponse>) -> Result<&'a GenerationState> {
        match self.controller.take() {
            Some(controller) => controller.complete(outcome),
            None => Err(SdError::InvalidState(
                "no generation request is in flight".into(),
            )),
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.interrupt();
        }
    }
}
