//! Image generation client: prompt → images via an external diffusion server.
//!
//! ## Layers
//!
//! * [`DiffusionBackend`] — transport seam. One model load, one `txt2img`
//!   call. [`WebUiBackend`] speaks the Stable-Diffusion-WebUI `sdapi/v1`
//!   protocol; tests plug in an in-process fake.
//! * [`ImageGenerator`] — the policy layer every caller goes through. It
//!   loads the model once, appends the safety clause to the negative prompt,
//!   and turns every backend failure or short batch into
//!   [`RequestError::GenerationFailed`]. It never retries and never returns
//!   a placeholder image.

use crate::config::{GenerationSettings, GeneratorConfig, MAX_IMAGES};
use crate::error::{ConfigurationError, RequestError};
use crate::pipeline::encode::decode_image;
use crate::prompts::SAFETY_NEGATIVE_PROMPT;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sampler requested from the backend.
pub const SAMPLER_NAME: &str = "DPM++ 2M";

/// A single prompt-to-image request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// `None` means "use the configured default negative prompt".
    pub negative_prompt: Option<String>,
    pub steps: u32,
    pub guidance_scale: f32,
    pub height: u32,
    pub width: u32,
    pub num_images: u32,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    /// Request for `prompt` using the sampling knobs of `settings`.
    pub fn from_settings(
        prompt: impl Into<String>,
        negative_prompt: Option<String>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt,
            steps: settings.steps,
            guidance_scale: settings.guidance_scale,
            height: settings.height,
            width: settings.width,
            num_images: settings.num_images,
            seed: settings.seed,
        }
    }
}

/// The payload a backend receives, negative prompt already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgJob {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub n_iter: u32,
    /// `-1` asks the backend for a random seed.
    pub seed: i64,
    pub sampler_name: String,
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, timeout.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// A text-to-image server.
#[async_trait]
pub trait DiffusionBackend: Send + Sync {
    /// Make `model_id` the active checkpoint.
    async fn load_model(&self, model_id: &str) -> Result<(), BackendError>;

    /// Run one batch and return the images in order.
    async fn txt2img(&self, job: &Txt2ImgJob) -> Result<Vec<DynamicImage>, BackendError>;
}

// ── Stable-Diffusion-WebUI over HTTP ─────────────────────────────────────

/// [`DiffusionBackend`] for an AUTOMATIC1111-compatible `sdapi/v1` server.
#[derive(Debug, Clone)]
pub struct WebUiBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl WebUiBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigurationError::BackendUnavailable {
                url: base_url.to_string(),
                detail: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl DiffusionBackend for WebUiBackend {
    async fn load_model(&self, model_id: &str) -> Result<(), BackendError> {
        let body = serde_json::json!({ "sd_model_checkpoint": model_id });
        self.post_json("/sdapi/v1/options", &body).await?;
        Ok(())
    }

    async fn txt2img(&self, job: &Txt2ImgJob) -> Result<Vec<DynamicImage>, BackendError> {
        let response = self.post_json("/sdapi/v1/txt2img", job).await?;
        let parsed: Txt2ImgResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        // Base64 PNG decoding is CPU work; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            parsed
                .images
                .iter()
                .map(|b64| decode_image(b64).map_err(BackendError::Malformed))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| BackendError::Malformed(format!("decode task panicked: {e}")))?
    }
}

// ── Policy layer ─────────────────────────────────────────────────────────

/// Model-loaded generation client.
#[derive(Clone)]
pub struct ImageGenerator {
    backend: Arc<dyn DiffusionBackend>,
    model_id: String,
    default_negative_prompt: String,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl ImageGenerator {
    /// Build the backend named by `config` and load the configured model.
    ///
    /// Fails fast: an unreachable server is
    /// [`ConfigurationError::BackendUnavailable`], a refused checkpoint is
    /// [`ConfigurationError::ModelLoadFailed`].
    pub async fn load(config: &GeneratorConfig) -> Result<Self, ConfigurationError> {
        let backend: Arc<dyn DiffusionBackend> = match config.backend {
            Some(ref backend) => Arc::clone(backend),
            None => Arc::new(WebUiBackend::new(
                &config.backend_url,
                config.backend_timeout_secs,
            )?),
        };

        let start = Instant::now();
        info!("Loading diffusion model '{}'", config.model_id);
        backend
            .load_model(&config.model_id)
            .await
            .map_err(|e| match e {
                BackendError::Unreachable(detail) => ConfigurationError::BackendUnavailable {
                    url: config.backend_url.clone(),
                    detail,
                },
                other => ConfigurationError::ModelLoadFailed {
                    model_id: config.model_id.clone(),
                    detail: other.to_string(),
                },
            })?;
        info!("Model loaded in {:?}", start.elapsed());

        Ok(Self {
            backend,
            model_id: config.model_id.clone(),
            default_negative_prompt: config.default_negative_prompt.clone(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The negative prompt actually sent: the supplied one (or the default),
    /// then the safety clause unless it is already present verbatim.
    pub fn effective_negative_prompt(&self, supplied: Option<&str>) -> String {
        let base = supplied
            .unwrap_or(self.default_negative_prompt.as_str())
            .trim();
        if base.contains(SAFETY_NEGATIVE_PROMPT) {
            base.to_string()
        } else if base.is_empty() {
            SAFETY_NEGATIVE_PROMPT.to_string()
        } else {
            format!("{base}, {SAFETY_NEGATIVE_PROMPT}")
        }
    }

    fn job_for(&self, request: &GenerationRequest) -> Txt2ImgJob {
        Txt2ImgJob {
            prompt: request.prompt.clone(),
            negative_prompt: self.effective_negative_prompt(request.negative_prompt.as_deref()),
            steps: request.steps,
            cfg_scale: request.guidance_scale,
            width: request.width,
            height: request.height,
            batch_size: request.num_images,
            n_iter: 1,
            // The WebUI seed is signed; fold the top bit away.
            seed: request.seed.map_or(-1, |s| (s & i64::MAX as u64) as i64),
            sampler_name: SAMPLER_NAME.to_string(),
        }
    }

    /// Generate exactly `request.num_images` images.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<DynamicImage>, RequestError> {
        if request.prompt.trim().is_empty() {
            return Err(RequestError::InvalidRequest("prompt must not be empty".into()));
        }
        if request.num_images == 0 || request.num_images > MAX_IMAGES {
            return Err(RequestError::InvalidRequest(format!(
                "num_images must be between 1 and {MAX_IMAGES}, got {}",
                request.num_images
            )));
        }

        let job = self.job_for(request);
        let start = Instant::now();
        debug!(
            "txt2img: {}×{}, {} steps, cfg {}, batch {}",
            job.width, job.height, job.steps, job.cfg_scale, job.batch_size
        );

        let images = self.backend.txt2img(&job).await.map_err(|e| {
            warn!("Generation failed: {}", e);
            RequestError::GenerationFailed {
                detail: e.to_string(),
            }
        })?;

        if images.len() != request.num_images as usize {
            return Err(RequestError::GenerationFailed {
                detail: format!(
                    "backend returned {} image(s), expected {}",
                    images.len(),
                    request.num_images
                ),
            });
        }

        info!("Generated {} image(s) in {:?}", images.len(), start.elapsed());
        Ok(images)
    }
}
