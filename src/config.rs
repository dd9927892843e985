//! Configuration types for article-based image generation.
//!
//! Session-wide behaviour (which model, which directories, which concept
//! selector) lives in [`GeneratorConfig`], built via its
//! [`GeneratorConfigBuilder`]. Per-run sampling knobs (steps, guidance,
//! dimensions, style) live in [`GenerationSettings`] so one session can serve
//! many differently-parameterised requests.

use crate::error::ConfigurationError;
use crate::pipeline::diffusion::DiffusionBackend;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default diffusion checkpoint.
pub const DEFAULT_MODEL_ID: &str = "SG161222/Realistic_Vision_V6.0_B1_noVAE";

/// Default Stable-Diffusion-WebUI address.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:7860";

/// Negative prompt used when a manual request supplies none.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "cartoon, 3d, disfigured, bad art, deformed, poorly drawn, extra limbs, close up, b&w, weird colors, blurry";

/// Image edge lengths the presentation layer offers.
pub const ALLOWED_DIMENSIONS: [u32; 4] = [256, 512, 768, 1024];

/// Upper bound on images per generation call.
pub const MAX_IMAGES: u32 = 4;

/// Session configuration.
///
/// Built via [`GeneratorConfig::builder()`] or [`GeneratorConfig::default()`].
///
/// # Example
/// ```rust
/// use article_imagegen::{GeneratorConfig, SelectorKind};
///
/// let config = GeneratorConfig::builder()
///     .articles_dir("Articles")
///     .max_concepts(2)
///     .selector(SelectorKind::Heuristic)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concepts, 2);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Diffusion checkpoint identifier, loaded once at session start.
    pub model_id: String,

    /// Base URL of the diffusion backend.
    pub backend_url: String,

    /// Pre-constructed diffusion backend. Takes precedence over `backend_url`.
    pub backend: Option<Arc<dyn DiffusionBackend>>,

    /// HTTP timeout for backend calls in seconds. Default: 600.
    ///
    /// A 100-step 1024×1024 batch of four can take minutes on a consumer GPU.
    pub backend_timeout_secs: u64,

    /// Negative prompt applied to manual requests that do not bring their own.
    pub default_negative_prompt: String,

    /// Directory scanned for `.docx` articles.
    pub articles_dir: PathBuf,

    /// Directory receiving PNG + JSON artifacts.
    pub output_dir: PathBuf,

    /// Directory for downloaded documents and other cached inputs.
    pub cache_dir: PathBuf,

    /// Concepts extracted per article. Range 1–5. Default: 3.
    pub max_concepts: usize,

    /// Cleaned article text shorter than this is rejected. Default: 100.
    pub min_text_length: usize,

    /// Which concept selector the session uses.
    pub selector: SelectorKind,

    /// LLM model identifier for the remote selector.
    pub llm_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub llm_provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `llm_provider_name`.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for concept extraction. Default: 0.7.
    pub llm_temperature: f32,

    /// Maximum tokens the LLM may return. Default: 500.
    pub llm_max_tokens: usize,

    /// Characters of article text embedded in the LLM prompt. Default: 4000.
    pub llm_text_budget: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend: None,
            backend_timeout_secs: 600,
            default_negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            articles_dir: PathBuf::from("Articles"),
            output_dir: PathBuf::from("generated_images"),
            cache_dir: PathBuf::from(".cache/models"),
            max_concepts: 3,
            min_text_length: 100,
            selector: SelectorKind::default(),
            llm_model: None,
            llm_provider_name: None,
            llm_provider: None,
            llm_temperature: 0.7,
            llm_max_tokens: 500,
            llm_text_budget: 4000,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("model_id", &self.model_id)
            .field("backend_url", &self.backend_url)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn DiffusionBackend>"))
            .field("articles_dir", &self.articles_dir)
            .field("output_dir", &self.output_dir)
            .field("cache_dir", &self.cache_dir)
            .field("max_concepts", &self.max_concepts)
            .field("min_text_length", &self.min_text_length)
            .field("selector", &self.selector)
            .field("llm_model", &self.llm_model)
            .field("llm_provider_name", &self.llm_provider_name)
            .field("llm_provider", &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.config.model_id = id.into();
        self
    }

    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend_url = url.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn DiffusionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn backend_timeout_secs(mut self, secs: u64) -> Self {
        self.config.backend_timeout_secs = secs.max(1);
        self
    }

    pub fn default_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.config.default_negative_prompt = negative.into();
        self
    }

    pub fn articles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.articles_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn max_concepts(mut self, n: usize) -> Self {
        self.config.max_concepts = n.clamp(1, 5);
        self
    }

    pub fn min_text_length(mut self, n: usize) -> Self {
        self.config.min_text_length = n;
        self
    }

    pub fn selector(mut self, kind: SelectorKind) -> Self {
        self.config.selector = kind;
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = Some(model.into());
        self
    }

    pub fn llm_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.llm_provider_name = Some(name.into());
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    pub fn llm_temperature(mut self, t: f32) -> Self {
        self.config.llm_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn llm_max_tokens(mut self, n: usize) -> Self {
        self.config.llm_max_tokens = n;
        self
    }

    pub fn llm_text_budget(mut self, chars: usize) -> Self {
        self.config.llm_text_budget = chars;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, ConfigurationError> {
        let c = &self.config;
        if c.model_id.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfig(
                "Model id must not be empty".into(),
            ));
        }
        if c.backend.is_none() && !is_http_url(&c.backend_url) {
            return Err(ConfigurationError::InvalidConfig(format!(
                "Backend URL must start with http:// or https://, got '{}'",
                c.backend_url
            )));
        }
        if c.llm_text_budget == 0 {
            return Err(ConfigurationError::InvalidConfig(
                "LLM text budget must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which concept selector a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectorKind {
    /// Local sentence scoring. Deterministic, no network. (default)
    #[default]
    Heuristic,
    /// Hosted chat-completion model phrasing photographic scene descriptions.
    Llm,
}

/// Visual style appended to enhanced prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Photorealistic,
    Artistic,
    Cinematic,
}

impl Style {
    /// The tag recorded in prompts and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Photorealistic => "photorealistic",
            Style::Artistic => "artistic",
            Style::Cinematic => "cinematic",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Denoising steps. Presentation range: 10–100. Default: 40.
    pub steps: u32,
    /// Classifier-free guidance scale. Presentation range: 1–20. Default: 5.0.
    pub guidance_scale: f32,
    /// Image height, one of [`ALLOWED_DIMENSIONS`]. Default: 768.
    pub height: u32,
    /// Image width, one of [`ALLOWED_DIMENSIONS`]. Default: 512.
    pub width: u32,
    /// Images per manual request, 1–4. Article runs always use one per concept.
    pub num_images: u32,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
    /// Style applied by the prompt enhancer and recorded in metadata.
    pub style: Style,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            steps: 40,
            guidance_scale: 5.0,
            height: 768,
            width: 512,
            num_images: 1,
            seed: None,
            style: Style::default(),
        }
    }
}
