//! # article-imagegen
//!
//! Turn word-processor articles into illustrations with a text-to-image
//! diffusion model.
//!
//! The crate does no diffusion or language modelling itself. It reads
//! `.docx` articles, picks a few visual concepts from each (locally by
//! sentence scoring, or through a hosted LLM), expands each concept into a
//! detailed prompt, sends it to a Stable-Diffusion-WebUI-compatible server,
//! and saves every image as a PNG with a JSON sidecar describing how it was
//! made.
//!
//! ## Pipeline Overview
//!
//! ```text
//! article.docx
//!  │
//!  ├─ 1. Input     list the articles directory, or resolve a path / URL
//!  ├─ 2. Document  unzip word/document.xml → paragraphs (spawn_blocking)
//!  ├─ 3. Concepts  heuristic sentence scoring or LLM (`|`-separated list)
//!  ├─ 4. Enhance   quality / lighting / camera / style modifiers
//!  ├─ 5. Diffuse   POST /sdapi/v1/txt2img, safety clause always appended
//!  └─ 6. Artifact  {timestamp}_{slug}.png + .json sidecar
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use article_imagegen::{GenerationSettings, GeneratorConfig, Session, Style};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend at SD_WEBUI_URL or http://127.0.0.1:7860
//!     let config = GeneratorConfig::builder()
//!         .articles_dir("Articles")
//!         .max_concepts(2)
//!         .build()?;
//!     let session = Session::start(config).await?;
//!
//!     let settings = GenerationSettings {
//!         style: Style::Cinematic,
//!         ..Default::default()
//!     };
//!     let (outcomes, stats) = session.generate_all(&settings).await;
//!     for o in &outcomes {
//!         println!("{}: {} image(s)", o.article, o.images.len());
//!     }
//!     eprintln!("{} of {} articles failed", stats.failed_articles, stats.total_articles);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `article2img` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! article-imagegen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationSettings, GeneratorConfig, GeneratorConfigBuilder, SelectorKind, Style};
pub use error::{ConfigurationError, RequestError};
pub use output::{ArticleData, ArticleOutcome, ConceptImage, RunStats};
pub use pipeline::artifact::{ArtifactMetadata, ArtifactParameters, ArtifactRecord};
pub use pipeline::concepts::{ConceptSelector, HeuristicSelector};
pub use pipeline::diffusion::{
    BackendError, DiffusionBackend, GenerationRequest, ImageGenerator, Txt2ImgJob, WebUiBackend,
};
pub use pipeline::enhance::{PromptEnhancer, PromptPair};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::Session;
pub use stream::{generate_stream, OutcomeStream};
