//! The long-lived orchestration handle.
//!
//! A [`Session`] is built once at startup. Building it is where every fatal
//! problem surfaces: unreachable backend, model that will not load, missing
//! LLM credentials. After that each method is one independent request whose
//! failures come back as [`RequestError`] values, so a batch keeps going.
//!
//! ```text
//! article.docx ─► read ─► clean ─► select concepts ─► enhance ─► txt2img ─► PNG + JSON
//! ```

use crate::config::{GenerationSettings, GeneratorConfig, SelectorKind};
use crate::error::{ConfigurationError, RequestError};
use crate::output::{ArticleData, ArticleOutcome, ConceptImage, RunStats};
use crate::pipeline::artifact::{ArtifactParameters, ArtifactRecord, ArtifactWriter};
use crate::pipeline::concepts::{ConceptSelector, HeuristicSelector};
use crate::pipeline::diffusion::{GenerationRequest, ImageGenerator};
use crate::pipeline::document::{clean_text, read_document};
use crate::pipeline::enhance::{PromptEnhancer, PromptPair};
use crate::pipeline::input;
use crate::pipeline::llm::LlmSelector;
use crate::progress::{GenerationProgressCallback, NoopProgressCallback};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Characters of cleaned text kept in [`ArticleData::preview`].
pub const PREVIEW_CHARS: usize = 500;

/// Generator, concept selector and prompt enhancer for one process lifetime.
pub struct Session {
    config: GeneratorConfig,
    generator: ImageGenerator,
    selector: Arc<dyn ConceptSelector>,
    enhancer: PromptEnhancer,
    writer: ArtifactWriter,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model_id", &self.generator.model_id())
            .field("selector", &self.selector.name())
            .field("output_dir", &self.config.output_dir)
            .finish()
    }
}

impl Session {
    /// Load the diffusion model and build the configured concept selector.
    pub async fn start(config: GeneratorConfig) -> Result<Self, ConfigurationError> {
        // Selector first: a missing API key must not wait for the model load.
        let selector: Arc<dyn ConceptSelector> = match config.selector {
            SelectorKind::Heuristic => Arc::new(HeuristicSelector),
            SelectorKind::Llm => Arc::new(LlmSelector::from_config(&config)?),
        };
        Self::start_with_selector(config, selector).await
    }

    /// Like [`start`](Self::start) with a caller-supplied selector.
    pub async fn start_with_selector(
        config: GeneratorConfig,
        selector: Arc<dyn ConceptSelector>,
    ) -> Result<Self, ConfigurationError> {
        let generator = ImageGenerator::load(&config).await?;
        let writer = ArtifactWriter::new(generator.model_id());
        info!(
            "Session ready: model '{}', {} selector",
            generator.model_id(),
            selector.name()
        );
        Ok(Self {
            config,
            generator,
            selector,
            enhancer: PromptEnhancer,
            writer,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generator(&self) -> &ImageGenerator {
        &self.generator
    }

    /// Articles in the configured articles directory.
    pub fn list_articles(&self) -> Vec<PathBuf> {
        input::list_articles(&self.config.articles_dir)
    }

    fn progress(&self) -> &dyn GenerationProgressCallback {
        match self.config.progress_callback {
            Some(ref cb) => cb.as_ref(),
            None => &NoopProgressCallback,
        }
    }

    /// Seeded runs get reproducible prompts as well as reproducible pixels.
    fn prompt_rng(settings: &GenerationSettings) -> StdRng {
        match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    // ── Article flow ─────────────────────────────────────────────────────

    /// Read, clean and mine one article. Failures land in
    /// [`ArticleData::error`].
    pub async fn process_article(&self, path: &Path, max_concepts: usize) -> ArticleData {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let filepath = path.to_path_buf();

        if let Err(e) = input::resolve_local(path) {
            warn!("Failed to read article '{}': {}", filename, e);
            return ArticleData::failed(filename, filepath, e);
        }

        let document = match read_document(path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to read article '{}': {}", filename, e);
                return ArticleData::failed(filename, filepath, e);
            }
        };
        if document.is_empty() {
            let err = RequestError::EmptyDocument {
                name: filename.clone(),
            };
            return ArticleData::failed(filename, filepath, err);
        }

        let full_text = clean_text(&document.text());
        let len = full_text.chars().count();
        if len < self.config.min_text_length {
            let err = RequestError::DocumentTooShort {
                name: filename.clone(),
                len,
                min: self.config.min_text_length,
            };
            return ArticleData::failed(filename, filepath, err);
        }
        let preview: String = full_text.chars().take(PREVIEW_CHARS).collect();

        let (concepts, error) = match self.selector.extract(&full_text, max_concepts).await {
            Ok(concepts) => (concepts, None),
            Err(e) => {
                warn!("Concept selection failed for '{}': {}", filename, e);
                (Vec::new(), Some(e))
            }
        };
        info!("Processed: {} - found {} concept(s)", filename, concepts.len());

        ArticleData {
            filename,
            filepath,
            preview,
            full_text,
            concepts,
            error,
        }
    }

    /// Process an article and show the prompts it would produce.
    pub async fn preview(
        &self,
        path: &Path,
        max_concepts: usize,
        settings: &GenerationSettings,
    ) -> (ArticleData, Vec<PromptPair>) {
        let data = self.process_article(path, max_concepts).await;
        let mut rng = Self::prompt_rng(settings);
        let prompts = self
            .enhancer
            .create_prompts(&data.concepts, settings.style.as_str(), &mut rng);
        (data, prompts)
    }

    /// Render one image per prompt pair and save each under `article_name`.
    ///
    /// Stops at the first failure; images saved before it stay on disk.
    pub async fn generate_from_concepts(
        &self,
        prompts: &[PromptPair],
        article_name: &str,
        settings: &GenerationSettings,
    ) -> Result<Vec<ConceptImage>, RequestError> {
        let mut images = Vec::with_capacity(prompts.len());
        self.render_concepts(prompts, article_name, settings, &mut images)
            .await?;
        Ok(images)
    }

    async fn render_concepts(
        &self,
        prompts: &[PromptPair],
        article_name: &str,
        settings: &GenerationSettings,
        images: &mut Vec<ConceptImage>,
    ) -> Result<(), RequestError> {
        let single = GenerationSettings {
            num_images: 1,
            ..settings.clone()
        };

        for (index, pair) in prompts.iter().enumerate() {
            debug!(
                "Concept {}/{} from '{}'",
                index + 1,
                prompts.len(),
                article_name
            );
            let request =
                GenerationRequest::from_settings(&pair.positive, Some(pair.negative.clone()), &single);
            let image = self
                .generator
                .generate(&request)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| RequestError::GenerationFailed {
                    detail: "backend returned no image".into(),
                })?;

            let parameters = ArtifactParameters {
                steps: single.steps,
                cfg_scale: single.guidance_scale,
                height: single.height,
                width: single.width,
                seed: single.seed,
                style: Some(pair.style.clone()),
                concept: Some(pair.concept.clone()),
            };
            let record = self
                .writer
                .save(
                    image,
                    &pair.positive,
                    parameters,
                    &self.config.output_dir,
                    Some(article_name),
                )
                .await?;

            self.progress()
                .on_image_saved(article_name, index, &record.image_path);
            images.push(ConceptImage {
                concept_index: index,
                concept: pair.concept.clone(),
                prompt: pair.positive.clone(),
                image_path: record.image_path,
                metadata_path: record.metadata_path,
            });
        }
        Ok(())
    }

    /// Full flow for one article: concepts → prompts → one image each.
    pub async fn generate_article(&self, path: &Path, settings: &GenerationSettings) -> ArticleOutcome {
        let start = Instant::now();
        let data = self.process_article(path, self.config.max_concepts).await;
        let article = data.stem().to_string();

        let mut outcome = ArticleOutcome {
            article,
            concepts: data.concepts.clone(),
            images: Vec::new(),
            error: data.error.clone(),
            duration_ms: 0,
        };

        if outcome.error.is_none() && data.concepts.is_empty() {
            outcome.error = Some(RequestError::NoConcepts {
                context: format!("no sentence in '{}' qualified as a concept", data.filename),
            });
        }

        if outcome.error.is_none() {
            self.progress()
                .on_concepts_ready(&outcome.article, &outcome.concepts);
            let mut rng = Self::prompt_rng(settings);
            let prompts = self
                .enhancer
                .create_prompts(&data.concepts, settings.style.as_str(), &mut rng);

            if let Err(e) = self
                .render_concepts(&prompts, &outcome.article, settings, &mut outcome.images)
                .await
            {
                warn!("Generation failed for '{}': {}", outcome.article, e);
                outcome.error = Some(e);
            }
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }

    /// Every article in the articles directory, one after another.
    pub async fn generate_all(&self, settings: &GenerationSettings) -> (Vec<ArticleOutcome>, RunStats) {
        let articles = self.list_articles();
        self.generate_articles(&articles, settings).await
    }

    /// Like [`generate_all`](Self::generate_all) over an explicit list.
    pub async fn generate_articles(
        &self,
        articles: &[PathBuf],
        settings: &GenerationSettings,
    ) -> (Vec<ArticleOutcome>, RunStats) {
        let start = Instant::now();
        let total = articles.len();
        let progress = self.progress();
        progress.on_run_start(total);
        info!("Generating images for {} article(s)", total);

        let mut outcomes = Vec::with_capacity(total);
        for (i, path) in articles.iter().enumerate() {
            let outcome = self.generate_article_indexed(path, i + 1, total, settings).await;
            outcomes.push(outcome);
        }

        let stats = RunStats::from_outcomes(&outcomes, start.elapsed().as_millis() as u64);
        progress.on_run_complete(stats.total_articles, stats.images_saved);
        info!(
            "Run complete: {}/{} article(s), {} image(s), {}ms",
            stats.succeeded_articles, stats.total_articles, stats.images_saved, stats.total_duration_ms
        );
        (outcomes, stats)
    }

    /// One article inside a run, with start/error progress events.
    pub(crate) async fn generate_article_indexed(
        &self,
        path: &Path,
        index: usize,
        total: usize,
        settings: &GenerationSettings,
    ) -> ArticleOutcome {
        let name = article_stem(path);
        let progress = self.progress();
        progress.on_article_start(index, total, &name);
        let outcome = self.generate_article(path, settings).await;
        if let Some(ref e) = outcome.error {
            progress.on_article_error(index, total, &outcome.article, &e.to_string());
        }
        outcome
    }

    // ── Manual flow ──────────────────────────────────────────────────────

    /// Render `prompt` as given and save one artifact per image.
    ///
    /// `negative` of `None` uses the configured default negative prompt.
    pub async fn generate_manual(
        &self,
        prompt: &str,
        negative: Option<&str>,
        settings: &GenerationSettings,
    ) -> Result<Vec<ArtifactRecord>, RequestError> {
        let request = GenerationRequest::from_settings(prompt, negative.map(str::to_string), settings);
        let images = self.generator.generate(&request).await?;

        let mut records = Vec::with_capacity(images.len());
        for image in images {
            let parameters = ArtifactParameters {
                steps: settings.steps,
                cfg_scale: settings.guidance_scale,
                height: settings.height,
                width: settings.width,
                seed: settings.seed,
                style: Some(settings.style.as_str().to_string()),
                concept: None,
            };
            let record = self
                .writer
                .save(image, prompt, parameters, &self.config.output_dir, None)
                .await?;
            records.push(record);
        }
        info!("Saved {} manual image(s)", records.len());
        Ok(records)
    }
}

/// File name without directory and `.docx` extension.
pub(crate) fn article_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".docx") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_directory_and_extension() {
        assert_eq!(article_stem(Path::new("Articles/solar_farm.docx")), "solar_farm");
        assert_eq!(article_stem(Path::new("notes.txt")), "notes.txt");
    }

    #[test]
    fn seeded_settings_give_repeatable_prompts() {
        let settings = GenerationSettings {
            seed: Some(99),
            ..Default::default()
        };
        let concepts = vec!["A wind farm on a ridge".to_string()];
        let a = PromptEnhancer.create_prompts(&concepts, "cinematic", &mut Session::prompt_rng(&settings));
        let b = PromptEnhancer.create_prompts(&concepts, "cinematic", &mut Session::prompt_rng(&settings));
        assert_eq!(a, b);
    }
}
