//! Integration tests for article-imagegen.
//!
//! Everything except the last test runs offline against an in-process
//! [`DiffusionBackend`] that returns solid-colour images, with `.docx`
//! fixtures written on the fly into temporary directories.
//!
//! The live test talks to a real Stable-Diffusion-WebUI server and is gated
//! behind `E2E_ENABLED`:
//!   E2E_ENABLED=1 SD_WEBUI_URL=http://127.0.0.1:7860 cargo test --test pipeline -- --nocapture

use article_imagegen::pipeline::artifact::ArtifactMetadata;
use article_imagegen::prompts::SAFETY_NEGATIVE_PROMPT;
use article_imagegen::{
    generate_stream, BackendError, ConceptSelector, ConfigurationError, DiffusionBackend,
    GenerationProgressCallback, GenerationSettings, GeneratorConfig, RequestError, SelectorKind,
    Session, Style, Txt2ImgJob,
};
use async_trait::async_trait;
use edgequake_llm::MockProvider;
use futures::StreamExt;
use image::{DynamicImage, Rgb, RgbImage};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("article_imagegen=debug")
        .with_test_writer()
        .try_init();
}

/// Solid-colour backend that records every job it receives.
#[derive(Default)]
struct FakeBackend {
    jobs: Mutex<Vec<Txt2ImgJob>>,
    /// Fail every txt2img call whose prompt contains this text.
    fail_on: Option<String>,
    /// Return one image fewer than requested.
    short_batch: bool,
}

#[async_trait]
impl DiffusionBackend for FakeBackend {
    async fn load_model(&self, _model_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn txt2img(&self, job: &Txt2ImgJob) -> Result<Vec<DynamicImage>, BackendError> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(ref needle) = self.fail_on {
            if job.prompt.contains(needle.as_str()) {
                return Err(BackendError::Api {
                    status: 500,
                    body: "CUDA out of memory".into(),
                });
            }
        }
        let n = if self.short_batch {
            job.batch_size.saturating_sub(1)
        } else {
            job.batch_size
        };
        Ok((0..n)
            .map(|i| DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 24, Rgb([i as u8 * 40, 90, 200]))))
            .collect())
    }
}

/// Backend whose model load is refused.
struct RefusingBackend;

#[async_trait]
impl DiffusionBackend for RefusingBackend {
    async fn load_model(&self, model_id: &str) -> Result<(), BackendError> {
        Err(BackendError::Api {
            status: 404,
            body: format!("checkpoint {model_id} not found"),
        })
    }

    async fn txt2img(&self, _job: &Txt2ImgJob) -> Result<Vec<DynamicImage>, BackendError> {
        unreachable!("model never loaded")
    }
}

/// Stand-in for the LLM selector: answers from a script or fails.
struct ScriptedSelector {
    answer: Result<Vec<String>, RequestError>,
}

#[async_trait]
impl ConceptSelector for ScriptedSelector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(&self, _text: &str, max_concepts: usize) -> Result<Vec<String>, RequestError> {
        self.answer
            .clone()
            .map(|c| c.into_iter().take(max_concepts).collect())
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
    saved: AtomicUsize,
}

impl GenerationProgressCallback for RecordingProgress {
    fn on_run_start(&self, total_articles: usize) {
        self.events.lock().unwrap().push(format!("start {total_articles}"));
    }
    fn on_article_start(&self, index: usize, total: usize, article: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("article {index}/{total} {article}"));
    }
    fn on_image_saved(&self, _article: &str, _concept_index: usize, _image_path: &Path) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }
    fn on_article_error(&self, _index: usize, _total: usize, article: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("error {article}"));
    }
    fn on_run_complete(&self, total_articles: usize, images_saved: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_articles} {images_saved}"));
    }
}

/// Write a minimal `.docx` whose body holds `paragraphs`.
fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

const SOLAR: &[&str] = &[
    "The new solar farm outside the village now covers more than two hundred acres of former pasture.",
    "Residents describe the scene at dawn as a sea of glass panels glowing under a pale orange sky.",
    "Engineers expect the installation to power twelve thousand homes by the end of next summer.",
];

const HARBOUR: &[&str] = &[
    "Fishing boats returned to the old harbour on Friday after a week of storms kept them ashore.",
    "Photographs show crates of mackerel stacked along the quay while gulls circle the masts above.",
];

struct Fixture {
    _dir: TempDir,
    articles: PathBuf,
    output: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let articles = dir.path().join("Articles");
    let output = dir.path().join("generated_images");
    std::fs::create_dir_all(&articles).unwrap();
    Fixture {
        articles,
        output,
        _dir: dir,
    }
}

fn config(fx: &Fixture, backend: Arc<dyn DiffusionBackend>) -> GeneratorConfig {
    GeneratorConfig::builder()
        .backend(backend)
        .articles_dir(&fx.articles)
        .output_dir(&fx.output)
        .max_concepts(3)
        .build()
        .unwrap()
}

fn settings() -> GenerationSettings {
    GenerationSettings {
        steps: 20,
        guidance_scale: 7.5,
        height: 512,
        width: 512,
        num_images: 1,
        seed: Some(1234),
        style: Style::Artistic,
    }
}

fn read_sidecar(path: &Path) -> ArtifactMetadata {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ── Manual generation ────────────────────────────────────────────────────────

#[tokio::test]
async fn manual_generation_saves_one_artifact_per_image() {
    init_logging();
    let fx = fixture();
    let backend = Arc::new(FakeBackend::default());
    let session = Session::start(config(&fx, backend.clone())).await.unwrap();

    let settings = GenerationSettings {
        num_images: 2,
        ..settings()
    };
    let records = session
        .generate_manual("A futuristic city at night", None, &settings)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_ne!(records[0].image_path, records[1].image_path);
    for record in &records {
        assert!(record.image_path.exists());
        assert!(record.metadata_path.exists());
        let meta = read_sidecar(&record.metadata_path);
        assert_eq!(meta.prompt, "A futuristic city at night");
        assert_eq!(meta.parameters.steps, 20);
        assert_eq!(meta.parameters.cfg_scale, 7.5);
        assert_eq!(meta.parameters.seed, Some(1234));
        assert_eq!(meta.article_source, None);
        assert_eq!(meta.image_path, record.image_path);
        let name = record.image_path.file_name().unwrap().to_string_lossy();
        assert!(name.contains("_A_futuristic_city_at"), "got {name}");
    }

    let jobs = backend.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].batch_size, 2);
    assert_eq!(jobs[0].prompt, "A futuristic city at night");
    assert!(jobs[0].negative_prompt.starts_with("cartoon, 3d"));
    assert!(jobs[0].negative_prompt.ends_with(SAFETY_NEGATIVE_PROMPT));
}

#[tokio::test]
async fn short_batch_saves_nothing() {
    let fx = fixture();
    let backend = Arc::new(FakeBackend {
        short_batch: true,
        ..Default::default()
    });
    let session = Session::start(config(&fx, backend)).await.unwrap();
    let settings = GenerationSettings {
        num_images: 3,
        ..settings()
    };

    let err = session
        .generate_manual("A quiet library", Some("text"), &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::GenerationFailed { .. }));
    assert!(!fx.output.exists() || std::fs::read_dir(&fx.output).unwrap().next().is_none());
}

// ── Article processing ───────────────────────────────────────────────────────

#[tokio::test]
async fn process_article_extracts_ranked_concepts() {
    let fx = fixture();
    let path = fx.articles.join("solar_farm.docx");
    write_docx(&path, SOLAR);
    let session = Session::start(config(&fx, Arc::new(FakeBackend::default())))
        .await
        .unwrap();

    let data = session.process_article(&path, 2).await;
    assert!(data.error.is_none(), "unexpected error: {:?}", data.error);
    assert_eq!(data.filename, "solar_farm.docx");
    assert_eq!(data.stem(), "solar_farm");
    assert_eq!(data.concepts.len(), 2);
    // "describe" + "scene" earns the keyword bonus.
    assert!(data.concepts[0].starts_with("Residents describe the scene"));
    assert!(data.preview.chars().count() <= 500);
    assert!(data.full_text.contains("two hundred acres"));
}

#[tokio::test]
async fn empty_article_is_reported_not_raised() {
    let fx = fixture();
    let path = fx.articles.join("blank.docx");
    write_docx(&path, &["   ", ""]);
    let session = Session::start(config(&fx, Arc::new(FakeBackend::default())))
        .await
        .unwrap();

    let data = session.process_article(&path, 3).await;
    assert!(matches!(data.error, Some(RequestError::EmptyDocument { .. })));
    assert!(data.concepts.is_empty());
    assert!(data.full_text.is_empty());
}

#[tokio::test]
async fn short_and_invalid_articles() {
    let fx = fixture();
    let short = fx.articles.join("short.docx");
    write_docx(&short, &["Too short to illustrate."]);
    let fake = fx.articles.join("fake.docx");
    std::fs::write(&fake, "plain text pretending to be a docx").unwrap();
    let session = Session::start(config(&fx, Arc::new(FakeBackend::default())))
        .await
        .unwrap();

    let data = session.process_article(&short, 3).await;
    assert!(matches!(
        data.error,
        Some(RequestError::DocumentTooShort { min: 100, .. })
    ));

    let data = session.process_article(&fake, 3).await;
    assert!(matches!(data.error, Some(RequestError::NotADocx { .. })));

    let data = session.process_article(&fx.articles.join("missing.docx"), 3).await;
    assert!(matches!(data.error, Some(RequestError::DocumentNotFound { .. })));
}

#[tokio::test]
async fn selector_failure_lands_in_article_data() {
    let fx = fixture();
    let path = fx.articles.join("solar_farm.docx");
    write_docx(&path, SOLAR);
    let selector = Arc::new(ScriptedSelector {
        answer: Err(RequestError::LlmFailed {
            detail: "429 Too Many Requests".into(),
        }),
    });
    let session =
        Session::start_with_selector(config(&fx, Arc::new(FakeBackend::default())), selector)
            .await
            .unwrap();

    let data = session.process_article(&path, 3).await;
    assert!(matches!(data.error, Some(RequestError::LlmFailed { .. })));
    // Text is still available for display.
    assert!(!data.preview.is_empty());
}

#[tokio::test]
async fn llm_selector_concepts_drive_generation() {
    let fx = fixture();
    let path = fx.articles.join("solar_farm.docx");
    write_docx(&path, SOLAR);
    let mock = MockProvider::new();
    mock.add_response("Solar panels glinting at dawn | Sheep grazing between rows | Inverter station")
        .await;
    let backend = Arc::new(FakeBackend::default());
    let config = GeneratorConfig::builder()
        .backend(backend.clone())
        .selector(SelectorKind::Llm)
        .llm_provider(Arc::new(mock))
        .articles_dir(&fx.articles)
        .output_dir(&fx.output)
        .max_concepts(2)
        .build()
        .unwrap();
    let session = Session::start(config).await.unwrap();

    let outcome = session.generate_article(&path, &settings()).await;
    assert!(outcome.is_success(), "unexpected error: {:?}", outcome.error);
    assert_eq!(
        outcome.concepts,
        vec!["Solar panels glinting at dawn", "Sheep grazing between rows"]
    );
    assert_eq!(outcome.images.len(), 2);
    let jobs = backend.jobs.lock().unwrap();
    assert!(jobs[0].prompt.starts_with("Solar panels glinting at dawn, "));
    assert!(jobs[1].prompt.starts_with("Sheep grazing between rows, "));
}

#[tokio::test]
async fn preview_builds_one_prompt_per_concept() {
    let fx = fixture();
    let path = fx.articles.join("harbour.docx");
    write_docx(&path, HARBOUR);
    let session = Session::start(config(&fx, Arc::new(FakeBackend::default())))
        .await
        .unwrap();

    let (data, prompts) = session.preview(&path, 3, &settings()).await;
    assert_eq!(prompts.len(), data.concepts.len());
    for (pair, concept) in prompts.iter().zip(&data.concepts) {
        assert_eq!(&pair.concept, concept);
        assert!(pair.positive.starts_with(concept.as_str()));
        assert!(pair.positive.contains("digital art"));
        assert_eq!(pair.style, "artistic");
    }
    // Nothing is generated by a preview.
    assert!(!fx.output.exists());
}

// ── Batch generation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_all_walks_articles_in_order() {
    init_logging();
    let fx = fixture();
    write_docx(&fx.articles.join("b_solar.docx"), SOLAR);
    write_docx(&fx.articles.join("a_harbour.docx"), HARBOUR);
    write_docx(&fx.articles.join("~$a_harbour.docx"), HARBOUR);
    std::fs::write(fx.articles.join("notes.txt"), "not an article").unwrap();

    let progress = Arc::new(RecordingProgress::default());
    let backend = Arc::new(FakeBackend::default());
    let config = GeneratorConfig::builder()
        .backend(backend.clone())
        .articles_dir(&fx.articles)
        .output_dir(&fx.output)
        .max_concepts(3)
        .progress_callback(progress.clone())
        .build()
        .unwrap();
    let session = Session::start(config).await.unwrap();

    let (outcomes, stats) = session.generate_all(&settings()).await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.article.as_str()).collect();
    assert_eq!(names, vec!["a_harbour", "b_solar"]);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(outcomes[0].images.len(), 2);
    assert_eq!(outcomes[1].images.len(), 3);
    assert_eq!(stats.total_articles, 2);
    assert_eq!(stats.images_saved, 5);
    assert_eq!(progress.saved.load(Ordering::SeqCst), 5);

    // One backend call per concept, each a batch of one.
    let jobs = backend.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 5);
    assert!(jobs.iter().all(|j| j.batch_size == 1));
    assert!(jobs.iter().all(|j| j.negative_prompt.contains(SAFETY_NEGATIVE_PROMPT)));

    // Same article, same second: still distinct files.
    let solar = &outcomes[1].images;
    assert_ne!(solar[0].image_path, solar[1].image_path);
    assert_ne!(solar[1].image_path, solar[2].image_path);

    let meta = read_sidecar(&solar[0].metadata_path);
    assert_eq!(meta.article_source.as_deref(), Some("b_solar"));
    assert_eq!(meta.parameters.style.as_deref(), Some("artistic"));
    assert_eq!(meta.parameters.concept.as_deref(), Some(solar[0].concept.as_str()));

    let events = progress.events.lock().unwrap();
    assert_eq!(events.first().map(String::as_str), Some("start 2"));
    assert!(events.contains(&"article 1/2 a_harbour".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("done 2 5"));
}

#[tokio::test]
async fn failing_article_does_not_stop_the_run() {
    let fx = fixture();
    write_docx(&fx.articles.join("a_harbour.docx"), HARBOUR);
    write_docx(&fx.articles.join("b_blank.docx"), &[""]);
    write_docx(&fx.articles.join("c_solar.docx"), SOLAR);

    let progress = Arc::new(RecordingProgress::default());
    let backend = Arc::new(FakeBackend {
        fail_on: Some("Fishing boats".into()),
        ..Default::default()
    });
    let config = GeneratorConfig::builder()
        .backend(backend)
        .articles_dir(&fx.articles)
        .output_dir(&fx.output)
        .max_concepts(2)
        .progress_callback(progress.clone())
        .build()
        .unwrap();
    let session = Session::start(config).await.unwrap();

    let (outcomes, stats) = session.generate_all(&settings()).await;
    assert_eq!(outcomes.len(), 3);

    // First concept saved, second hit the backend failure.
    let harbour = &outcomes[0];
    assert!(matches!(harbour.error, Some(RequestError::GenerationFailed { .. })));
    assert_eq!(harbour.images.len(), 1);
    assert!(harbour.images[0].image_path.exists());

    assert!(matches!(outcomes[1].error, Some(RequestError::EmptyDocument { .. })));
    assert!(outcomes[2].is_success());
    assert_eq!(outcomes[2].images.len(), 2);

    assert_eq!(stats.failed_articles, 2);
    assert_eq!(stats.succeeded_articles, 1);
    assert_eq!(stats.images_saved, 3);

    let events = progress.events.lock().unwrap();
    assert!(events.contains(&"error a_harbour".to_string()));
    assert!(events.contains(&"error b_blank".to_string()));
}

#[tokio::test]
async fn article_without_qualifying_sentences_is_no_concepts() {
    let fx = fixture();
    let path = fx.articles.join("terse.docx");
    // Long enough overall, but every sentence is under the length floor.
    write_docx(
        &path,
        &["Short one here. Another brief line. Yet one more. And again now. Still too short. Last bit. Final note here."],
    );
    let session = Session::start(config(&fx, Arc::new(FakeBackend::default())))
        .await
        .unwrap();

    let outcome = session.generate_article(&path, &settings()).await;
    assert!(matches!(outcome.error, Some(RequestError::NoConcepts { .. })));
    assert!(outcome.images.is_empty());
}

#[tokio::test]
async fn generate_from_concepts_uses_article_name() {
    let fx = fixture();
    let session = Session::start_with_selector(
        config(&fx, Arc::new(FakeBackend::default())),
        Arc::new(ScriptedSelector {
            answer: Ok(vec!["Wide shot of a harbour at dusk, soft light".into()]),
        }),
    )
    .await
    .unwrap();

    let pair = article_imagegen::PromptEnhancer.enhance(
        "Wide shot of a harbour at dusk, soft light",
        "cinematic",
        &mut <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(3),
    );
    let images = session
        .generate_from_concepts(&[pair.clone()], "harbour news", &settings())
        .await
        .unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].concept_index, 0);
    assert_eq!(images[0].prompt, pair.positive);
    let name = images[0].image_path.file_name().unwrap().to_string_lossy();
    assert!(name.ends_with("_harbour_news.png"), "got {name}");
}

#[tokio::test]
async fn stream_yields_outcomes_in_input_order() {
    let fx = fixture();
    let a = fx.articles.join("a.docx");
    let b = fx.articles.join("b.docx");
    write_docx(&a, SOLAR);
    write_docx(&b, HARBOUR);
    let session = Arc::new(
        Session::start(config(&fx, Arc::new(FakeBackend::default())))
            .await
            .unwrap(),
    );

    let outcomes: Vec<_> = generate_stream(session, vec![b, a], settings())
        .collect()
        .await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.article.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

// ── Start-up failures ────────────────────────────────────────────────────────

#[test]
fn refused_model_is_a_configuration_error() {
    let fx = fixture();
    let err = tokio_test::block_on(Session::start(config(&fx, Arc::new(RefusingBackend))))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::ModelLoadFailed { .. }));
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn unreachable_backend_is_a_configuration_error() {
    // Port 9 (discard) is closed on any sane test machine.
    let config = GeneratorConfig::builder()
        .backend_url("http://127.0.0.1:9")
        .backend_timeout_secs(2)
        .build()
        .unwrap();
    let err = Session::start(config).await.unwrap_err();
    assert!(matches!(err, ConfigurationError::BackendUnavailable { .. }));
}

// ── Live backend ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_live_backend_generates_png() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    init_logging();
    let fx = fixture();
    let url = std::env::var("SD_WEBUI_URL").unwrap_or_else(|_| "http://127.0.0.1:7860".into());
    let config = GeneratorConfig::builder()
        .backend_url(url)
        .output_dir(&fx.output)
        .build()
        .unwrap();
    let session = Session::start(config).await.expect("backend should be up");

    let settings = GenerationSettings {
        steps: 10,
        height: 256,
        width: 256,
        ..Default::default()
    };
    let records = session
        .generate_manual("A red bicycle leaning on a brick wall", None, &settings)
        .await
        .expect("generation should succeed");
    assert_eq!(records.len(), 1);
    let bytes = std::fs::read(&records[0].image_path).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}
