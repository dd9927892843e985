//! CLI binary for article-imagegen.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig` / `GenerationSettings` and prints results.

use anyhow::{Context, Result};
use article_imagegen::config::{ALLOWED_DIMENSIONS, DEFAULT_BACKEND_URL, DEFAULT_MODEL_ID, MAX_IMAGES};
use article_imagegen::pipeline::input;
use article_imagegen::{
    GenerationProgressCallback, GenerationSettings, GeneratorConfig, ProgressCallback, SelectorKind,
    Session, Style,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the articles of a run plus a log
/// line per saved image.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading model…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} articles  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_articles: usize) {
        self.activate_bar(total_articles);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating images for {total_articles} article(s)…"))
        ));
    }

    fn on_article_start(&self, index: usize, _total: usize, article: &str) {
        self.bar.set_position(index.saturating_sub(1) as u64);
        self.bar.set_message(article.to_string());
    }

    fn on_concepts_ready(&self, article: &str, concepts: &[String]) {
        self.bar.println(format!(
            "  {} {}  {}",
            cyan("•"),
            article,
            dim(&format!("{} concept(s)", concepts.len()))
        ));
    }

    fn on_image_saved(&self, _article: &str, concept_index: usize, image_path: &Path) {
        self.bar.println(format!(
            "    {} concept {}  {}",
            green("✓"),
            concept_index + 1,
            dim(&image_path.display().to_string())
        ));
    }

    fn on_article_error(&self, _index: usize, _total: usize, article: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), article, red(&msg)));
    }

    fn on_run_complete(&self, total_articles: usize, images_saved: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} article(s), {} image(s) saved",
                green("✔"),
                bold(&total_articles.to_string()),
                bold(&images_saved.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} article(s) succeeded  ({} failed), {} image(s) saved",
                if failed == total_articles {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&total_articles.saturating_sub(failed).to_string()),
                total_articles,
                red(&failed.to_string()),
                images_saved,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the articles that would be processed
  article2img list

  # Show the concepts and prompts for one article (no images)
  article2img preview Articles/solar_farm.docx

  # Illustrate every article, two concepts each, cinematic style
  article2img --max-concepts 2 --style cinematic articles

  # Use a hosted LLM to phrase the concepts
  article2img --selector llm --provider openai --model gpt-4.1-mini articles

  # Manual prompt, four images, fixed seed
  article2img generate "A lighthouse in a winter storm" --images 4 --seed 42

  # JSON output for scripting
  article2img --json articles > run.json

BACKEND:
  Any server exposing the Stable-Diffusion-WebUI API (`--api` flag):
    POST /sdapi/v1/options   {"sd_model_checkpoint": ...}
    POST /sdapi/v1/txt2img   {"prompt": ..., "negative_prompt": ..., ...}

ENVIRONMENT VARIABLES:
  SD_WEBUI_URL            Diffusion backend base URL
  SD_MODEL_ID             Diffusion checkpoint to load
  OPENAI_API_KEY          OpenAI API key (LLM selector)
  ANTHROPIC_API_KEY       Anthropic API key (LLM selector)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override LLM model ID
"#;

/// Illustrate word-processor articles with a text-to-image diffusion model.
#[derive(Parser, Debug)]
#[command(
    name = "article2img",
    version,
    about = "Illustrate .docx articles with a text-to-image diffusion model",
    long_about = "Extract visual concepts from .docx articles (locally or with a hosted LLM), \
expand them into detailed prompts and render them with a Stable-Diffusion-WebUI-compatible \
server. Every image is saved as a PNG plus a JSON sidecar.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    sampling: SamplingArgs,

    /// Diffusion backend base URL.
    #[arg(long, global = true, env = "SD_WEBUI_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// Diffusion checkpoint to load at startup.
    #[arg(long, global = true, env = "SD_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    /// Backend HTTP timeout in seconds.
    #[arg(long, global = true, env = "ARTICLE2IMG_BACKEND_TIMEOUT", default_value_t = 600)]
    backend_timeout: u64,

    /// Concepts per article (1–5).
    #[arg(long, global = true, env = "ARTICLE2IMG_MAX_CONCEPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(1..=5))]
    max_concepts: u8,

    /// Concept selector.
    #[arg(long, global = true, env = "ARTICLE2IMG_SELECTOR", value_enum, default_value = "heuristic")]
    selector: SelectorArg,

    /// LLM provider for `--selector llm`: openai, anthropic, gemini, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model for `--selector llm` (e.g. gpt-4.1-nano).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Directory scanned for .docx articles.
    #[arg(long, global = true, env = "ARTICLE2IMG_ARTICLES_DIR", default_value = "Articles")]
    articles_dir: PathBuf,

    /// Directory receiving PNG + JSON artifacts.
    #[arg(long, global = true, env = "ARTICLE2IMG_OUTPUT_DIR", default_value = "generated_images")]
    output_dir: PathBuf,

    /// Cache directory (downloaded documents).
    #[arg(long, global = true, env = "ARTICLE2IMG_CACHE_DIR", default_value = ".cache/models")]
    cache_dir: PathBuf,

    /// HTTP download timeout in seconds for URL articles.
    #[arg(long, global = true, env = "ARTICLE2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "ARTICLE2IMG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "ARTICLE2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ARTICLE2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ARTICLE2IMG_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct SamplingArgs {
    /// Denoising steps (10–100).
    #[arg(long, global = true, env = "ARTICLE2IMG_STEPS", default_value_t = 40,
          value_parser = clap::value_parser!(u32).range(10..=100))]
    steps: u32,

    /// Guidance scale (1–20).
    #[arg(long, global = true, env = "ARTICLE2IMG_GUIDANCE", default_value_t = 5.0,
          value_parser = parse_guidance)]
    guidance: f32,

    /// Image height: 256, 512, 768 or 1024.
    #[arg(long, global = true, env = "ARTICLE2IMG_HEIGHT", default_value_t = 768,
          value_parser = parse_dimension)]
    height: u32,

    /// Image width: 256, 512, 768 or 1024.
    #[arg(long, global = true, env = "ARTICLE2IMG_WIDTH", default_value_t = 512,
          value_parser = parse_dimension)]
    width: u32,

    /// Fixed seed for reproducible images and prompts.
    #[arg(long, global = true, env = "ARTICLE2IMG_SEED")]
    seed: Option<u64>,

    /// Prompt style.
    #[arg(long, global = true, env = "ARTICLE2IMG_STYLE", value_enum, default_value = "photorealistic")]
    style: StyleArg,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the articles in the articles directory.
    List,

    /// Show an article's preview, concepts and enhanced prompts.
    Preview {
        /// Article path or HTTP/HTTPS URL.
        article: String,
    },

    /// Generate one image per concept for articles.
    Articles {
        /// Specific article files; defaults to every article in --articles-dir.
        paths: Vec<PathBuf>,
    },

    /// Generate images from a prompt as written.
    Generate {
        prompt: String,

        /// Negative prompt; defaults to the built-in one.
        #[arg(long, env = "ARTICLE2IMG_NEGATIVE")]
        negative: Option<String>,

        /// Number of images (1–4).
        #[arg(short = 'n', long, env = "ARTICLE2IMG_IMAGES", default_value_t = 1,
              value_parser = clap::value_parser!(u32).range(1..=MAX_IMAGES as i64))]
        images: u32,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SelectorArg {
    Heuristic,
    Llm,
}

impl From<SelectorArg> for SelectorKind {
    fn from(v: SelectorArg) -> Self {
        match v {
            SelectorArg::Heuristic => SelectorKind::Heuristic,
            SelectorArg::Llm => SelectorKind::Llm,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StyleArg {
    Photorealistic,
    Artistic,
    Cinematic,
}

impl From<StyleArg> for Style {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Photorealistic => Style::Photorealistic,
            StyleArg::Artistic => Style::Artistic,
            StyleArg::Cinematic => Style::Cinematic,
        }
    }
}

fn parse_dimension(s: &str) -> Result<u32, String> {
    let v: u32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if ALLOWED_DIMENSIONS.contains(&v) {
        Ok(v)
    } else {
        Err(format!("must be one of {ALLOWED_DIMENSIONS:?}"))
    }
}

fn parse_guidance(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if (1.0..=20.0).contains(&v) {
        Ok(v)
    } else {
        Err("must be between 1 and 20".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar only runs for `articles`; elsewhere INFO logs are the
    // only feedback while the backend works.
    let batch = matches!(cli.command, Command::Articles { .. });
    let show_progress = batch && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List needs no backend ────────────────────────────────────────────
    if let Command::List = cli.command {
        let articles = input::list_articles(&cli.articles_dir);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&articles).context("Failed to serialise article list")?
            );
        } else if articles.is_empty() {
            eprintln!("No articles found in {}", cli.articles_dir.display());
        } else {
            for path in &articles {
                println!("{}", path.display());
            }
        }
        return Ok(());
    }

    // ── Start session ────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let session = Session::start(config)
        .await
        .context("Failed to start session")?;
    let settings = build_settings(&cli);

    match cli.command {
        Command::List => {}
        Command::Preview { ref article } => run_preview(&cli, &session, article, &settings).await?,
        Command::Articles { ref paths } => run_articles(&cli, &session, paths, &settings).await?,
        Command::Generate {
            ref prompt,
            ref negative,
            images,
        } => {
            let settings = GenerationSettings {
                num_images: images,
                ..settings
            };
            run_generate(&cli, &session, prompt, negative.as_deref(), &settings).await?
        }
    }

    Ok(())
}

async fn run_preview(
    cli: &Cli,
    session: &Session,
    article: &str,
    settings: &GenerationSettings,
) -> Result<()> {
    let resolved = input::resolve_input(article, &cli.cache_dir, cli.download_timeout)
        .await
        .with_context(|| format!("Failed to open '{article}'"))?;
    let (data, prompts) = session
        .preview(resolved.path(), cli.max_concepts as usize, settings)
        .await;

    if cli.json {
        let value = serde_json::json!({ "article": data, "prompts": prompts });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise preview")?
        );
        return Ok(());
    }

    if let Some(ref e) = data.error {
        anyhow::bail!("{}: {}", data.filename, e);
    }

    println!("{}", bold(&data.filename));
    println!("{}\n", dim(&data.preview));
    if prompts.is_empty() {
        println!("{} no concepts found", cyan("⚠"));
    }
    for (i, pair) in prompts.iter().enumerate() {
        println!("{} {}", cyan(&format!("[{}]", i + 1)), bold(&pair.concept));
        println!("    {}", pair.positive);
    }
    Ok(())
}

async fn run_articles(
    cli: &Cli,
    session: &Session,
    paths: &[PathBuf],
    settings: &GenerationSettings,
) -> Result<()> {
    let articles = if paths.is_empty() {
        session.list_articles()
    } else {
        paths.to_vec()
    };
    if articles.is_empty() {
        anyhow::bail!("No articles found in {}", cli.articles_dir.display());
    }

    let (outcomes, stats) = session.generate_articles(&articles, settings).await;

    if cli.json {
        let value = serde_json::json!({ "outcomes": outcomes, "stats": stats });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise outcomes")?
        );
    } else if !cli.quiet {
        for outcome in &outcomes {
            match outcome.error {
                None => {
                    for img in &outcome.images {
                        println!("{}", img.image_path.display());
                    }
                }
                Some(ref e) if cli.no_progress => {
                    eprintln!("{} {}: {}", red("✗"), outcome.article, e);
                }
                Some(_) => {}
            }
        }
        if cli.no_progress {
            eprintln!(
                "{}/{} article(s), {} image(s) in {}ms",
                stats.succeeded_articles, stats.total_articles, stats.images_saved, stats.total_duration_ms
            );
        }
    }

    if stats.succeeded_articles == 0 {
        anyhow::bail!("All {} article(s) failed", stats.total_articles);
    }
    Ok(())
}

async fn run_generate(
    cli: &Cli,
    session: &Session,
    prompt: &str,
    negative: Option<&str>,
    settings: &GenerationSettings,
) -> Result<()> {
    let records = session
        .generate_manual(prompt, negative, settings)
        .await
        .context("Generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to serialise artifacts")?
        );
    } else {
        for record in &records {
            println!("{}", record.image_path.display());
        }
        if !cli.quiet {
            eprintln!("{} {} image(s) saved", green("✔"), records.len());
        }
    }
    Ok(())
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .model_id(&cli.model_id)
        .backend_url(&cli.backend_url)
        .backend_timeout_secs(cli.backend_timeout)
        .articles_dir(&cli.articles_dir)
        .output_dir(&cli.output_dir)
        .cache_dir(&cli.cache_dir)
        .max_concepts(cli.max_concepts as usize)
        .selector(cli.selector.clone().into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.llm_model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.llm_provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_settings(cli: &Cli) -> GenerationSettings {
    let s = &cli.sampling;
    GenerationSettings {
        steps: s.steps,
        guidance_scale: s.guidance,
        height: s.height,
        width: s.width,
        num_images: 1,
        seed: s.seed,
        style: s.style.clone().into(),
    }
}
