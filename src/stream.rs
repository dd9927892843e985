//! Streaming batch API: emit article outcomes as they complete.
//!
//! [`crate::session::Session::generate_all`] returns only after the last
//! article. [`generate_stream`] yields each [`ArticleOutcome`] as soon as
//! its images are on disk, so a caller can print results while the GPU keeps
//! working. Articles are still processed one at a time and arrive in input
//! order.

use crate::config::GenerationSettings;
use crate::output::ArticleOutcome;
use crate::session::Session;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-article outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = ArticleOutcome> + Send>>;

/// Generate images for `articles`, yielding one outcome per article.
///
/// Per-article progress events fire as in a batch run. The stream is lazy:
/// nothing happens until it is polled.
///
/// # Example
/// ```rust,no_run
/// use article_imagegen::{generate_stream, GenerationSettings, GeneratorConfig, Session};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Arc::new(Session::start(GeneratorConfig::default()).await?);
/// let articles = session.list_articles();
/// let mut outcomes = generate_stream(session, articles, GenerationSettings::default());
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.error {
///         None => println!("{}: {} image(s)", outcome.article, outcome.images.len()),
///         Some(e) => eprintln!("{}: {e}", outcome.article),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn generate_stream(
    session: Arc<Session>,
    articles: Vec<PathBuf>,
    settings: GenerationSettings,
) -> OutcomeStream {
    let total = articles.len();
    info!("Starting streaming generation: {} article(s)", total);

    let s = stream::iter(articles.into_iter().enumerate()).then(move |(i, path)| {
        let session = Arc::clone(&session);
        let settings = settings.clone();
        async move {
            session
                .generate_article_indexed(&path, i + 1, total, &settings)
                .await
        }
    });

    Box::pin(s)
}
