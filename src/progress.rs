//! Progress-callback trait for per-article generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events as a batch run walks the articles directory.
//!
//! # Example
//!
//! ```rust
//! use article_imagegen::{GenerationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_image_saved(&self, article: &str, _concept_index: usize, image_path: &std::path::Path) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{article}: {}", image_path.display());
//!     }
//! }
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the session as it processes articles.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The trait is `Send + Sync` because the session is
/// shared by reference across async tasks, even though it never runs two
/// generations at once.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before the first article is read.
    fn on_run_start(&self, total_articles: usize) {
        let _ = total_articles;
    }

    /// Called before an article is read.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the run
    /// * `total` — articles in the run
    /// * `article` — article name without extension
    fn on_article_start(&self, index: usize, total: usize, article: &str) {
        let _ = (index, total, article);
    }

    /// Called after concepts were selected, before any image is generated.
    fn on_concepts_ready(&self, article: &str, concepts: &[String]) {
        let _ = (article, concepts);
    }

    /// Called after each PNG + sidecar pair is written.
    fn on_image_saved(&self, article: &str, concept_index: usize, image_path: &Path) {
        let _ = (article, concept_index, image_path);
    }

    /// Called when an article fails; the run continues with the next one.
    fn on_article_error(&self, index: usize, total: usize, article: &str, error: &str) {
        let _ = (index, total, article, error);
    }

    /// Called once after every article was attempted.
    fn on_run_complete(&self, total_articles: usize, images_saved: usize) {
        let _ = (total_articles, images_saved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
