//! Result types returned by the session.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One article read, cleaned and mined for concepts.
///
/// Never an `Err`: a failed article carries its [`RequestError`] in `error`
/// with empty text and concepts, so a batch can report it and move on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleData {
    /// File name including extension.
    pub filename: String,
    pub filepath: PathBuf,
    /// First 500 characters of the cleaned text.
    pub preview: String,
    /// Full cleaned text.
    pub full_text: String,
    pub concepts: Vec<String>,
    pub error: Option<RequestError>,
}

impl ArticleData {
    pub(crate) fn failed(filename: String, filepath: PathBuf, error: RequestError) -> Self {
        Self {
            filename,
            filepath,
            preview: String::new(),
            full_text: String::new(),
            concepts: Vec::new(),
            error: Some(error),
        }
    }

    /// Article name without the `.docx` extension.
    pub fn stem(&self) -> &str {
        self.filename
            .strip_suffix(".docx")
            .unwrap_or(&self.filename)
    }
}

/// One concept rendered and saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptImage {
    pub concept_index: usize,
    pub concept: String,
    /// Enhanced prompt sent to the backend.
    pub prompt: String,
    pub image_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// The result of generating images for one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleOutcome {
    /// Article name without extension.
    pub article: String,
    pub concepts: Vec<String>,
    pub images: Vec<ConceptImage>,
    pub error: Option<RequestError>,
    pub duration_ms: u64,
}

impl ArticleOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Totals for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_articles: usize,
    pub succeeded_articles: usize,
    pub failed_articles: usize,
    pub images_saved: usize,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Summarise a finished run.
    pub fn from_outcomes(outcomes: &[ArticleOutcome], total_duration_ms: u64) -> Self {
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        Self {
            total_articles: outcomes.len(),
            succeeded_articles: outcomes.len() - failed,
            failed_articles: failed,
            images_saved: outcomes.iter().map(|o| o.images.len()).sum(),
            total_duration_ms,
        }
    }
}
