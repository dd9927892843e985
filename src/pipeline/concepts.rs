//! Concept selection: raw article text → a short list of visual scene concepts.
//!
//! Two implementations share the [`ConceptSelector`] contract:
//!
//! * [`HeuristicSelector`] — local sentence scoring, deterministic, offline.
//! * [`crate::pipeline::llm::LlmSelector`] — a hosted chat model phrases
//!   photographic scene descriptions.
//!
//! The session picks one from [`crate::config::SelectorKind`] at start-up and
//! calls it through `dyn ConceptSelector`; nothing downstream knows which.

use crate::error::RequestError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Extracts at most `max_concepts` concepts from article text.
#[async_trait]
pub trait ConceptSelector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extract concepts in priority order. Never returns more than
    /// `max_concepts` items.
    async fn extract(&self, text: &str, max_concepts: usize) -> Result<Vec<String>, RequestError>;
}

/// Words that mark a sentence as describing something visual.
pub const DESCRIPTIVE_WORDS: [&str; 10] = [
    "describe",
    "show",
    "depict",
    "illustrate",
    "feature",
    "image",
    "picture",
    "scene",
    "view",
    "landscape",
];

/// A sentence must be longer than this (in characters) to be considered.
pub const MIN_SENTENCE_CHARS: usize = 50;

/// Heuristic concepts are cut to this many characters.
pub const MAX_CONCEPT_CHARS: usize = 150;

static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

/// Local sentence-scoring selector.
///
/// Scoring per surviving sentence:
/// * +2 if it is among the first three sentences
/// * +3 if it mentions any of [`DESCRIPTIVE_WORDS`]
/// * +1 if it is longer than 100 characters
///
/// Sentences are ranked by score with ties kept in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSelector;

impl HeuristicSelector {
    /// The ranked sentences, before the count cut and truncation.
    pub fn key_sentences(text: &str) -> Vec<(u32, String)> {
        let mut scored: Vec<(u32, String)> = RE_SENTENCE_END
            .split(text)
            .map(str::trim)
            .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
            .enumerate()
            .map(|(i, sentence)| (score_sentence(i, sentence), sentence.to_string()))
            .collect();

        // `sort_by` is stable, so equal scores keep document order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
    }

    /// Synchronous form of [`ConceptSelector::extract`].
    pub fn select(text: &str, max_concepts: usize) -> Vec<String> {
        let concepts: Vec<String> = Self::key_sentences(text)
            .into_iter()
            .take(max_concepts)
            .map(|(_, sentence)| truncate_chars(&sentence, MAX_CONCEPT_CHARS))
            .collect();
        debug!("Heuristic selector kept {} concept(s)", concepts.len());
        concepts
    }
}

#[async_trait]
impl ConceptSelector for HeuristicSelector {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn extract(&self, text: &str, max_concepts: usize) -> Result<Vec<String>, RequestError> {
        Ok(Self::select(text, max_concepts))
    }
}

fn score_sentence(index: usize, sentence: &str) -> u32 {
    let mut score = 0;
    if index < 3 {
        score += 2;
    }
    let lower = sentence.to_lowercase();
    if DESCRIPTIVE_WORDS.iter().any(|w| lower.contains(w)) {
        score += 3;
    }
    if sentence.chars().count() > 100 {
        score += 1;
    }
    score
}

/// Keep the first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
