//! Error types for the article-imagegen library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConfigurationError`] — **Fatal**: the session cannot start at all
//!   (missing LLM credential, diffusion model failed to load, invalid
//!   settings). Reported once, from [`crate::session::Session::start`] or a
//!   config builder, and the process stops.
//!
//! * [`RequestError`] — **Recoverable**: one request failed (unreadable
//!   article, LLM returned nothing usable, generation call failed) but the
//!   session is fine. Returned as a value, or stored inside
//!   [`crate::output::ArticleData`] / [`crate::output::ArticleOutcome`], so the
//!   next independent request can proceed.
//!
//! Nothing in the crate retries. A transient network error is permanent for
//! the request that hit it.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while building configuration or starting a session.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configured LLM provider could not be built (usually a missing API key).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The diffusion backend could not be reached at all.
    #[error("Diffusion backend at '{url}' is unavailable: {detail}\nIs the server running?")]
    BackendUnavailable { url: String, detail: String },

    /// The backend answered but refused to load the requested model.
    #[error("Failed to load diffusion model '{model_id}': {detail}")]
    ModelLoadFailed { model_id: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A recoverable, per-request error.
///
/// `Clone + Serialize` so it can travel inside result structs and be printed
/// as part of `--json` output.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RequestError {
    // ── Input errors ──────────────────────────────────────────────────────
    #[error("Document not found: '{path}'")]
    DocumentNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not a ZIP container, so it cannot be a `.docx`.
    #[error("File is not a .docx document: '{path}'\nFirst bytes: {magic:?}")]
    NotADocx { path: PathBuf, magic: [u8; 4] },

    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Document errors ───────────────────────────────────────────────────
    #[error("Failed to read article '{path}': {detail}")]
    DocumentUnreadable { path: PathBuf, detail: String },

    #[error("Article '{name}' contains no text")]
    EmptyDocument { name: String },

    /// A selector was handed blank text, before any article name is known.
    #[error("No text to extract concepts from")]
    EmptyText,

    #[error("Article '{name}' is too short ({len} chars, need at least {min})")]
    DocumentTooShort { name: String, len: usize, min: usize },

    // ── Concept errors ────────────────────────────────────────────────────
    /// The hosted LLM call failed. Not retried.
    #[error("LLM concept extraction failed: {detail}")]
    LlmFailed { detail: String },

    /// The LLM answered but nothing in the response parsed as a concept.
    #[error("No concepts could be extracted: {context}")]
    NoConcepts { context: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The diffusion backend failed or returned a short batch.
    #[error("Image generation failed: {detail}")]
    GenerationFailed { detail: String },

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    // ── Output errors ─────────────────────────────────────────────────────
    #[error("Failed to write artifact '{path}': {detail}")]
    ArtifactWriteFailed { path: PathBuf, detail: String },
}
