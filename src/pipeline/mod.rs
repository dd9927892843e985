//! Pipeline stages for article-based image generation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the two concept selectors can be swapped
//! without touching anything downstream.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ concepts ──▶ enhance ──▶ diffusion ──▶ artifact
//! (path/URL)  (docx)    (heuristic    (prompt     (backend)    (PNG+JSON)
//!                         or llm)       pair)
//! ```
//!
//! 1. [`input`]       — canonicalise a path or URL to a local `.docx`; list articles
//! 2. [`document`]    — paragraph text out of WordprocessingML; runs in `spawn_blocking`
//! 3. [`concepts`]    — the [`concepts::ConceptSelector`] trait and the heuristic scorer
//! 4. [`llm`]         — the hosted-LLM selector; the only stage talking to an LLM
//! 5. [`postprocess`] — cleanup and `|`-splitting of raw LLM output
//! 6. [`enhance`]     — quality/lighting/style decoration with an explicit RNG
//! 7. [`diffusion`]   — the backend trait, its HTTP client, the safety floor
//! 8. [`encode`]      — base64 PNG ↔ `DynamicImage`
//! 9. [`artifact`]    — slugged file names, PNG and JSON sidecar

pub mod artifact;
pub mod concepts;
pub mod diffusion;
pub mod document;
pub mod encode;
pub mod enhance;
pub mod input;
pub mod llm;
pub mod postprocess;
