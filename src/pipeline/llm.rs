//! Remote concept selection through a hosted chat-completion model.
//!
//! Intentionally thin: the instruction template lives in [`crate::prompts`]
//! and response cleanup in [`crate::pipeline::postprocess`], so this module
//! only builds the request, makes one call and maps failures.
//!
//! There is no retry. A failed call surfaces as [`RequestError::LlmFailed`]
//! for that article and the batch moves on.

use crate::config::GeneratorConfig;
use crate::error::{ConfigurationError, RequestError};
use crate::pipeline::concepts::ConceptSelector;
use crate::pipeline::postprocess::parse_concept_list;
use crate::prompts::concept_extraction_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default model when none is configured.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// Concept selector backed by an [`LLMProvider`].
pub struct LlmSelector {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    text_budget: usize,
}

impl LlmSelector {
    /// Wrap an already-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider,
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            text_budget: config.llm_text_budget,
        }
    }

    /// Resolve the provider from configuration and environment.
    ///
    /// A missing credential is a [`ConfigurationError`], reported once when
    /// the session starts rather than on the first article.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigurationError> {
        let provider = resolve_provider(config)?;
        info!("LLM concept selector ready");
        Ok(Self::new(provider, config))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ConceptSelector for LlmSelector {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, text: &str, max_concepts: usize) -> Result<Vec<String>, RequestError> {
        if text.trim().is_empty() {
            return Err(RequestError::EmptyText);
        }

        let start = Instant::now();
        let prompt = concept_extraction_prompt(text, max_concepts, self.text_budget);
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                warn!("Concept extraction call failed: {}", e);
                RequestError::LlmFailed {
                    detail: e.to_string(),
                }
            })?;

        debug!(
            "Concept extraction: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let concepts = parse_concept_list(&response.content, max_concepts);
        if concepts.is_empty() {
            return Err(RequestError::NoConcepts {
                context: "the LLM response contained no usable concepts".to_string(),
            });
        }

        info!("LLM selector returned {} concept(s)", concepts.len());
        Ok(concepts)
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ConfigurationError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConfigurationError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.llm_provider`), used as-is.
/// 2. **Named provider + model** (`config.llm_provider_name`); the factory
///    reads the matching API key (`OPENAI_API_KEY`, …) from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &GeneratorConfig) -> Result<Arc<dyn LLMProvider>, ConfigurationError> {
    if let Some(ref provider) = config.llm_provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.llm_model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);

    if let Some(ref name) = config.llm_provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ConfigurationError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or choose --selector heuristic.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
