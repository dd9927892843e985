//! Prompt text: the LLM instruction template and the fixed negative prompts.
//!
//! Every fixed string that ends up in a model request lives here, so unit
//! tests can inspect them directly and a wording change touches one file.

/// Clause appended to every negative prompt sent to the diffusion backend,
/// whatever the caller supplied. This is the content-safety floor.
pub const SAFETY_NEGATIVE_PROMPT: &str = "nsfw, nude, naked, sexual, explicit, adult content, inappropriate, vulgar, offensive, violence, gore, disturbing";

/// Quality clause the prompt enhancer puts in front of the safety clause.
pub const QUALITY_NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, ugly, bad anatomy, extra limbs, watermark, text, signature, low resolution, pixelated, jpeg artifacts, out of focus";

/// Negative prompt attached to every enhanced prompt pair.
pub fn enhanced_negative_prompt() -> String {
    format!("{QUALITY_NEGATIVE_PROMPT}, {SAFETY_NEGATIVE_PROMPT}")
}

/// Instruction template for LLM concept extraction.
///
/// Placeholders: `{max_concepts}` and `{article}`.
pub const CONCEPT_EXTRACTION_PROMPT: &str = r#"You are a photo editor choosing illustrations for a news article. Read the article below and propose exactly {max_concepts} image concepts for it.

Follow these rules precisely:

1. GROUNDING
   - Every concept must be traceable to something the article explicitly states
   - Do not invent people, places, events or objects the article does not mention

2. SAFETY
   - Avoid unsafe or sensitive imagery: no violence, gore, nudity, minors in
     sensitive contexts, real identifiable private individuals, or graphic
     medical content

3. PHRASING
   - Phrase each concept as a photographic scene description
   - Include lighting, camera angle or lens, and composition detail
   - Keep each concept to one or two sentences

4. OUTPUT FORMAT
   - Return the concepts as a single line separated by the pipe character |
   - Output ONLY that line: no numbering, no quotes, no commentary

ARTICLE:
"""
{article}
"""
"#;

/// Render the concept-extraction prompt for one article.
///
/// `article` is truncated to `budget` characters (on a char boundary) before
/// it is embedded.
pub fn concept_extraction_prompt(article: &str, max_concepts: usize, budget: usize) -> String {
    let truncated: String = article.chars().take(budget).collect();
    CONCEPT_EXTRACTION_PROMPT
        .replace("{max_concepts}", &max_concepts.to_string())
        .replace("{article}", &truncated)
}
