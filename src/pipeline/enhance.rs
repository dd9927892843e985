//! Prompt enhancement: concept → positive/negative prompt pair.
//!
//! A concept sentence alone renders poorly. The enhancer appends three quality
//! modifiers, one lighting modifier, a style suffix and optionally a closing
//! camera angle, all drawn with the caller's RNG so tests can pin the output with a seeded `StdRng`.

use crate::prompts::enhanced_negative_prompt;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const QUALITY_MODIFIERS: [&str; 9] = [
    "highly detailed",
    "8k resolution",
    "photorealistic",
    "professional photography",
    "crisp and clear",
    "sharp focus",
    "high quality",
    "masterpiece",
    "ultra detailed",
];

pub const LIGHTING_MODIFIERS: [&str; 5] = [
    "cinematic lighting",
    "dramatic lighting",
    "natural lighting",
    "studio lighting",
    "golden hour",
];

pub const CAMERA_ANGLES: [&str; 5] = [
    "wide angle shot",
    "close-up",
    "medium shot",
    "establishing shot",
    "aerial view",
];

/// Number of quality modifiers sampled per prompt.
const QUALITY_PICKS: usize = 3;

/// An enhanced prompt ready for the diffusion backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub concept: String,
    pub positive: String,
    pub negative: String,
    pub style: String,
}

/// Suffix appended for a style name. Unknown styles get none.
pub fn style_suffix(style: &str) -> &'static str {
    match style {
        "photorealistic" => ", professional photography, realistic",
        "artistic" => ", digital art, concept art, trending on artstation",
        "cinematic" => ", cinematic composition, movie still, film grain",
        _ => "",
    }
}

/// Stateless prompt builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptEnhancer;

impl PromptEnhancer {
    /// `"{concept}, {q1}, {q2}, {q3}, {lighting}{style suffix}"`.
    pub fn enhance<R: Rng + ?Sized>(&self, concept: &str, style: &str, rng: &mut R) -> PromptPair {
        let concept = concept.trim();
        let mut parts: Vec<&str> = Vec::with_capacity(QUALITY_PICKS + 2);
        parts.push(concept);
        parts.extend(QUALITY_MODIFIERS.choose_multiple(rng, QUALITY_PICKS).copied());
        if let Some(lighting) = LIGHTING_MODIFIERS.choose(rng) {
            parts.push(*lighting);
        }

        let mut positive = parts.join(", ");
        positive.push_str(style_suffix(style));

        PromptPair {
            concept: concept.to_string(),
            positive,
            negative: enhanced_negative_prompt(),
            style: style.to_string(),
        }
    }

    /// Like [`enhance`](Self::enhance), optionally with a camera angle
    /// appended at the end.
    pub fn create_prompt<R: Rng + ?Sized>(
        &self,
        concept: &str,
        style: &str,
        add_camera_angle: bool,
        rng: &mut R,
    ) -> PromptPair {
        let mut pair = self.enhance(concept, style, rng);
        if add_camera_angle {
            if let Some(angle) = CAMERA_ANGLES.choose(rng) {
                pair.positive = format!("{}, {}", pair.positive, angle);
            }
        }
        pair
    }

    /// One prompt per concept, in order, each with a camera angle.
    pub fn create_prompts<R: Rng + ?Sized>(
        &self,
        concepts: &[String],
        style: &str,
        rng: &mut R,
    ) -> Vec<PromptPair> {
        concepts
            .iter()
            .map(|c| self.create_prompt(c, style, true, rng))
            .collect()
    }

    /// Append a caller-supplied negative prompt to the pair's negative.
    pub fn with_extra_negative(mut pair: PromptPair, extra: Option<&str>) -> PromptPair {
        if let Some(extra) = extra.map(str::trim).filter(|s| !s.is_empty()) {
            pair.negative = format!("{}, {}", pair.negative, extra);
        }
        pair
    }
}
