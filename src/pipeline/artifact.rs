//! Artifact persistence: one PNG plus one JSON sidecar per generated image.
//!
//! File names are `{YYYYMMDD_HHMMSS}_{slug}.png` / `.json`, where the slug
//! comes from the article name when there is one and from the prompt
//! otherwise. Two images saved within the same second for the same source
//! would share a base name, so the writer probes `_1`, `_2`, … until it finds
//! a free one. The probe is check-then-write without locking; one session
//! saves sequentially so that is sufficient.

use crate::error::RequestError;
use crate::pipeline::encode::encode_png;
use chrono::{DateTime, Local};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters of the article name kept in the slug.
const SOURCE_SLUG_CHARS: usize = 30;
/// Characters of the prompt kept in the slug.
const PROMPT_SLUG_CHARS: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Sampling parameters recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactParameters {
    pub steps: u32,
    pub cfg_scale: f32,
    pub height: u32,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
}

/// The JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub prompt: String,
    /// Save time, `YYYYMMDD_HHMMSS`, local clock.
    pub timestamp: String,
    pub parameters: ArtifactParameters,
    pub image_path: PathBuf,
    pub model_id: String,
    pub article_source: Option<String>,
}

/// Where an artifact landed and what was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub image_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: ArtifactMetadata,
}

/// Keep the first `max` characters that survive the filter, trimmed, with
/// spaces turned into underscores.
pub fn slugify(s: &str, max: usize) -> String {
    let kept: String = s
        .chars()
        .take(max)
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    kept.trim().replace(' ', "_")
}

/// Base file name (no extension) for an artifact saved at `timestamp`.
pub fn base_filename(timestamp: &DateTime<Local>, prompt: &str, source_name: Option<&str>) -> String {
    let slug = match source_name {
        Some(name) => slugify(name, SOURCE_SLUG_CHARS),
        None => slugify(prompt, PROMPT_SLUG_CHARS),
    };
    format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), slug)
}

/// Writes artifacts for one model.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    model_id: String,
}

impl ArtifactWriter {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }

    /// Save `image` and its sidecar under `output_dir`, stamped with now.
    pub async fn save(
        &self,
        image: DynamicImage,
        prompt: &str,
        parameters: ArtifactParameters,
        output_dir: &Path,
        source_name: Option<&str>,
    ) -> Result<ArtifactRecord, RequestError> {
        self.save_at(image, prompt, parameters, output_dir, source_name, Local::now())
            .await
    }

    /// [`save`](Self::save) with an explicit timestamp.
    pub async fn save_at(
        &self,
        image: DynamicImage,
        prompt: &str,
        parameters: ArtifactParameters,
        output_dir: &Path,
        source_name: Option<&str>,
        timestamp: DateTime<Local>,
    ) -> Result<ArtifactRecord, RequestError> {
        let base = base_filename(&timestamp, prompt, source_name);
        let output_dir = output_dir.to_path_buf();
        let prompt = prompt.to_string();
        let source = source_name.map(str::to_string);
        let model_id = self.model_id.clone();
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();

        let fallback_path = output_dir.clone();
        tokio::task::spawn_blocking(move || {
            write_artifact(
                &image,
                &output_dir,
                &base,
                ArtifactMetadata {
                    prompt,
                    timestamp: stamp,
                    parameters,
                    image_path: PathBuf::new(),
                    model_id,
                    article_source: source,
                },
            )
        })
        .await
        .map_err(|e| RequestError::ArtifactWriteFailed {
            path: fallback_path,
            detail: format!("writer task panicked: {e}"),
        })?
    }
}

fn write_artifact(
    image: &DynamicImage,
    output_dir: &Path,
    base: &str,
    mut metadata: ArtifactMetadata,
) -> Result<ArtifactRecord, RequestError> {
    let write_err = |path: &Path, detail: String| RequestError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    std::fs::create_dir_all(output_dir).map_err(|e| write_err(output_dir, e.to_string()))?;

    let stem = free_stem(output_dir, base);
    let image_path = output_dir.join(format!("{stem}.png"));
    let metadata_path = output_dir.join(format!("{stem}.json"));

    let png = encode_png(image).map_err(|e| write_err(&image_path, e.to_string()))?;
    std::fs::write(&image_path, png).map_err(|e| write_err(&image_path, e.to_string()))?;

    metadata.image_path = image_path.clone();
    let json = to_json_4space(&metadata).map_err(|e| write_err(&metadata_path, e))?;
    std::fs::write(&metadata_path, json).map_err(|e| write_err(&metadata_path, e.to_string()))?;

    debug!("Saved artifact {}", image_path.display());
    Ok(ArtifactRecord {
        image_path,
        metadata_path,
        metadata,
    })
}

/// First of `base`, `base_1`, `base_2`, … whose `.png` does not exist yet.
fn free_stem(output_dir: &Path, base: &str) -> String {
    if !output_dir.join(format!("{base}.png")).exists() {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|stem| !output_dir.join(format!("{stem}.png")).exists())
        .unwrap_or_else(|| base.to_string())
}

fn to_json_4space<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|e| e.to_string())?;
    Ok(buf)
}
