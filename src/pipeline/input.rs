//! Input resolution: normalise a user-supplied path or URL to a local `.docx`.
//!
//! URL documents are downloaded into `<cache_dir>/documents/` and kept there,
//! so the exact bytes a run worked from can be inspected afterwards.
//! We validate the ZIP magic bytes (`PK\x03\x04`) before returning so callers
//! get a meaningful error rather than a ZIP-parser failure.

use crate::error::RequestError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// A resolved input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the document was saved under the cache directory.
    Downloaded { url: String, path: PathBuf },
}

impl ResolvedInput {
    /// Get the path to the document regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// List the `.docx` articles of a directory, sorted by path.
///
/// Word lock files (`~$name.docx`) are skipped. A missing directory yields an
/// empty list, not an error.
pub fn list_articles(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Articles directory '{}' not readable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut articles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.ends_with(".docx") && !name.starts_with('~'))
        })
        .collect();

    articles.sort();
    debug!("Found {} article(s) in {}", articles.len(), dir.display());
    articles
}

/// Resolve the input string to a local `.docx` path.
///
/// If the input is a URL, download it into `<cache_dir>/documents/`.
/// If the input is a local file, validate it exists, is readable and is a ZIP.
pub async fn resolve_input(
    input: &str,
    cache_dir: &Path,
    timeout_secs: u64,
) -> Result<ResolvedInput, RequestError> {
    if is_url(input) {
        download_url(input, cache_dir, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Resolve a local file path, validating existence and ZIP magic bytes.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, RequestError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(RequestError::DocumentNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != ZIP_MAGIC {
                return Err(RequestError::NotADocx { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RequestError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(RequestError::DocumentNotFound { path });
        }
    }

    debug!("Resolved local document: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL into the cache directory and return the path.
async fn download_url(
    url: &str,
    cache_dir: &Path,
    timeout_secs: u64,
) -> Result<ResolvedInput, RequestError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| RequestError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let dir = cache_dir.join("documents");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| failed(format!("cannot create {}: {e}", dir.display())))?;
    let path = dir.join(filename_from_url(url));

    if bytes.len() >= 4 && &bytes[..4] != ZIP_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(RequestError::NotADocx { path, magic });
    }

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| failed(format!("cannot write {}: {e}", path.display())))?;

    info!("Downloaded to: {}", path.display());

    Ok(ResolvedInput::Downloaded {
        url: url.to_string(),
        path,
    })
}

/// Derive a file name from the last URL path segment.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if last.ends_with(".docx") {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.docx".to_string()
}
