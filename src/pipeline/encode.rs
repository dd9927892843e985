//! Image codec glue: backend base64 payloads ↔ `DynamicImage` ↔ PNG bytes.
//!
//! The WebUI API returns each image as a bare base64 PNG, sometimes with a
//! `data:image/png;base64,` prefix. Artifacts are always written as PNG so the
//! saved file is lossless whatever the backend produced.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode one base64 image returned by the backend.
pub fn decode_image(b64: &str) -> Result<DynamicImage, String> {
    let payload = match b64.split_once(";base64,") {
        Some((_, data)) => data,
        None => b64,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 image: {e}"))?;
    let img = image::load_from_memory(&bytes).map_err(|e| format!("undecodable image: {e}"))?;
    debug!(
        "Decoded {}×{} image from {} bytes",
        img.width(),
        img.height(),
        bytes.len()
    );
    Ok(img)
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded image → {} bytes PNG", buf.len());
    Ok(buf)
}

/// Encode an image as a base64 PNG. Used by test backends to mimic the API.
pub fn encode_png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    Ok(STANDARD.encode(encode_png(img)?))
}
