//! Loading images from local storage.

use crate::domain::{ArCanvasError, CapturedImage, ImageSource, Result};
use std::path::Path;

/// Reads and decodes an image file.
///
/// Existence is checked before reading so a missing file is distinguishable
/// from unreadable or corrupt data.
///
/// # Errors
///
/// - `NotFound` when nothing exists at `path`
/// - `Io` when the file exists but cannot be read
/// - `DecodeError` when the bytes are not a supported image
pub fn load_from_path(path: &Path) -> Result<CapturedImage> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "image file not found");
        return Err(ArCanvasError::NotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read image file");

    CapturedImage::decode(&bytes, ImageSource::LoadedFromDisk)
}
