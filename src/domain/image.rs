//! Acquired image model.
//!
//! A [`CapturedImage`] is the single result type produced by every acquisition
//! path (camera capture, disk load, server fetch). The acquisition service holds
//! at most one at a time; publishing a new image drops the previous buffer.

use chrono::{DateTime, Utc};
use image::RgbaImage;

/// Where an acquired image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// One-shot capture from the camera device.
    Captured,
    /// Read and decoded from the configured image directory.
    LoadedFromDisk,
    /// Downloaded from the companion image server.
    FetchedFromServer,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Captured => "captured",
            Self::LoadedFromDisk => "disk",
            Self::FetchedFromServer => "server",
        };
        f.write_str(label)
    }
}

/// Decoded pixel buffer plus provenance.
///
/// The buffer is opaque to the state machine; only the dimensions and the
/// source tag are inspected outside the acquisition service.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pixels: RgbaImage,
    source: ImageSource,
    acquired_at: DateTime<Utc>,
}

impl CapturedImage {
    /// Wraps a decoded buffer, stamping it with the current time.
    #[must_use]
    pub fn new(pixels: RgbaImage, source: ImageSource) -> Self {
        Self {
            pixels,
            source,
            acquired_at: Utc::now(),
        }
    }

    /// Decodes encoded bytes (PNG or JPEG) into a new image.
    ///
    /// The format is guessed from the byte signature, not from any file name.
    ///
    /// # Errors
    ///
    /// Returns [`ArCanvasError::DecodeError`](super::ArCanvasError::DecodeError)
    /// when the bytes are not a supported image.
    pub fn decode(bytes: &[u8], source: ImageSource) -> super::Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::new(decoded.to_rgba8(), source))
    }

    /// Encodes the buffer as PNG for upload.
    ///
    /// # Errors
    ///
    /// Propagates encoder failures as `DecodeError`.
    pub fn encode_png(&self) -> super::Result<Vec<u8>> {
        let mut out = std::io::Cursor::new(Vec::new());
        self.pixels.write_to(&mut out, image::ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    #[must_use]
    pub const fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    #[must_use]
    pub const fn source(&self) -> ImageSource {
        self.source
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[must_use]
    pub const fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Lightweight snapshot published to the state machine.
    #[must_use]
    pub fn info(&self) -> ImageInfo {
        let (width, height) = self.dimensions();
        ImageInfo {
            width,
            height,
            source: self.source,
            acquired_at: self.acquired_at,
        }
    }
}

/// Read-only description of the held image.
///
/// This is what crosses from the acquisition service to the state machine, so
/// the pixel buffer itself keeps a single owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub source: ImageSource,
    pub acquired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_bytes_decode_with_source_tag() {
        let original = CapturedImage::new(
            RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255])),
            ImageSource::Captured,
        );
        let bytes = original.encode_png().unwrap();

        let decoded = CapturedImage::decode(&bytes, ImageSource::FetchedFromServer).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.source(), ImageSource::FetchedFromServer);
        assert_eq!(decoded.pixels().get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn info_snapshot_outlives_the_buffer() {
        let image = CapturedImage::new(
            RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 255])),
            ImageSource::LoadedFromDisk,
        );
        let info = image.info();
        let acquired_at = image.acquired_at();
        drop(image);

        assert_eq!((info.width, info.height), (4, 3));
        assert_eq!(info.source, ImageSource::LoadedFromDisk);
        assert_eq!(info.acquired_at, acquired_at);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = CapturedImage::decode(b"not an image", ImageSource::LoadedFromDisk).unwrap_err();
        assert!(matches!(err, crate::domain::ArCanvasError::DecodeError(_)));
    }
}
