//! Error types for the AR canvas core.
//!
//! This module defines the centralized error type [`ArCanvasError`] and a type alias
//! [`Result`] used throughout the crate. Errors are derived with `thiserror`.
//!
//! No variant is fatal to the process: acquisition, localization and network
//! failures are logged by the runtime and the application stays in its current
//! state so the user can retry.

use thiserror::Error;

/// The main error type for AR canvas operations.
///
/// The first group of variants mirrors the failure taxonomy of the device and
/// network collaborators; the remaining variants describe guard violations inside
/// the services themselves.
///
/// # Examples
///
/// ```
/// use arcanvas::domain::ArCanvasError;
///
/// fn open_camera(handle: Option<u32>) -> Result<u32, ArCanvasError> {
///     handle.ok_or_else(|| ArCanvasError::ConnectionFailed("null device handle".to_string()))
/// }
///
/// assert!(open_camera(None).is_err());
/// ```
#[derive(Debug, Error)]
pub enum ArCanvasError {
    /// Resource is not ready yet; the caller may retry.
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    /// Opening a session with the capture device failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Configuring the capture stream failed or was attempted twice.
    #[error("Stream configuration failed: {0}")]
    ConfigFailed(String),

    /// A capture cycle did not produce a usable frame.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// A capture was requested while another one is outstanding.
    ///
    /// Concurrent capture requests are rejected, never queued.
    #[error("Capture already in progress")]
    CaptureInProgress,

    /// The requested file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bytes were read but could not be decoded into a pixel buffer.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Transport-level failure talking to the companion image server.
    ///
    /// Terminal per request; there is no automatic retry.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A required capability was denied for this session.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A required capability was denied and the platform will not ask again.
    #[error("Permission permanently denied: {0}")]
    PermissionDeniedPermanently(String),

    /// Operation issued against a service that has not been started.
    #[error("Service disabled: {0}")]
    ServiceDisabled(&'static str),

    /// Manual drag attempted while the adjustment volume is disabled.
    #[error("Manual adjustment is locked")]
    AdjustmentLocked,

    /// An event source attempted to register a second listener.
    #[error("Event source already registered: {0}")]
    AlreadyRegistered(String),

    /// A suspended operation was cancelled by its owner.
    #[error("Operation cancelled")]
    Cancelled,

    /// An operation that needs an acquired image found none.
    #[error("No image held")]
    NoImage,

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArCanvasError {
    /// Returns whether the user can reasonably retry the failed operation.
    ///
    /// # Example
    ///
    /// ```
    /// use arcanvas::domain::ArCanvasError;
    ///
    /// assert!(ArCanvasError::CaptureInProgress.is_retryable());
    /// assert!(!ArCanvasError::NotFound("a.jpg".into()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::NetworkError(_) | Self::CaptureInProgress
        )
    }
}

impl From<reqwest::Error> for ArCanvasError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<image::ImageError> for ArCanvasError {
    fn from(err: image::ImageError) -> Self {
        Self::DecodeError(err.to_string())
    }
}

/// A specialized `Result` type for AR canvas operations.
pub type Result<T> = std::result::Result<T, ArCanvasError>;
