//! Camera device seam and the capture pipeline steps.
//!
//! [`CameraDevice`] is the boundary to vendor camera hardware. The free
//! functions in this module implement the device bring-up and one-shot capture
//! sequence on top of it; they borrow only the device handle so the service can
//! run them either inline or as detached jobs.

use super::cancel::CancelToken;
use crate::domain::{ArCanvasError, CapturedImage, ImageSource, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Encoded format of frames produced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jpeg,
    Yuv420,
    Rgba8888,
}

/// Stream configuration passed to [`CameraDevice::prepare_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// Camera settings loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub format: OutputFormat,
    /// Delay between device availability polls.
    pub poll_interval_ms: u64,
    /// Frames captured before AE/AWB convergence that are discarded before
    /// the capture is reported as failed.
    pub max_unconverged_frames: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            frame_rate: 30,
            format: OutputFormat::Jpeg,
            poll_interval_ms: 1000,
            max_unconverged_frames: 30,
        }
    }
}

impl CameraSettings {
    #[must_use]
    pub const fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            format: self.format,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Auto-exposure / auto-white-balance state reported with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Inactive,
    Searching,
    Converged,
    Locked,
}

impl ConvergenceState {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Converged | Self::Locked)
    }
}

/// Per-frame metadata. Either field is `None` when the device could not read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub auto_exposure: Option<ConvergenceState>,
    pub auto_white_balance: Option<ConvergenceState>,
}

impl FrameMetadata {
    #[must_use]
    pub const fn settled() -> Self {
        Self {
            auto_exposure: Some(ConvergenceState::Converged),
            auto_white_balance: Some(ConvergenceState::Converged),
        }
    }

    /// Both AE and AWB were read and report Converged or Locked.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.auto_exposure.is_some_and(ConvergenceState::is_settled)
            && self.auto_white_balance.is_some_and(ConvergenceState::is_settled)
    }
}

/// One raw frame from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFrame {
    pub format: OutputFormat,
    pub data: Vec<u8>,
    pub metadata: FrameMetadata,
}

/// Opaque session handle returned by a successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub u64);

/// Vendor camera boundary.
///
/// Implementations wrap the platform camera API. All methods may suspend; none
/// of them is expected to be cancel-safe beyond what the platform offers, so
/// the service only cancels between calls.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Reports whether the main camera can be opened right now.
    async fn is_available(&self) -> Result<bool>;

    /// Opens a session. `None` means the platform handed back a null handle.
    async fn connect(&self) -> Result<Option<CameraHandle>>;

    /// Applies a stream configuration to the open session.
    async fn prepare_capture(&self, handle: CameraHandle, config: &StreamConfig) -> Result<()>;

    /// Runs the pre-capture AE/AWB sequence.
    async fn precapture_converge(&self, handle: CameraHandle) -> Result<()>;

    /// Captures a single frame.
    async fn capture_frame(&self, handle: CameraHandle) -> Result<CameraFrame>;

    /// Closes the session.
    async fn disconnect(&self, handle: CameraHandle) -> Result<()>;
}

/// Polls device availability until it reports ready or `cancel` fires.
///
/// Query errors count as "not yet available". There is no retry bound.
///
/// # Errors
///
/// Returns [`ArCanvasError::Cancelled`] when the token fires first.
pub async fn wait_until_available(
    device: &dyn CameraDevice,
    interval: Duration,
    cancel: &CancelToken,
) -> Result<()> {
    let mut attempts: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ArCanvasError::Cancelled);
        }
        attempts += 1;
        match device.is_available().await {
            Ok(true) => {
                tracing::debug!(attempts, "camera device available");
                return Ok(());
            }
            Ok(false) => tracing::trace!(attempts, "camera device not available yet"),
            Err(e) => tracing::debug!(attempts, error = %e, "camera availability query failed"),
        }

        tokio::select! {
            () = cancel.cancelled() => return Err(ArCanvasError::Cancelled),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

/// Opens a device session.
///
/// # Errors
///
/// `ConnectionFailed` when the platform returns a null handle; device errors
/// otherwise propagate unchanged.
pub async fn open_session(device: &dyn CameraDevice) -> Result<CameraHandle> {
    device
        .connect()
        .await?
        .ok_or_else(|| ArCanvasError::ConnectionFailed("camera returned a null handle".to_string()))
}

/// Applies the stream configuration, mapping device errors to `ConfigFailed`.
///
/// # Errors
///
/// `ConfigFailed` carrying the device's reason.
pub async fn configure(
    device: &dyn CameraDevice,
    handle: CameraHandle,
    config: &StreamConfig,
) -> Result<()> {
    device
        .prepare_capture(handle, config)
        .await
        .map_err(|e| match e {
            ArCanvasError::ConfigFailed(_) => e,
            other => ArCanvasError::ConfigFailed(other.to_string()),
        })
}

/// Runs one capture cycle and decodes the first converged JPEG frame.
///
/// Frames whose AE/AWB state has not settled, or that arrive in a format other
/// than JPEG, are dropped without surfacing. After `max_unconverged` dropped
/// frames the cycle gives up.
///
/// # Errors
///
/// `CaptureFailed` when pre-capture fails, the device errors, the frame limit
/// is hit, or the accepted JPEG does not decode.
pub async fn capture_converged(
    device: &dyn CameraDevice,
    handle: CameraHandle,
    max_unconverged: u32,
) -> Result<CapturedImage> {
    device
        .precapture_converge(handle)
        .await
        .map_err(|e| ArCanvasError::CaptureFailed(format!("pre-capture: {e}")))?;

    let mut discarded: u32 = 0;
    loop {
        let frame = device
            .capture_frame(handle)
            .await
            .map_err(|e| ArCanvasError::CaptureFailed(e.to_string()))?;

        if frame.metadata.is_converged() && frame.format == OutputFormat::Jpeg {
            return CapturedImage::decode(&frame.data, ImageSource::Captured)
                .map_err(|e| ArCanvasError::CaptureFailed(e.to_string()));
        }

        discarded += 1;
        tracing::trace!(discarded, format = ?frame.format, metadata = ?frame.metadata, "discarding frame");
        if discarded >= max_unconverged {
            return Err(ArCanvasError::CaptureFailed(format!(
                "no converged JPEG frame after {discarded} frames"
            )));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn availability_is_polled_until_ready() {
        let camera = MockCamera::default();
        camera.unavailable_polls.store(3, Ordering::SeqCst);

        wait_until_available(&camera, Duration::from_secs(1), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(camera.availability_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn availability_poll_stops_on_cancel() {
        let camera = MockCamera::default();
        camera.unavailable_polls.store(u32::MAX, Ordering::SeqCst);
        let cancel = CancelToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            canceller.cancel();
        });

        let err = wait_until_available(&camera, Duration::from_secs(1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ArCanvasError::Cancelled));
        assert_eq!(camera.availability_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn null_handle_is_a_connection_failure() {
        let camera = MockCamera {
            null_handle: true,
            ..MockCamera::default()
        };
        assert!(matches!(
            open_session(&camera).await,
            Err(ArCanvasError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn prepare_errors_become_config_failures() {
        let camera = MockCamera {
            fail_prepare: true,
            ..MockCamera::default()
        };
        let config = CameraSettings::default().stream_config();
        assert!(matches!(
            configure(&camera, CameraHandle(1), &config).await,
            Err(ArCanvasError::ConfigFailed(_))
        ));
    }

    #[tokio::test]
    async fn unconverged_frames_are_skipped() {
        let camera =
            MockCamera::with_frames([searching_jpeg(), searching_jpeg(), converged_jpeg()]);

        let image = capture_converged(&camera, CameraHandle(1), 10).await.unwrap();
        assert_eq!(image.source(), ImageSource::Captured);
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(camera.captures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_jpeg_frames_are_skipped() {
        let raw = CameraFrame {
            format: OutputFormat::Yuv420,
            data: vec![0; 16],
            metadata: FrameMetadata::settled(),
        };
        let camera = MockCamera::with_frames([raw, converged_jpeg()]);
        assert!(capture_converged(&camera, CameraHandle(1), 10).await.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_frame_limit() {
        let camera =
            MockCamera::with_frames([searching_jpeg(), searching_jpeg(), converged_jpeg()]);
        let err = capture_converged(&camera, CameraHandle(1), 2).await.unwrap_err();
        assert!(matches!(err, ArCanvasError::CaptureFailed(_)));
        assert_eq!(camera.captures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_metadata_never_converges() {
        let meta = FrameMetadata {
            auto_exposure: None,
            auto_white_balance: Some(ConvergenceState::Locked),
        };
        assert!(!meta.is_converged());
        assert!(FrameMetadata {
            auto_exposure: Some(ConvergenceState::Locked),
            auto_white_balance: Some(ConvergenceState::Converged),
        }
        .is_converged());
    }
}
