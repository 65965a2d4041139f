//! Software stand-ins for the device boundaries.
//!
//! The shell binary runs without camera, tracker or permission prompts: the
//! camera serves a fixed JPEG, the tracker's detections are typed in by the
//! user, and permissions are answered from a table.

use crate::acquisition::{
    CameraDevice, CameraFrame, CameraHandle, ConvergenceState, FrameMetadata, ImageTransport,
    OutputFormat, StreamConfig,
};
use crate::app::PermissionProvider;
use crate::domain::{ArCanvasError, Permission, PermissionOutcome, Result};
use crate::localization::{MarkerDetector, TrackerSettings};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Camera that always returns the same JPEG.
///
/// After every stream configuration the first `warmup_frames` frames report
/// auto-exposure as still searching, as a real sensor does after start-up.
#[derive(Debug)]
pub struct StillCamera {
    jpeg: Option<Vec<u8>>,
    warmup_frames: u32,
    frames_since_prepare: AtomicU32,
    next_handle: AtomicU64,
    connected: AtomicBool,
}

impl StillCamera {
    #[must_use]
    pub const fn new(jpeg: Vec<u8>, warmup_frames: u32) -> Self {
        Self {
            jpeg: Some(jpeg),
            warmup_frames,
            frames_since_prepare: AtomicU32::new(0),
            next_handle: AtomicU64::new(1),
            connected: AtomicBool::new(false),
        }
    }

    /// A camera that never becomes available.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            jpeg: None,
            warmup_frames: 0,
            frames_since_prepare: AtomicU32::new(0),
            next_handle: AtomicU64::new(1),
            connected: AtomicBool::new(false),
        }
    }

    /// Serves the JPEG stored at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file does not exist, `Io` when it cannot be read.
    pub fn from_file(path: &Path, warmup_frames: u32) -> Result<Self> {
        if !path.exists() {
            return Err(ArCanvasError::NotFound(path.display().to_string()));
        }
        Ok(Self::new(std::fs::read(path)?, warmup_frames))
    }

    /// Serves a generated checkerboard test card.
    ///
    /// # Errors
    ///
    /// `DecodeError` if JPEG encoding fails.
    pub fn test_card(width: u32, height: u32, warmup_frames: u32) -> Result<Self> {
        let card = RgbImage::from_fn(width, height, |x, y| {
            if (x / 32 + y / 32) % 2 == 0 {
                Rgb([235, 235, 235])
            } else {
                Rgb([40, 40, 40])
            }
        });
        let mut out = Cursor::new(Vec::new());
        card.write_to(&mut out, ImageFormat::Jpeg)?;
        Ok(Self::new(out.into_inner(), warmup_frames))
    }
}

#[async_trait]
impl CameraDevice for StillCamera {
    async fn is_available(&self) -> Result<bool> {
        Ok(self.jpeg.is_some())
    }

    async fn connect(&self) -> Result<Option<CameraHandle>> {
        if self.jpeg.is_none() {
            return Ok(None);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(Some(CameraHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))))
    }

    async fn prepare_capture(&self, _handle: CameraHandle, config: &StreamConfig) -> Result<()> {
        if config.format != OutputFormat::Jpeg {
            return Err(ArCanvasError::Unavailable(format!(
                "still camera only produces JPEG, not {:?}",
                config.format
            )));
        }
        self.frames_since_prepare.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn precapture_converge(&self, _handle: CameraHandle) -> Result<()> {
        Ok(())
    }

    async fn capture_frame(&self, _handle: CameraHandle) -> Result<CameraFrame> {
        let jpeg = self
            .jpeg
            .as_ref()
            .ok_or_else(|| ArCanvasError::CaptureFailed("no sensor".into()))?;
        let n = self.frames_since_prepare.fetch_add(1, Ordering::SeqCst);
        let metadata = if n < self.warmup_frames {
            FrameMetadata {
                auto_exposure: Some(ConvergenceState::Searching),
                auto_white_balance: Some(ConvergenceState::Searching),
            }
        } else {
            FrameMetadata::settled()
        };
        Ok(CameraFrame {
            format: OutputFormat::Jpeg,
            data: jpeg.clone(),
            metadata,
        })
    }

    async fn disconnect(&self, _handle: CameraHandle) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Tracker whose detections are entered by hand.
///
/// Scanning only toggles a flag; detections reach the runtime through the
/// event bus.
#[derive(Debug, Default)]
pub struct ManualDetector {
    scanning: AtomicBool,
}

impl ManualDetector {
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarkerDetector for ManualDetector {
    async fn apply_settings(&self, settings: &TrackerSettings) -> Result<()> {
        tracing::info!(
            kind = %settings.kind,
            dictionary = ?settings.aruco_dictionary,
            profile = ?settings.profile,
            "tracker settings applied"
        );
        Ok(())
    }

    async fn start_scanning(&self) -> Result<()> {
        self.scanning.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<()> {
        self.scanning.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers permission prompts from a fixed table. Unlisted permissions are
/// denied.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    answers: HashMap<Permission, PermissionOutcome>,
}

impl StaticPermissions {
    #[must_use]
    pub fn granting_all() -> Self {
        Self::default().with_all(PermissionOutcome::Granted)
    }

    #[must_use]
    pub fn with_all(mut self, outcome: PermissionOutcome) -> Self {
        for permission in Permission::ALL {
            self.answers.insert(permission, outcome);
        }
        self
    }

    #[must_use]
    pub fn with(mut self, permission: Permission, outcome: PermissionOutcome) -> Self {
        self.answers.insert(permission, outcome);
        self
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    async fn request(&self, permission: Permission) -> PermissionOutcome {
        self.answers
            .get(&permission)
            .copied()
            .unwrap_or(PermissionOutcome::Denied)
    }
}

/// Server client for running without a network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineServer;

#[async_trait]
impl ImageTransport for OfflineServer {
    async fn send_image(&self, _png: Vec<u8>) -> Result<()> {
        Err(ArCanvasError::NetworkError("offline".into()))
    }

    async fn fetch_image(&self, name: &str) -> Result<Vec<u8>> {
        Err(ArCanvasError::NetworkError(format!("offline, cannot fetch {name}")))
    }

    async fn fetch_gallery(&self, _path_type: &str) -> Result<String> {
        Err(ArCanvasError::NetworkError("offline".into()))
    }
}
