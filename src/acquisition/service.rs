//! The image acquisition service.
//!
//! [`ImageAcquisition`] owns the camera session, the capture-in-progress guard
//! and the single held [`CapturedImage`]. Long-running work (device bring-up
//! and capture, server transfers) is split into a synchronous `begin_*` step
//! that validates and stamps an [`AcquisitionJob`], the job's async
//! [`run`](AcquisitionJob::run) which touches only device and network handles,
//! and [`complete`](ImageAcquisition::complete) which folds the outcome back
//! into the service. This lets the runtime keep servicing events while a job
//! is suspended, with no shared mutable state.
//!
//! Every job carries the service generation at the time it was issued.
//! [`stop`](ImageAcquisition::stop) bumps the generation, so results of jobs
//! that finish after the service was disabled are dropped instead of published.

use super::camera::{self, CameraDevice, CameraHandle, CameraSettings, StreamConfig};
use super::cancel::CancelToken;
use super::disk;
use super::transport::ImageTransport;
use crate::domain::{
    ArCanvasError, CapturedImage, ImageInfo, ImageSource, Permission, PermissionSet, Result,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Device session progress as observed by a capture job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionProgress {
    pub device_ready: bool,
    pub handle: Option<CameraHandle>,
    pub stream_configured: bool,
}

/// Deferred acquisition work issued by [`ImageAcquisition`].
pub enum AcquisitionJob {
    Capture(CaptureJob),
    Fetch(FetchJob),
    Send(SendJob),
    Gallery(GalleryJob),
}

/// Device bring-up (as far as still needed) followed by one capture cycle.
pub struct CaptureJob {
    generation: u64,
    camera: Arc<dyn CameraDevice>,
    session: SessionProgress,
    stream: StreamConfig,
    poll_interval: Duration,
    max_unconverged_frames: u32,
    cancel: CancelToken,
}

pub struct FetchJob {
    generation: u64,
    name: String,
    transport: Arc<dyn ImageTransport>,
}

pub struct SendJob {
    png: Vec<u8>,
    transport: Arc<dyn ImageTransport>,
}

pub struct GalleryJob {
    path_type: String,
    transport: Arc<dyn ImageTransport>,
}

/// Result of a finished [`AcquisitionJob`].
#[derive(Debug)]
pub enum JobOutcome {
    Captured {
        generation: u64,
        session: SessionProgress,
        result: Result<CapturedImage>,
    },
    Fetched {
        generation: u64,
        name: String,
        result: Result<CapturedImage>,
    },
    Sent(Result<()>),
    Gallery {
        path_type: String,
        result: Result<String>,
    },
}

/// What [`ImageAcquisition::complete`] did with an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A new image replaced the held one.
    Acquired(ImageInfo),
    /// The outcome belonged to an older generation and was dropped.
    Discarded,
    /// The image upload succeeded.
    Sent,
    /// The gallery listing arrived.
    Gallery(String),
}

impl AcquisitionJob {
    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Capture(_) => "capture",
            Self::Fetch(_) => "fetch",
            Self::Send(_) => "send",
            Self::Gallery(_) => "gallery",
        }
    }

    /// Performs the job's suspended work.
    pub async fn run(self) -> JobOutcome {
        match self {
            Self::Capture(job) => job.run().await,
            Self::Fetch(job) => JobOutcome::Fetched {
                generation: job.generation,
                result: fetch_and_decode(job.transport.as_ref(), &job.name).await,
                name: job.name,
            },
            Self::Send(job) => JobOutcome::Sent(job.transport.send_image(job.png).await),
            Self::Gallery(job) => JobOutcome::Gallery {
                result: job.transport.fetch_gallery(&job.path_type).await,
                path_type: job.path_type,
            },
        }
    }
}

impl CaptureJob {
    async fn run(self) -> JobOutcome {
        let mut session = self.session;
        let result = self.run_steps(&mut session).await;
        JobOutcome::Captured {
            generation: self.generation,
            session,
            result,
        }
    }

    async fn run_steps(&self, session: &mut SessionProgress) -> Result<CapturedImage> {
        let device = self.camera.as_ref();

        if !session.device_ready {
            camera::wait_until_available(device, self.poll_interval, &self.cancel).await?;
            session.device_ready = true;
        }

        let handle = match session.handle {
            Some(handle) => handle,
            None => {
                let handle = camera::open_session(device).await?;
                tracing::debug!(handle = handle.0, "camera device connected");
                session.handle = Some(handle);
                handle
            }
        };

        if !session.stream_configured {
            camera::configure(device, handle, &self.stream).await?;
            session.stream_configured = true;
        }

        camera::capture_converged(device, handle, self.max_unconverged_frames).await
    }
}

async fn fetch_and_decode(transport: &dyn ImageTransport, name: &str) -> Result<CapturedImage> {
    let bytes = transport.fetch_image(name).await?;
    CapturedImage::decode(&bytes, ImageSource::FetchedFromServer)
}

/// Image acquisition service.
///
/// Disabled until [`start`](Self::start). While disabled, every acquisition
/// path answers `ServiceDisabled`.
pub struct ImageAcquisition {
    camera: Arc<dyn CameraDevice>,
    transport: Arc<dyn ImageTransport>,
    settings: CameraSettings,
    image_directory: String,
    default_file: String,
    permissions: PermissionSet,
    enabled: bool,
    session: SessionProgress,
    capture_in_progress: bool,
    generation: u64,
    readiness: CancelToken,
    held: Option<CapturedImage>,
}

impl std::fmt::Debug for ImageAcquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAcquisition")
            .field("enabled", &self.enabled)
            .field("session", &self.session)
            .field("capture_in_progress", &self.capture_in_progress)
            .field("generation", &self.generation)
            .field("held", &self.held.as_ref().map(CapturedImage::info))
            .finish_non_exhaustive()
    }
}

impl ImageAcquisition {
    /// Creates a disabled service over the given device and transport.
    #[must_use]
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        transport: Arc<dyn ImageTransport>,
        settings: CameraSettings,
        image_directory: impl Into<String>,
        default_file: impl Into<String>,
    ) -> Self {
        Self {
            camera,
            transport,
            settings,
            image_directory: image_directory.into(),
            default_file: default_file.into(),
            permissions: PermissionSet::default(),
            enabled: false,
            session: SessionProgress::default(),
            capture_in_progress: false,
            generation: 0,
            readiness: CancelToken::new(),
            held: None,
        }
    }

    /// Installs the reduced permission outcomes gating capture and disk loads.
    pub fn set_permissions(&mut self, permissions: PermissionSet) {
        self.permissions = permissions;
    }

    pub fn start(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        tracing::debug!(generation = self.generation, "image acquisition started");
    }

    /// Disables the service.
    ///
    /// Outstanding jobs keep running but their results will be discarded, and
    /// any readiness poll is cancelled. The held image is kept; it is what the
    /// drawing session projects.
    pub fn stop(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.generation += 1;
        self.cancel_readiness();
        tracing::debug!(generation = self.generation, "image acquisition stopped");
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn capture_in_progress(&self) -> bool {
        self.capture_in_progress
    }

    #[must_use]
    pub const fn session(&self) -> SessionProgress {
        self.session
    }

    #[must_use]
    pub const fn held_image(&self) -> Option<&CapturedImage> {
        self.held.as_ref()
    }

    /// Cancels an outstanding device readiness poll, if any.
    pub fn cancel_readiness(&mut self) {
        self.readiness.cancel();
        self.readiness = CancelToken::new();
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(ArCanvasError::ServiceDisabled("image acquisition"))
        }
    }

    /// Polls device availability at the configured interval until ready.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled` when stopped, `PermissionDenied*` without the camera
    /// grant, `Cancelled` when [`cancel_readiness`](Self::cancel_readiness) or
    /// [`stop`](Self::stop) interrupts the poll.
    pub async fn request_device_ready(&mut self) -> Result<()> {
        self.ensure_enabled()?;
        self.permissions.require(Permission::Camera)?;
        if self.session.device_ready {
            return Ok(());
        }
        let cancel = self.readiness.clone();
        camera::wait_until_available(self.camera.as_ref(), self.settings.poll_interval(), &cancel)
            .await?;
        self.session.device_ready = true;
        Ok(())
    }

    /// Opens the device session. Reuses an existing session.
    ///
    /// # Errors
    ///
    /// `Unavailable` before readiness is confirmed, `ConnectionFailed` on a
    /// null handle.
    pub async fn connect(&mut self) -> Result<CameraHandle> {
        self.ensure_enabled()?;
        if let Some(handle) = self.session.handle {
            return Ok(handle);
        }
        if !self.session.device_ready {
            return Err(ArCanvasError::Unavailable(
                "camera readiness not confirmed".to_string(),
            ));
        }
        let handle = camera::open_session(self.camera.as_ref()).await?;
        self.session.handle = Some(handle);
        tracing::debug!(handle = handle.0, "camera device connected");
        Ok(handle)
    }

    /// Configures the capture stream once per session.
    ///
    /// # Errors
    ///
    /// `ConfigFailed` when not connected, when the stream is already
    /// configured, or when the device rejects the configuration.
    pub async fn configure_stream(&mut self, config: StreamConfig) -> Result<()> {
        self.ensure_enabled()?;
        let Some(handle) = self.session.handle else {
            return Err(ArCanvasError::ConfigFailed("camera not connected".to_string()));
        };
        if self.session.stream_configured {
            return Err(ArCanvasError::ConfigFailed(
                "stream already configured".to_string(),
            ));
        }
        camera::configure(self.camera.as_ref(), handle, &config).await?;
        self.session.stream_configured = true;
        self.settings.format = config.format;
        self.settings.width = config.width;
        self.settings.height = config.height;
        self.settings.frame_rate = config.frame_rate;
        Ok(())
    }

    /// Issues a capture job, bringing the device up first if needed.
    ///
    /// Sets the capture-in-progress guard; it is cleared when the outcome is
    /// handed to [`complete`](Self::complete).
    ///
    /// # Errors
    ///
    /// `CaptureInProgress` while another capture is outstanding (no state
    /// changes), `ServiceDisabled`, or a camera permission error.
    pub fn begin_capture(&mut self) -> Result<AcquisitionJob> {
        if self.capture_in_progress {
            return Err(ArCanvasError::CaptureInProgress);
        }
        self.ensure_enabled()?;
        self.permissions.require(Permission::Camera)?;

        self.capture_in_progress = true;
        tracing::debug!(generation = self.generation, "capture issued");
        Ok(AcquisitionJob::Capture(CaptureJob {
            generation: self.generation,
            camera: Arc::clone(&self.camera),
            session: self.session,
            stream: self.settings.stream_config(),
            poll_interval: self.settings.poll_interval(),
            max_unconverged_frames: self.settings.max_unconverged_frames,
            cancel: self.readiness.clone(),
        }))
    }

    /// Issues a server fetch for a named image. Not permission gated.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled` when stopped.
    pub fn begin_fetch(&self, name: &str) -> Result<AcquisitionJob> {
        self.ensure_enabled()?;
        Ok(AcquisitionJob::Fetch(FetchJob {
            generation: self.generation,
            name: name.to_string(),
            transport: Arc::clone(&self.transport),
        }))
    }

    /// Issues an upload of the held image, PNG encoded.
    ///
    /// # Errors
    ///
    /// `NoImage` when nothing is held; encoder failures as `DecodeError`.
    pub fn begin_send(&self) -> Result<AcquisitionJob> {
        let image = self.held.as_ref().ok_or(ArCanvasError::NoImage)?;
        let png = image.encode_png()?;
        Ok(AcquisitionJob::Send(SendJob {
            png,
            transport: Arc::clone(&self.transport),
        }))
    }

    #[must_use]
    pub fn begin_gallery(&self, path_type: &str) -> AcquisitionJob {
        AcquisitionJob::Gallery(GalleryJob {
            path_type: path_type.to_string(),
            transport: Arc::clone(&self.transport),
        })
    }

    /// Folds a finished job back into the service.
    ///
    /// Capture outcomes always clear the capture guard and record session
    /// progress, since the device state is real regardless of who still wants
    /// the frame. Image results from an older generation are discarded.
    ///
    /// # Errors
    ///
    /// The job's own failure. The held image is left untouched on failure.
    pub fn complete(&mut self, outcome: JobOutcome) -> Result<Completion> {
        match outcome {
            JobOutcome::Captured {
                generation,
                session,
                result,
            } => {
                self.capture_in_progress = false;
                self.session = session;
                self.publish(generation, result)
            }
            JobOutcome::Fetched {
                generation,
                name,
                result,
            } => {
                tracing::debug!(name = %name, ok = result.is_ok(), "fetch finished");
                self.publish(generation, result)
            }
            JobOutcome::Sent(result) => result.map(|()| Completion::Sent),
            JobOutcome::Gallery { path_type, result } => {
                let listing = result?;
                tracing::debug!(path_type = %path_type, bytes = listing.len(), "gallery received");
                Ok(Completion::Gallery(listing))
            }
        }
    }

    fn publish(&mut self, generation: u64, result: Result<CapturedImage>) -> Result<Completion> {
        if generation != self.generation || !self.enabled {
            tracing::debug!(
                job_generation = generation,
                generation = self.generation,
                "discarding stale acquisition result"
            );
            return Ok(Completion::Discarded);
        }
        let image = result?;
        let info = image.info();
        if let Some(previous) = self.held.replace(image) {
            tracing::trace!(previous = %previous.source(), "released previous image");
        }
        tracing::info!(source = %info.source, width = info.width, height = info.height, "image acquired");
        Ok(Completion::Acquired(info))
    }

    /// Runs a full capture cycle inline.
    ///
    /// # Errors
    ///
    /// See [`begin_capture`](Self::begin_capture) and the capture pipeline.
    pub async fn capture_once(&mut self) -> Result<ImageInfo> {
        let job = self.begin_capture()?;
        self.expect_image(job).await
    }

    /// Fetches a named image from the server inline.
    ///
    /// # Errors
    ///
    /// `NetworkError` on transport failure, `DecodeError` on a bad body.
    pub async fn fetch_from_server(&mut self, name: &str) -> Result<ImageInfo> {
        let job = self.begin_fetch(name)?;
        self.expect_image(job).await
    }

    async fn expect_image(&mut self, job: AcquisitionJob) -> Result<ImageInfo> {
        match self.complete(job.run().await)? {
            Completion::Acquired(info) => Ok(info),
            _ => Err(ArCanvasError::Cancelled),
        }
    }

    /// Loads an image file synchronously and makes it the held image.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled`, a storage permission error, `NotFound` or
    /// `DecodeError`.
    pub fn load_from_path(&mut self, path: &Path) -> Result<ImageInfo> {
        self.ensure_enabled()?;
        self.permissions.require(Permission::ExternalStorageRead)?;
        let image = disk::load_from_path(path)?;
        match self.publish(self.generation, Ok(image))? {
            Completion::Acquired(info) => Ok(info),
            _ => Err(ArCanvasError::Cancelled),
        }
    }

    /// Loads `file` (or the configured default) from the image directory.
    ///
    /// # Errors
    ///
    /// As [`load_from_path`](Self::load_from_path).
    pub fn load_file(&mut self, file: Option<&str>) -> Result<ImageInfo> {
        let path = crate::infrastructure::image_path(
            &self.image_directory,
            file.unwrap_or(&self.default_file),
        );
        self.load_from_path(&path)
    }

    /// Confirms the held image for use, the only way to publish it onward.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled` when stopped, `NoImage` when nothing is held.
    pub fn confirm_use(&self) -> Result<ImageInfo> {
        self.ensure_enabled()?;
        self.held
            .as_ref()
            .map(CapturedImage::info)
            .ok_or(ArCanvasError::NoImage)
    }

    /// Drops the held image.
    pub fn release(&mut self) {
        if self.held.take().is_some() {
            tracing::debug!("held image released");
        }
    }

    /// Stops the service and closes the device session.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.session.handle.take() {
            if let Err(e) = self.camera.disconnect(handle).await {
                tracing::warn!(error = %e, "camera disconnect failed");
            }
        }
        self.session = SessionProgress::default();
    }
}
