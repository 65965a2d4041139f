//! Image acquisition: camera capture, disk loads and server transfers.
//!
//! All three acquisition paths produce the same [`CapturedImage`](crate::domain::CapturedImage).
//! The service holds at most one; confirming it for use is the only way an
//! image reaches the state machine.
//!
//! # Modules
//!
//! - [`camera`]: Device seam, stream settings and the capture pipeline steps
//! - [`cancel`]: Cancel token for suspended readiness polls
//! - [`disk`]: File loading with missing/corrupt distinction
//! - [`service`]: The [`ImageAcquisition`] service and its deferred jobs
//! - [`transport`]: Companion server seam and its HTTP client

pub mod camera;
pub mod cancel;
pub mod disk;
pub mod service;
pub mod transport;

pub use camera::{
    CameraDevice, CameraFrame, CameraHandle, CameraSettings, ConvergenceState, FrameMetadata,
    OutputFormat, StreamConfig,
};
pub use cancel::CancelToken;
pub use service::{AcquisitionJob, Completion, ImageAcquisition, JobOutcome, SessionProgress};
pub use transport::{HttpImageServer, ImageTransport, ServerSettings};
