//! Domain layer for the AR canvas core.
//!
//! Plain data types shared by the services and the state machine, free of any
//! device, network or runtime concerns.
//!
//! # Organization
//!
//! - [`error`]: Error taxonomy and result alias
//! - [`image`]: Acquired image buffer and its published snapshot
//! - [`marker`]: Marker families, raw detections and tracked markers
//! - [`permission`]: Permission outcomes and their reduction
//! - [`transform`]: Canvas and registration transforms

pub mod error;
pub mod image;
pub mod marker;
pub mod permission;
pub mod transform;

pub use self::image::{CapturedImage, ImageInfo, ImageSource};
pub use error::{ArCanvasError, Result};
pub use marker::{MarkerKind, MarkerPayload, Pose, RawDetection, TrackedMarker};
pub use permission::{Permission, PermissionOutcome, PermissionSet};
pub use transform::{CanvasTransform, RegistrationTransform};
