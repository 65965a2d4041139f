//! Marker localization: detection decoding, the marker registry and the
//! start/stop lifecycle around the vendor tracker.
//!
//! # Modules
//!
//! - [`decode`]: Family-specific identifier decoding
//! - [`detector`]: Tracker control seam
//! - [`registry`]: Upserting registry keyed by identifier
//! - [`service`]: The [`MarkerLocalizer`] service
//! - [`settings`]: Tracker settings

pub mod decode;
pub mod detector;
pub mod registry;
pub mod service;
pub mod settings;

pub use detector::MarkerDetector;
pub use registry::{MarkerRegistry, Upsert};
pub use service::{Localized, MarkerLocalizer};
pub use settings::{ArucoDictionary, TrackerSettings, TrackingProfile};
