//! Actions representing side effects to be executed by the runtime.
//!
//! The event handler never touches a service directly. It mutates
//! [`AppState`](super::AppState) and returns a `Vec<Action>`; the runtime
//! executes those actions in order against the services it owns. Entry and
//! exit actions of mode transitions are expressed the same way.
//!
//! # Example
//!
//! ```rust
//! use arcanvas::app::Action;
//!
//! let actions = vec![Action::StopAcquisition, Action::StartLocalization];
//! assert_eq!(actions.len(), 2);
//! ```

use crate::domain::Pose;
use glam::{Quat, Vec3};

/// Commands executed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Enables the image acquisition service.
    StartAcquisition,
    /// Disables the image acquisition service; in-flight results are discarded.
    StopAcquisition,
    /// Issues a camera capture job.
    Capture,
    /// Loads an image file from the configured directory.
    LoadFromDisk {
        /// File name; the configured default when `None`.
        file: Option<String>,
    },
    /// Issues a server fetch job for a named image.
    Fetch {
        name: String,
    },
    /// Uploads the held image to the companion server.
    SendImage,
    /// Requests a gallery listing from the companion server.
    FetchGallery {
        path_type: String,
    },
    /// Asks the acquisition service to confirm the held image for use.
    ConfirmImage,
    /// Drops the held image.
    ReleaseImage,
    /// Cancels an outstanding camera readiness poll.
    CancelReadiness,

    /// Subscribes the localizer and starts the tracker scan.
    StartLocalization,
    /// Unsubscribes the localizer and stops the tracker scan.
    StopLocalization,
    /// Forgets all tracked markers.
    ClearMarkers,

    /// Unfreezes registration so the next sighting can place the canvas.
    Relocalize,
    /// Computes the canvas placement at a marker pose.
    PlaceCanvas {
        pose: Pose,
    },
    /// Lets the canvas collision volume accept drags.
    EnableAdjustment,
    /// Stops the canvas collision volume from accepting drags.
    DisableAdjustment,
    /// Applies a user drag to the placement.
    Adjust {
        translation: Vec3,
        rotation: Quat,
    },
    /// Drops the placement.
    ResetRegistration,

    /// Stops every service and tears down all listener registrations.
    Shutdown,
}
