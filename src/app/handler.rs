//! Event handling and state transition logic.
//!
//! [`handle_event`] is the only place where events change the application
//! mode. It validates each event against the current mode, mutates
//! [`AppState`] and returns the actions the runtime must execute. Events that
//! make no sense in the current mode are logged and ignored; nothing here is
//! fatal.
//!
//! # Event Types
//!
//! - **User commands**: capture, load, fetch, send, gallery, use image, fix,
//!   relocalize, adjust, reset, cancel, quit
//! - **Service signals**: permissions resolved, image acquired, acquisition
//!   failed, image confirmed, marker localized
//!
//! # Example
//!
//! ```rust
//! use arcanvas::app::{handle_event, Action, AppState, Event};
//!
//! let mut state = AppState::new();
//! state.enter_initial();
//! state.ready = true;
//!
//! let (_, actions) = handle_event(&mut state, &Event::CaptureRequested)?;
//! assert_eq!(actions, vec![Action::Capture]);
//! # Ok::<(), arcanvas::ArCanvasError>(())
//! ```

use super::modes::{AppMode, DrawingPhase};
use crate::app::{Action, AppState};
use crate::domain::error::Result;
use crate::domain::{ImageInfo, TrackedMarker};
use glam::{Quat, Vec3};

/// Events from the user, the platform, or the services.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Capture an image with the camera (also "capture again").
    CaptureRequested,
    /// Load an image file; the configured default when `file` is `None`.
    LoadFromDiskRequested {
        file: Option<String>,
    },
    /// Fetch a named image from the companion server.
    FetchRequested {
        name: String,
    },
    /// Upload the held image to the companion server.
    SendImageRequested,
    /// List the server gallery for a path type.
    GalleryRequested {
        path_type: String,
    },
    /// Use the acquired image for drawing.
    UseImageRequested,
    /// Lock the current canvas placement.
    FixPositionRequested,
    /// Re-acquire a marker pose for a fresh placement.
    RelocalizeRequested,
    /// Drag the canvas while placing.
    AdjustRequested {
        translation: Vec3,
        rotation: Quat,
    },
    /// End the drawing session and pick another image.
    ResetRequested,
    /// Cancel a pending camera readiness poll.
    CancelRequested,
    /// Shut the application down.
    QuitRequested,

    /// All permission answers collected and reduced.
    PermissionsResolved {
        ready: bool,
        plane_detection: bool,
    },
    /// An acquisition path produced a new held image.
    ImageAcquired(ImageInfo),
    /// An acquisition path or transfer failed.
    AcquisitionFailed {
        reason: String,
    },
    /// The acquisition service confirmed the held image for use.
    ImageConfirmed(ImageInfo),
    /// The localizer accepted a pose-capable sighting.
    MarkerLocalized(TrackedMarker),
}

impl Event {
    /// Short name for spans.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CaptureRequested => "capture",
            Self::LoadFromDiskRequested { .. } => "load",
            Self::FetchRequested { .. } => "fetch",
            Self::SendImageRequested => "send",
            Self::GalleryRequested { .. } => "gallery",
            Self::UseImageRequested => "use_image",
            Self::FixPositionRequested => "fix",
            Self::RelocalizeRequested => "relocalize",
            Self::AdjustRequested { .. } => "adjust",
            Self::ResetRequested => "reset",
            Self::CancelRequested => "cancel",
            Self::QuitRequested => "quit",
            Self::PermissionsResolved { .. } => "permissions_resolved",
            Self::ImageAcquired(_) => "image_acquired",
            Self::AcquisitionFailed { .. } => "acquisition_failed",
            Self::ImageConfirmed(_) => "image_confirmed",
            Self::MarkerLocalized(_) => "marker_localized",
        }
    }
}

/// Processes an event, mutates application state, and returns actions to execute.
///
/// # Parameters
///
/// * `state` - Mutable reference to application state
/// * `event` - Event to process
///
/// # Returns
///
/// `(controls_changed, actions)`: whether the control panel may have changed
/// and the actions to execute in order.
///
/// # Errors
///
/// Reserved for invariant violations; every event currently handled returns
/// `Ok`, ignoring events that do not apply to the current mode.
#[allow(clippy::too_many_lines)]
pub fn handle_event(state: &mut AppState, event: &Event) -> Result<(bool, Vec<Action>)> {
    let _span = tracing::debug_span!("handle_event", event = event.name(), mode = %state.mode()).entered();

    let mode = state.mode();
    let selecting = mode == AppMode::SelectingImage;

    match event {
        Event::PermissionsResolved {
            ready,
            plane_detection,
        } => {
            state.ready = *ready;
            state.plane_detection = *plane_detection;
            if *ready {
                tracing::info!(plane_detection, "all required permissions granted");
            } else {
                tracing::warn!("at least one required permission was not granted");
            }
            Ok((false, vec![]))
        }

        Event::CaptureRequested | Event::LoadFromDiskRequested { .. } if !selecting => {
            tracing::debug!("acquisition request outside image selection ignored");
            Ok((false, vec![]))
        }
        Event::CaptureRequested | Event::LoadFromDiskRequested { .. } if !state.ready => {
            tracing::warn!("unable to acquire image, permissions not granted");
            Ok((false, vec![]))
        }
        Event::CaptureRequested => Ok((false, vec![Action::Capture])),
        Event::LoadFromDiskRequested { file } => {
            Ok((false, vec![Action::LoadFromDisk { file: file.clone() }]))
        }

        Event::FetchRequested { name } => {
            if !selecting {
                tracing::debug!("fetch outside image selection ignored");
                return Ok((false, vec![]));
            }
            Ok((false, vec![Action::Fetch { name: name.clone() }]))
        }
        Event::SendImageRequested => Ok((false, vec![Action::SendImage])),
        Event::GalleryRequested { path_type } => Ok((
            false,
            vec![Action::FetchGallery {
                path_type: path_type.clone(),
            }],
        )),

        Event::ImageAcquired(info) => {
            if !selecting {
                tracing::debug!("image acquired after leaving selection, not offered");
                return Ok((false, vec![]));
            }
            state.pending_image = Some(*info);
            state.controls.use_image_enabled = true;
            Ok((true, vec![]))
        }
        Event::AcquisitionFailed { reason } => {
            tracing::warn!(reason = %reason, "acquisition failed, staying in current mode");
            Ok((false, vec![]))
        }

        Event::UseImageRequested => {
            if !selecting || !state.controls.use_image_enabled {
                tracing::debug!("use image ignored, nothing to use");
                return Ok((false, vec![]));
            }
            Ok((false, vec![Action::ConfirmImage]))
        }
        Event::ImageConfirmed(info) => {
            if !selecting {
                return Ok((false, vec![]));
            }
            state.active_image = Some(*info);
            let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
            Ok((true, actions))
        }

        Event::MarkerLocalized(marker) => {
            if mode != AppMode::Drawing(DrawingPhase::Localizing) {
                tracing::trace!(id = %marker.id, "sighting outside localization ignored");
                return Ok((false, vec![]));
            }
            tracing::info!(id = %marker.id, "marker localized, placing canvas");
            state.localized_marker = Some(marker.clone());
            let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Placing));
            Ok((true, actions))
        }

        Event::FixPositionRequested => {
            if mode != AppMode::Drawing(DrawingPhase::Placing) {
                tracing::debug!("fix requested outside placement ignored");
                return Ok((false, vec![]));
            }
            Ok((true, state.transition_to(AppMode::Drawing(DrawingPhase::Fixed))))
        }
        Event::RelocalizeRequested => {
            if mode != AppMode::Drawing(DrawingPhase::Fixed) {
                tracing::debug!("relocalize requested before placement was fixed, ignored");
                return Ok((false, vec![]));
            }
            Ok((true, state.transition_to(AppMode::Drawing(DrawingPhase::Localizing))))
        }
        Event::AdjustRequested {
            translation,
            rotation,
        } => {
            if mode != AppMode::Drawing(DrawingPhase::Placing) {
                tracing::debug!("adjustment outside placement ignored");
                return Ok((false, vec![]));
            }
            Ok((
                false,
                vec![Action::Adjust {
                    translation: *translation,
                    rotation: *rotation,
                }],
            ))
        }
        Event::ResetRequested => {
            if !mode.is_drawing() {
                return Ok((false, vec![]));
            }
            Ok((true, state.transition_to(AppMode::SelectingImage)))
        }

        Event::CancelRequested => Ok((false, vec![Action::CancelReadiness])),
        Event::QuitRequested => Ok((false, vec![Action::Shutdown])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImageSource, MarkerKind, Pose};

    fn info() -> ImageInfo {
        ImageInfo {
            width: 4,
            height: 4,
            source: ImageSource::LoadedFromDisk,
            acquired_at: chrono::Utc::now(),
        }
    }

    fn marker(id: &str) -> TrackedMarker {
        TrackedMarker {
            id: id.into(),
            kind: MarkerKind::Qr,
            pose: Pose::default(),
            size: 0.05,
            sightings: 1,
        }
    }

    fn ready_state() -> AppState {
        let mut state = AppState::new();
        state.enter_initial();
        handle_event(
            &mut state,
            &Event::PermissionsResolved {
                ready: true,
                plane_detection: false,
            },
        )
        .unwrap();
        state
    }

    fn drawing_state() -> AppState {
        let mut state = ready_state();
        handle_event(&mut state, &Event::ImageAcquired(info())).unwrap();
        handle_event(&mut state, &Event::ImageConfirmed(info())).unwrap();
        state
    }

    #[test]
    fn capture_needs_readiness() {
        let mut state = AppState::new();
        state.enter_initial();
        let (_, actions) = handle_event(&mut state, &Event::CaptureRequested).unwrap();
        assert!(actions.is_empty());

        let mut state = ready_state();
        let (_, actions) = handle_event(&mut state, &Event::CaptureRequested).unwrap();
        assert_eq!(actions, vec![Action::Capture]);
    }

    #[test]
    fn fetch_is_not_permission_gated() {
        let mut state = AppState::new();
        state.enter_initial();
        let (_, actions) = handle_event(
            &mut state,
            &Event::FetchRequested {
                name: "x.png".into(),
            },
        )
        .unwrap();
        assert_eq!(actions, vec![Action::Fetch { name: "x.png".into() }]);
    }

    #[test]
    fn use_image_requires_an_acquired_image() {
        let mut state = ready_state();
        let (_, actions) = handle_event(&mut state, &Event::UseImageRequested).unwrap();
        assert!(actions.is_empty());

        let (changed, _) = handle_event(&mut state, &Event::ImageAcquired(info())).unwrap();
        assert!(changed);
        assert!(state.controls.use_image_enabled);
        let (_, actions) = handle_event(&mut state, &Event::UseImageRequested).unwrap();
        assert_eq!(actions, vec![Action::ConfirmImage]);
    }

    #[test]
    fn confirmation_enters_localizing() {
        let state = drawing_state();
        assert_eq!(state.mode(), AppMode::Drawing(DrawingPhase::Localizing));
        assert!(state.active_image.is_some());
        assert!(!state.controls.use_image_enabled);
    }

    #[test]
    fn only_first_sighting_places() {
        let mut state = drawing_state();
        let (_, first) = handle_event(&mut state, &Event::MarkerLocalized(marker("a"))).unwrap();
        let (_, second) = handle_event(&mut state, &Event::MarkerLocalized(marker("b"))).unwrap();

        assert!(first.iter().any(|a| matches!(a, Action::PlaceCanvas { .. })));
        assert!(second.is_empty());
        assert_eq!(state.localized_marker.as_ref().map(|m| m.id.as_str()), Some("a"));
    }

    #[test]
    fn relocalize_only_from_fixed() {
        let mut state = drawing_state();
        handle_event(&mut state, &Event::MarkerLocalized(marker("a"))).unwrap();

        let (_, actions) = handle_event(&mut state, &Event::RelocalizeRequested).unwrap();
        assert!(actions.is_empty());

        handle_event(&mut state, &Event::FixPositionRequested).unwrap();
        let (_, actions) = handle_event(&mut state, &Event::RelocalizeRequested).unwrap();
        assert!(actions.contains(&Action::StartLocalization));
        assert_eq!(state.mode(), AppMode::Drawing(DrawingPhase::Localizing));
    }

    #[test]
    fn adjustment_only_while_placing() {
        let mut state = drawing_state();
        let adjust = Event::AdjustRequested {
            translation: Vec3::X,
            rotation: Quat::IDENTITY,
        };
        assert!(handle_event(&mut state, &adjust).unwrap().1.is_empty());

        handle_event(&mut state, &Event::MarkerLocalized(marker("a"))).unwrap();
        assert_eq!(handle_event(&mut state, &adjust).unwrap().1.len(), 1);

        handle_event(&mut state, &Event::FixPositionRequested).unwrap();
        assert!(handle_event(&mut state, &adjust).unwrap().1.is_empty());
    }

    #[test]
    fn late_acquisition_is_not_offered_while_drawing() {
        let mut state = drawing_state();
        handle_event(&mut state, &Event::ImageAcquired(info())).unwrap();
        assert!(state.pending_image.is_none());
        assert!(!state.controls.use_image_enabled);
    }

    #[test]
    fn reset_returns_to_selection() {
        let mut state = drawing_state();
        let (_, actions) = handle_event(&mut state, &Event::ResetRequested).unwrap();
        assert_eq!(state.mode(), AppMode::SelectingImage);
        assert_eq!(actions.last(), Some(&Action::StartAcquisition));
    }

    #[test]
    fn failures_do_not_change_mode() {
        let mut state = ready_state();
        handle_event(
            &mut state,
            &Event::AcquisitionFailed {
                reason: "camera gone".into(),
            },
        )
        .unwrap();
        assert_eq!(state.mode(), AppMode::SelectingImage);
    }
}
