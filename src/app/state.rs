//! Application state and the mode transition table.
//!
//! [`AppState`] is the single source of truth for which mode is active, what
//! image was confirmed, which marker placed the canvas and which controls are
//! visible. It never talks to a service: every transition returns the exit and
//! entry [`Action`]s for the runtime to execute.
//!
//! # Transition Table
//!
//! | Mode                 | Entry actions                               | Exit actions                                   |
//! |----------------------|---------------------------------------------|------------------------------------------------|
//! | `SelectingImage`     | start acquisition                           | stop acquisition                               |
//! | `Drawing` (any)      | (phase entry)                               | reset registration, clear markers, release image |
//! | `Localizing`         | relocalize, start localization              | stop localization                              |
//! | `Placing`            | place canvas, enable adjustment, show fix   | hide fix                                       |
//! | `Fixed`              | disable adjustment, show drawing controls   | hide drawing controls                          |
//!
//! A transition to the mode already active runs nothing.
//!
//! # Example
//!
//! ```rust
//! use arcanvas::app::{Action, AppState};
//! use arcanvas::app::modes::{AppMode, DrawingPhase};
//!
//! let mut state = AppState::new();
//! assert_eq!(state.enter_initial(), vec![Action::StartAcquisition]);
//!
//! let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
//! assert_eq!(actions[0], Action::StopAcquisition);
//! assert!(state.transition_to(AppMode::Drawing(DrawingPhase::Localizing)).is_empty());
//! ```

use super::controls::ControlPanel;
use super::modes::{AppMode, DrawingPhase};
use super::Action;
use crate::domain::{ImageInfo, TrackedMarker};

/// Central application state container.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    mode: AppMode,
    initialized: bool,

    /// Readiness reduced from camera and storage permissions.
    pub ready: bool,

    /// Whether spatial mapping was granted; only reported.
    pub plane_detection: bool,

    /// Image acquired but not yet confirmed.
    pub pending_image: Option<ImageInfo>,

    /// Image confirmed for the current drawing session.
    pub active_image: Option<ImageInfo>,

    /// Marker whose pose placed (or is about to place) the canvas.
    pub localized_marker: Option<TrackedMarker>,

    /// Control visibility.
    pub controls: ControlPanel,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates the state before startup. No mode is entered yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: AppMode::SelectingImage,
            initialized: false,
            ready: false,
            plane_detection: false,
            pending_image: None,
            active_image: None,
            localized_marker: None,
            controls: ControlPanel::default(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> AppMode {
        self.mode
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Enters the initial mode. Only the first call returns actions.
    pub fn enter_initial(&mut self) -> Vec<Action> {
        if self.initialized {
            return vec![];
        }
        self.initialized = true;
        self.mode = AppMode::SelectingImage;
        tracing::info!(mode = %self.mode, "entered initial mode");

        let mut actions = Vec::new();
        self.run_entry(None, self.mode, &mut actions);
        actions
    }

    /// Moves to `target`, returning exit actions of the old mode followed by
    /// entry actions of the new one.
    ///
    /// Requesting the current mode is a no-op, as is any transition before
    /// [`enter_initial`](Self::enter_initial).
    pub fn transition_to(&mut self, target: AppMode) -> Vec<Action> {
        if !self.initialized {
            tracing::debug!(target = %target, "transition before startup ignored");
            return vec![];
        }
        if target == self.mode {
            tracing::trace!(mode = %target, "same-mode transition ignored");
            return vec![];
        }

        let _span = tracing::debug_span!("transition", from = %self.mode, to = %target).entered();

        let from = self.mode;
        let mut actions = Vec::new();
        self.run_exit(from, target, &mut actions);
        self.mode = target;
        self.run_entry(Some(from), target, &mut actions);

        tracing::info!(from = %from, to = %target, actions = actions.len(), "mode changed");
        actions
    }

    fn run_exit(&mut self, from: AppMode, to: AppMode, actions: &mut Vec<Action>) {
        match from {
            AppMode::SelectingImage => {
                actions.push(Action::StopAcquisition);
                self.controls.use_image_enabled = false;
                self.pending_image = None;
            }
            AppMode::Drawing(phase) => {
                self.exit_phase(phase, actions);
                if !to.is_drawing() {
                    actions.extend([
                        Action::ResetRegistration,
                        Action::ClearMarkers,
                        Action::ReleaseImage,
                    ]);
                    self.active_image = None;
                    self.localized_marker = None;
                }
            }
        }
    }

    fn run_entry(&mut self, from: Option<AppMode>, to: AppMode, actions: &mut Vec<Action>) {
        match to {
            AppMode::SelectingImage => actions.push(Action::StartAcquisition),
            AppMode::Drawing(phase) => {
                if from.is_some_and(|f| !f.is_drawing()) {
                    tracing::debug!(image = ?self.active_image, "drawing session started");
                }
                self.enter_phase(phase, actions);
            }
        }
    }

    fn exit_phase(&mut self, phase: DrawingPhase, actions: &mut Vec<Action>) {
        match phase {
            DrawingPhase::Localizing => actions.push(Action::StopLocalization),
            DrawingPhase::Placing => self.controls.fix_visible = false,
            DrawingPhase::Fixed => self.controls.drawing_controls_visible = false,
        }
    }

    fn enter_phase(&mut self, phase: DrawingPhase, actions: &mut Vec<Action>) {
        match phase {
            DrawingPhase::Localizing => {
                actions.extend([Action::Relocalize, Action::StartLocalization]);
            }
            DrawingPhase::Placing => {
                if let Some(marker) = &self.localized_marker {
                    actions.push(Action::PlaceCanvas { pose: marker.pose });
                } else {
                    tracing::warn!("placing without a localized marker");
                }
                actions.push(Action::EnableAdjustment);
                self.controls.fix_visible = true;
            }
            DrawingPhase::Fixed => {
                actions.push(Action::DisableAdjustment);
                self.controls.drawing_controls_visible = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarkerKind, Pose};

    fn started() -> AppState {
        let mut state = AppState::new();
        state.enter_initial();
        state
    }

    fn marker() -> TrackedMarker {
        TrackedMarker {
            id: "42".into(),
            kind: MarkerKind::ArucoApril,
            pose: Pose::default(),
            size: 0.05,
            sightings: 1,
        }
    }

    #[test]
    fn initial_entry_runs_once() {
        let mut state = AppState::new();
        assert_eq!(state.enter_initial(), vec![Action::StartAcquisition]);
        assert!(state.enter_initial().is_empty());
        assert_eq!(state.mode(), AppMode::SelectingImage);
    }

    #[test]
    fn transitions_before_startup_are_ignored() {
        let mut state = AppState::new();
        assert!(state
            .transition_to(AppMode::Drawing(DrawingPhase::Localizing))
            .is_empty());
        assert_eq!(state.mode(), AppMode::SelectingImage);
    }

    #[test]
    fn same_mode_requests_fire_nothing() {
        let mut state = started();
        for _ in 0..5 {
            assert!(state.transition_to(AppMode::SelectingImage).is_empty());
        }
        let first = state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        assert_eq!(first.iter().filter(|a| **a == Action::StartLocalization).count(), 1);
        for _ in 0..5 {
            assert!(state
                .transition_to(AppMode::Drawing(DrawingPhase::Localizing))
                .is_empty());
        }
    }

    #[test]
    fn selecting_to_drawing_swaps_services() {
        let mut state = started();
        let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        assert_eq!(
            actions,
            vec![Action::StopAcquisition, Action::Relocalize, Action::StartLocalization]
        );
    }

    #[test]
    fn placing_places_at_marker_and_shows_fix() {
        let mut state = started();
        state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        state.localized_marker = Some(marker());

        let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Placing));
        assert_eq!(
            actions,
            vec![
                Action::StopLocalization,
                Action::PlaceCanvas { pose: Pose::default() },
                Action::EnableAdjustment,
            ]
        );
        assert!(state.controls.fix_visible);
    }

    #[test]
    fn fixing_hides_fix_and_shows_drawing_controls() {
        let mut state = started();
        state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        state.localized_marker = Some(marker());
        state.transition_to(AppMode::Drawing(DrawingPhase::Placing));

        let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Fixed));
        assert_eq!(actions, vec![Action::DisableAdjustment]);
        assert!(!state.controls.fix_visible);
        assert!(state.controls.drawing_controls_visible);
    }

    #[test]
    fn relocalize_does_not_enable_adjustment() {
        let mut state = started();
        state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        state.localized_marker = Some(marker());
        state.transition_to(AppMode::Drawing(DrawingPhase::Placing));
        state.transition_to(AppMode::Drawing(DrawingPhase::Fixed));

        let actions = state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        assert_eq!(actions, vec![Action::Relocalize, Action::StartLocalization]);
        assert!(!actions.contains(&Action::EnableAdjustment));
        assert!(!state.controls.drawing_controls_visible);
    }

    #[test]
    fn leaving_drawing_resets_session() {
        let mut state = started();
        state.transition_to(AppMode::Drawing(DrawingPhase::Localizing));
        state.localized_marker = Some(marker());
        state.transition_to(AppMode::Drawing(DrawingPhase::Placing));

        let actions = state.transition_to(AppMode::SelectingImage);
        assert_eq!(
            actions,
            vec![
                Action::ResetRegistration,
                Action::ClearMarkers,
                Action::ReleaseImage,
                Action::StartAcquisition,
            ]
        );
        assert!(state.localized_marker.is_none());
        assert!(!state.controls.fix_visible);
    }
}
