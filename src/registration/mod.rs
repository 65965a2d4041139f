//! Image registration: placing the projected canvas relative to a marker.
//!
//! Placement is one-shot. A new marker sighting never moves the canvas on its
//! own; the state machine has to re-enter localization (relocalize) and place
//! again. Between placement and fixing, the user may nudge the canvas by hand.

use crate::domain::{ArCanvasError, CanvasTransform, Pose, RegistrationTransform, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Default backward offset from the marker plane, in meters.
pub const DEFAULT_Z_OFFSET: f32 = 0.6;

/// Registration inputs loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSettings {
    /// Canvas transform before any placement.
    pub canvas: CanvasTransform,
    /// Distance the canvas is pulled back along Z to avoid z-fighting.
    pub z_offset: f32,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasTransform::default(),
            z_offset: DEFAULT_Z_OFFSET,
        }
    }
}

/// Computes the canvas placement for a marker pose.
///
/// - position: canvas local position + marker position, pulled back by
///   `z_offset` along Z
/// - rotation: marker rotation composed with the canvas rotation, the canvas
///   rotation applied in the marker's frame
///
/// The canvas scale passes through unchanged.
///
/// # Example
///
/// ```
/// use arcanvas::domain::{CanvasTransform, Pose};
/// use arcanvas::registration::compute_initial_placement;
/// use glam::{Quat, Vec3};
///
/// let marker = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
/// let placed = compute_initial_placement(&marker, &CanvasTransform::default(), 0.6);
/// assert!((placed.position - Vec3::new(1.0, 2.0, 2.4)).length() < 1e-6);
/// ```
#[must_use]
pub fn compute_initial_placement(
    marker: &Pose,
    canvas: &CanvasTransform,
    z_offset: f32,
) -> RegistrationTransform {
    RegistrationTransform {
        position: canvas.position + marker.position - Vec3::new(0.0, 0.0, z_offset),
        rotation: (marker.rotation * canvas.rotation).normalize(),
        scale: canvas.scale,
    }
}

/// Owns the canvas placement and the manual adjustment gate.
#[derive(Debug, Clone)]
pub struct RegistrationController {
    settings: RegistrationSettings,
    placement: Option<RegistrationTransform>,
    adjustment_enabled: bool,
    awaiting_placement: bool,
}

impl RegistrationController {
    #[must_use]
    pub const fn new(settings: RegistrationSettings) -> Self {
        Self {
            settings,
            placement: None,
            adjustment_enabled: false,
            awaiting_placement: true,
        }
    }

    /// Places the canvas at a marker pose, replacing any previous placement.
    ///
    /// # Errors
    ///
    /// `AdjustmentLocked` when the current placement is fixed and no
    /// relocalization was requested.
    pub fn place(&mut self, marker: &Pose) -> Result<RegistrationTransform> {
        if !self.awaiting_placement {
            return Err(ArCanvasError::AdjustmentLocked);
        }
        let placement =
            compute_initial_placement(marker, &self.settings.canvas, self.settings.z_offset);
        tracing::debug!(position = ?placement.position, rotation = ?placement.rotation, "canvas placed");
        self.placement = Some(placement);
        self.awaiting_placement = false;
        Ok(placement)
    }

    pub fn enable_manual_adjustment(&mut self) {
        self.adjustment_enabled = true;
        tracing::debug!("manual adjustment enabled");
    }

    pub fn disable_manual_adjustment(&mut self) {
        self.adjustment_enabled = false;
        tracing::debug!("manual adjustment disabled");
    }

    /// Unfreezes placement so the next localization can place again.
    ///
    /// Manual adjustment stays disabled until that placement happens.
    pub fn relocalize(&mut self) {
        self.adjustment_enabled = false;
        self.awaiting_placement = true;
        tracing::debug!("relocalization requested");
    }

    /// Applies a user drag to the placement.
    ///
    /// The translation is added to the position; the rotation is applied on
    /// top of the current orientation.
    ///
    /// # Errors
    ///
    /// `AdjustmentLocked` unless adjustment is enabled and a placement exists.
    pub fn apply_adjustment(
        &mut self,
        translation: Vec3,
        rotation: Quat,
    ) -> Result<RegistrationTransform> {
        if !self.adjustment_enabled {
            return Err(ArCanvasError::AdjustmentLocked);
        }
        let placement = self.placement.as_mut().ok_or(ArCanvasError::AdjustmentLocked)?;
        placement.position += translation;
        placement.rotation = (rotation * placement.rotation).normalize();
        Ok(*placement)
    }

    /// Drops the placement, for a session reset.
    pub fn reset(&mut self) {
        self.placement = None;
        self.adjustment_enabled = false;
        self.awaiting_placement = true;
    }

    #[must_use]
    pub const fn placement(&self) -> Option<&RegistrationTransform> {
        self.placement.as_ref()
    }

    #[must_use]
    pub const fn adjustment_enabled(&self) -> bool {
        self.adjustment_enabled
    }

    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        self.placement.is_some() && !self.awaiting_placement && !self.adjustment_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn marker_at(x: f32, y: f32, z: f32, rotation: Quat) -> Pose {
        Pose::new(Vec3::new(x, y, z), rotation)
    }

    #[test]
    fn placement_offsets_position_and_composes_rotation() {
        let canvas = CanvasTransform {
            position: Vec3::new(0.1, -0.2, 0.0),
            rotation: Quat::from_rotation_x(FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let marker = marker_at(1.0, 1.5, 2.0, Quat::from_rotation_y(FRAC_PI_2));

        let placed = compute_initial_placement(&marker, &canvas, 0.6);

        assert_relative_eq!(placed.position.x, 1.1, epsilon = 1e-6);
        assert_relative_eq!(placed.position.y, 1.3, epsilon = 1e-6);
        assert_relative_eq!(placed.position.z, 1.4, epsilon = 1e-6);

        let expected = marker.rotation * canvas.rotation;
        assert_relative_eq!(placed.rotation.dot(expected).abs(), 1.0, epsilon = 1e-6);
        assert_eq!(placed.scale, Vec3::splat(2.0));
    }

    #[test]
    fn marker_rotation_is_applied_first() {
        let canvas = CanvasTransform {
            rotation: Quat::from_rotation_x(FRAC_PI_2),
            ..CanvasTransform::default()
        };
        let marker = marker_at(0.0, 0.0, 0.0, Quat::from_rotation_y(FRAC_PI_2));
        let placed = compute_initial_placement(&marker, &canvas, 0.6);

        // Canvas +Y is first turned by the canvas rotation, then by the marker.
        let up = placed.rotation * Vec3::Y;
        let expected = marker.rotation * (canvas.rotation * Vec3::Y);
        assert_relative_eq!(up.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(up.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(up.z, expected.z, epsilon = 1e-6);
    }

    #[test]
    fn adjustment_is_gated() {
        let mut controller = RegistrationController::new(RegistrationSettings::default());
        assert!(matches!(
            controller.apply_adjustment(Vec3::X, Quat::IDENTITY),
            Err(ArCanvasError::AdjustmentLocked)
        ));

        controller.place(&Pose::default()).unwrap();
        controller.enable_manual_adjustment();
        let moved = controller.apply_adjustment(Vec3::X, Quat::IDENTITY).unwrap();
        assert_relative_eq!(moved.position.x, 1.0, epsilon = 1e-6);

        controller.disable_manual_adjustment();
        assert!(controller.is_fixed());
        assert!(controller.apply_adjustment(Vec3::X, Quat::IDENTITY).is_err());
        assert_relative_eq!(controller.placement().unwrap().position.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn fixed_placement_only_moves_after_relocalize() {
        let mut controller = RegistrationController::new(RegistrationSettings::default());
        controller.place(&Pose::default()).unwrap();
        controller.disable_manual_adjustment();

        assert!(controller.place(&marker_at(5.0, 0.0, 0.0, Quat::IDENTITY)).is_err());

        controller.relocalize();
        assert!(!controller.adjustment_enabled());
        let placed = controller.place(&marker_at(5.0, 0.0, 0.0, Quat::IDENTITY)).unwrap();
        assert_relative_eq!(placed.position.x, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn reset_forgets_placement() {
        let mut controller = RegistrationController::new(RegistrationSettings::default());
        controller.place(&Pose::default()).unwrap();
        controller.enable_manual_adjustment();
        controller.reset();
        assert!(controller.placement().is_none());
        assert!(!controller.adjustment_enabled());
    }
}
