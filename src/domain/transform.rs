//! Canvas placement transforms.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local transform of the projected canvas before any registration.
///
/// Loaded from configuration; the scale rides along unchanged through
/// placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// World placement of the projected canvas.
///
/// Owned by the registration controller. Replaced wholesale by each placement
/// and nudged by manual adjustment while that is enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}
