//! Runtime permission outcomes.
//!
//! The platform answers each permission request independently and in any order.
//! Outcomes are collected first and reduced once, so readiness never reflects a
//! partially answered request set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capabilities requested at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Camera,
    ExternalStorageRead,
    SpatialMapping,
}

impl Permission {
    /// Every capability the application asks for.
    pub const ALL: [Self; 3] = [Self::Camera, Self::ExternalStorageRead, Self::SpatialMapping];

    /// Returns whether this capability gates image acquisition readiness.
    ///
    /// Spatial mapping only feeds the plane-detection flag.
    #[must_use]
    pub const fn gates_acquisition(self) -> bool {
        matches!(self, Self::Camera | Self::ExternalStorageRead)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Camera => "camera",
            Self::ExternalStorageRead => "external-storage-read",
            Self::SpatialMapping => "spatial-mapping",
        };
        f.write_str(label)
    }
}

/// Platform answer for a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    DeniedPermanently,
}

impl PermissionOutcome {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Reduced view of every permission outcome.
///
/// Built once at startup with [`PermissionSet::collect`]; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    outcomes: BTreeMap<Permission, PermissionOutcome>,
}

impl PermissionSet {
    /// Reduces a complete batch of outcomes.
    ///
    /// A capability answered more than once keeps its least permissive answer, so
    /// the result does not depend on callback order. Capabilities that never
    /// answered count as denied.
    ///
    /// # Example
    ///
    /// ```
    /// use arcanvas::domain::{Permission, PermissionOutcome, PermissionSet};
    ///
    /// let set = PermissionSet::collect([
    ///     (Permission::ExternalStorageRead, PermissionOutcome::Granted),
    ///     (Permission::Camera, PermissionOutcome::Granted),
    /// ]);
    /// assert!(set.is_ready());
    /// assert!(!set.plane_detection_enabled());
    /// ```
    #[must_use]
    pub fn collect(results: impl IntoIterator<Item = (Permission, PermissionOutcome)>) -> Self {
        let mut outcomes: BTreeMap<Permission, PermissionOutcome> = BTreeMap::new();
        for (permission, outcome) in results {
            outcomes
                .entry(permission)
                .and_modify(|existing| *existing = least_permissive(*existing, outcome))
                .or_insert(outcome);
        }
        Self { outcomes }
    }

    #[must_use]
    pub fn outcome(&self, permission: Permission) -> Option<PermissionOutcome> {
        self.outcomes.get(&permission).copied()
    }

    #[must_use]
    pub fn is_granted(&self, permission: Permission) -> bool {
        self.outcome(permission).is_some_and(PermissionOutcome::is_granted)
    }

    /// AND of the camera and storage grants.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        Permission::ALL
            .into_iter()
            .filter(|p| p.gates_acquisition())
            .all(|p| self.is_granted(p))
    }

    #[must_use]
    pub fn plane_detection_enabled(&self) -> bool {
        self.is_granted(Permission::SpatialMapping)
    }

    /// Converts a capability's outcome into the matching error, if not granted.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for a denied or unanswered request and
    /// `PermissionDeniedPermanently` for a permanent denial.
    pub fn require(&self, permission: Permission) -> super::Result<()> {
        match self.outcome(permission) {
            Some(PermissionOutcome::Granted) => Ok(()),
            Some(PermissionOutcome::DeniedPermanently) => Err(
                super::ArCanvasError::PermissionDeniedPermanently(permission.to_string()),
            ),
            Some(PermissionOutcome::Denied) | None => {
                Err(super::ArCanvasError::PermissionDenied(permission.to_string()))
            }
        }
    }
}

const fn least_permissive(a: PermissionOutcome, b: PermissionOutcome) -> PermissionOutcome {
    use PermissionOutcome::{Denied, DeniedPermanently, Granted};
    match (a, b) {
        (DeniedPermanently, _) | (_, DeniedPermanently) => DeniedPermanently,
        (Denied, _) | (_, Denied) => Denied,
        (Granted, Granted) => Granted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PermissionOutcome::{Denied, DeniedPermanently, Granted};

    #[test]
    fn readiness_needs_camera_and_storage() {
        let set = PermissionSet::collect([
            (Permission::Camera, Granted),
            (Permission::ExternalStorageRead, Denied),
            (Permission::SpatialMapping, Granted),
        ]);
        assert!(!set.is_ready());
        assert!(set.plane_detection_enabled());
    }

    #[test]
    fn spatial_mapping_does_not_gate_readiness() {
        let set = PermissionSet::collect([
            (Permission::SpatialMapping, DeniedPermanently),
            (Permission::Camera, Granted),
            (Permission::ExternalStorageRead, Granted),
        ]);
        assert!(set.is_ready());
        assert!(!set.plane_detection_enabled());
    }

    #[test]
    fn reduction_is_order_independent() {
        let forward = PermissionSet::collect([
            (Permission::Camera, Granted),
            (Permission::Camera, Denied),
        ]);
        let backward = PermissionSet::collect([
            (Permission::Camera, Denied),
            (Permission::Camera, Granted),
        ]);
        assert_eq!(forward, backward);
        assert_eq!(forward.outcome(Permission::Camera), Some(Denied));
    }

    #[test]
    fn missing_answers_are_denials() {
        let set = PermissionSet::collect([(Permission::Camera, Granted)]);
        assert!(!set.is_ready());
        assert!(matches!(
            set.require(Permission::ExternalStorageRead),
            Err(crate::domain::ArCanvasError::PermissionDenied(_))
        ));
    }

    #[test]
    fn permanent_denial_maps_to_its_own_error() {
        let set = PermissionSet::collect([(Permission::Camera, DeniedPermanently)]);
        assert!(matches!(
            set.require(Permission::Camera),
            Err(crate::domain::ArCanvasError::PermissionDeniedPermanently(_))
        ));
    }
}
