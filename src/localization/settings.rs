//! Marker tracker settings applied before scanning starts.

use crate::domain::MarkerKind;
use serde::{Deserialize, Serialize};

/// ArUco dictionaries the tracker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArucoDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    #[serde(rename = "DICT_APRILTAG_36h11")]
    AprilTag36h11,
}

/// Tracker tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingProfile {
    #[default]
    Default,
    Speed,
    Accuracy,
    SmallTargets,
    LargeFov,
}

/// Settings pushed to the detector on every [`start`](super::MarkerLocalizer::start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub enabled: bool,
    /// Family the tracker scans for.
    pub kind: MarkerKind,
    /// QR edge length in meters.
    pub qr_marker_size: f32,
    pub aruco_dictionary: ArucoDictionary,
    /// ArUco edge length in meters.
    pub aruco_marker_size: f32,
    pub profile: TrackingProfile,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: MarkerKind::Qr,
            qr_marker_size: 0.05,
            aruco_dictionary: ArucoDictionary::Dict5x5_100,
            aruco_marker_size: 0.05,
            profile: TrackingProfile::Default,
        }
    }
}

impl TrackerSettings {
    /// Physical size recorded for a localizable marker family.
    #[must_use]
    pub const fn marker_size(&self, kind: MarkerKind) -> Option<f32> {
        match kind {
            MarkerKind::ArucoApril => Some(self.aruco_marker_size),
            MarkerKind::Qr => Some(self.qr_marker_size),
            MarkerKind::Ean13 | MarkerKind::UpcA => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_uses_tracker_names_in_toml() {
        let parsed: TrackerSettings =
            toml::from_str("aruco_dictionary = \"DICT_4X4_50\"\nkind = \"aruco_april\"").unwrap();
        assert_eq!(parsed.aruco_dictionary, ArucoDictionary::Dict4x4_50);
        assert_eq!(parsed.kind, MarkerKind::ArucoApril);
        assert!((parsed.qr_marker_size - 0.05).abs() < f32::EPSILON);
    }
}
