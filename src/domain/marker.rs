//! Fiducial marker types.
//!
//! Raw detections arrive from the vendor tracker as [`RawDetection`] values. The
//! localization service decodes them into an identifier and keeps the live
//! [`TrackedMarker`] for each identifier in its registry.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Marker families the tracker can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// ArUco or AprilTag square fiducial carrying an integer id.
    ArucoApril,
    /// QR code carrying a byte payload.
    Qr,
    /// EAN-13 linear barcode; never carries a pose.
    Ean13,
    /// UPC-A linear barcode; never carries a pose.
    UpcA,
}

impl MarkerKind {
    /// Returns whether detections of this family include a usable world pose.
    #[must_use]
    pub const fn has_pose(self) -> bool {
        matches!(self, Self::ArucoApril | Self::Qr)
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ArucoApril => "aruco",
            Self::Qr => "qr",
            Self::Ean13 => "ean13",
            Self::UpcA => "upca",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for MarkerKind {
    type Err = super::ArCanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aruco" | "april" | "aruco_april" => Ok(Self::ArucoApril),
            "qr" => Ok(Self::Qr),
            "ean13" | "ean_13" => Ok(Self::Ean13),
            "upca" | "upc_a" => Ok(Self::UpcA),
            other => Err(super::ArCanvasError::Config(format!(
                "unknown marker kind: {other}"
            ))),
        }
    }
}

/// World-space position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

/// Payload carried by a detection, shaped by marker family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerPayload {
    /// Integer tag id of an ArUco/April marker.
    Tag(u32),
    /// Raw bytes of a QR or barcode payload.
    Bytes(Vec<u8>),
}

/// One unprocessed event from the marker tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub kind: MarkerKind,
    pub payload: MarkerPayload,
    pub pose: Pose,
}

/// Live registry entry for a marker seen at least once.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMarker {
    pub id: String,
    pub kind: MarkerKind,
    pub pose: Pose,
    /// Physical edge length in meters, taken from the tracker settings.
    pub size: f32,
    /// Number of sightings including the first.
    pub sightings: u64,
}
