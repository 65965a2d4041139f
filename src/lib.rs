//! ArCanvas: headless core of an augmented-reality drawing aid.
//!
//! The user picks a reference image (camera capture, a file on disk or the
//! companion server), a fiducial marker on the drawing surface is localized,
//! and the image is placed as a semi-transparent canvas at the marker pose so
//! it can be traced by hand.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Shell (main.rs)                                    │  ← stdin commands
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← State machine
//! │  - Event handling, mode entry/exit actions          │
//! │  - Event bus, runtime loop                          │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ acquisition/  │   │ localization/ │   │ registration/ │
//! │ - Camera      │   │ - Decoding    │   │ - Placement   │
//! │ - Disk        │   │ - Registry    │   │ - Adjustment  │
//! │ - Server      │   │ - Tracker     │   │               │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Infrastructure & Domain Layers                     │
//! │  - Data paths (infrastructure/)                     │
//! │  - Errors, images, markers, transforms (domain/)    │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │
//! │  - stderr logs, JSON-lines span export              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modes
//!
//! `SelectingImage` → `Drawing(Localizing → Placing → Fixed)`. Relocalize
//! goes from `Fixed` back to `Localizing`; reset leaves `Drawing` entirely.
//!
//! # Configuration
//!
//! ```toml
//! image_directory = "/storage/self/primary/DCIM/photos/"
//! image_file = "example.jpg"
//! trace_level = "debug"
//!
//! [server]
//! base_url = "https://192.168.0.10:8080/"
//!
//! [tracker]
//! kind = "aruco_april"
//! aruco_dictionary = "DICT_5X5_100"
//!
//! [registration]
//! z_offset = 0.6
//! ```

#![allow(clippy::multiple_crate_versions)]

pub mod acquisition;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod localization;
pub mod observability;
pub mod registration;
pub mod sim;

pub use app::{handle_event, Action, AppMode, AppState, DrawingPhase, Event, Runtime};
pub use domain::{ArCanvasError, Result};

use acquisition::{CameraDevice, CameraSettings, ImageAcquisition, ImageTransport, ServerSettings};
use app::{PermissionProvider, Services};
use localization::{MarkerDetector, MarkerLocalizer, TrackerSettings};
use registration::{RegistrationController, RegistrationSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Application configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory disk loads read from; joined with the file name verbatim.
    pub image_directory: String,

    /// File loaded when no name is given.
    pub image_file: String,

    pub camera: CameraSettings,

    pub server: ServerSettings,

    pub tracker: TrackerSettings,

    pub registration: RegistrationSettings,

    /// Filter directive for logs and spans.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`. Default: `"info"`
    pub trace_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_directory: "/storage/self/primary/DCIM/photos/".to_string(),
            image_file: "example.jpg".to_string(),
            camera: CameraSettings::default(),
            server: ServerSettings::default(),
            tracker: TrackerSettings::default(),
            registration: RegistrationSettings::default(),
            trace_level: None,
        }
    }
}

impl Config {
    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Config` when it is not valid TOML
    /// for this structure.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ArCanvasError::Config(format!("{}: {e}", path.display())))
    }

    /// Builds a configuration from flat key/value pairs.
    ///
    /// Unknown keys are ignored. A value that does not parse leaves the
    /// default in place.
    ///
    /// # Recognized Keys
    ///
    /// - `image_directory`, `image_file`
    /// - `server_url`, `listen_path`, `send_path`
    /// - `camera_width`, `camera_height`, `frame_rate`, `poll_interval_ms`,
    ///   `max_unconverged_frames`
    /// - `marker_kind` (`qr`, `aruco`, `ean13`, `upca`), `qr_marker_size`,
    ///   `aruco_marker_size`
    /// - `z_offset`
    /// - `trace_level`
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use arcanvas::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("server_url".to_string(), "https://10.0.0.2:8080/".to_string());
    /// map.insert("frame_rate".to_string(), "not-a-number".to_string());
    ///
    /// let config = Config::from_map(&map);
    /// assert_eq!(config.server.base_url, "https://10.0.0.2:8080/");
    /// assert_eq!(config.camera.frame_rate, 30);
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        fn parsed<T: std::str::FromStr>(map: &BTreeMap<String, String>, key: &str) -> Option<T> {
            let raw = map.get(key)?;
            raw.trim().parse().map_err(|_| {
                tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            }).ok()
        }

        let mut config = Self::default();
        if let Some(dir) = map.get("image_directory") {
            config.image_directory.clone_from(dir);
        }
        if let Some(file) = map.get("image_file") {
            config.image_file.clone_from(file);
        }
        if let Some(url) = map.get("server_url") {
            config.server.base_url.clone_from(url);
        }
        if let Some(path) = map.get("listen_path") {
            config.server.listen_path.clone_from(path);
        }
        if let Some(path) = map.get("send_path") {
            config.server.send_path.clone_from(path);
        }

        let camera = &mut config.camera;
        camera.width = parsed(map, "camera_width").unwrap_or(camera.width);
        camera.height = parsed(map, "camera_height").unwrap_or(camera.height);
        camera.frame_rate = parsed(map, "frame_rate").unwrap_or(camera.frame_rate);
        camera.poll_interval_ms =
            parsed(map, "poll_interval_ms").unwrap_or(camera.poll_interval_ms);
        camera.max_unconverged_frames =
            parsed(map, "max_unconverged_frames").unwrap_or(camera.max_unconverged_frames);

        let tracker = &mut config.tracker;
        tracker.kind = parsed(map, "marker_kind").unwrap_or(tracker.kind);
        tracker.qr_marker_size = parsed(map, "qr_marker_size").unwrap_or(tracker.qr_marker_size);
        tracker.aruco_marker_size =
            parsed(map, "aruco_marker_size").unwrap_or(tracker.aruco_marker_size);

        config.registration.z_offset =
            parsed(map, "z_offset").unwrap_or(config.registration.z_offset);
        config.trace_level = map.get("trace_level").cloned();
        config
    }
}

/// External boundaries the runtime is wired to.
pub struct Devices {
    pub camera: Arc<dyn CameraDevice>,
    pub transport: Arc<dyn ImageTransport>,
    pub detector: Arc<dyn MarkerDetector>,
    pub permissions: Arc<dyn PermissionProvider>,
}

/// Builds the runtime with all three services constructed from `config`.
///
/// Nothing starts here; call [`Runtime::run`] (or [`Runtime::startup`]) to
/// request permissions and enter the initial mode.
///
/// # Example
///
/// ```rust
/// use arcanvas::sim::{ManualDetector, OfflineServer, StaticPermissions, StillCamera};
/// use arcanvas::{initialize, AppMode, Config, Devices};
/// use std::sync::Arc;
///
/// let devices = Devices {
///     camera: Arc::new(StillCamera::unavailable()),
///     transport: Arc::new(OfflineServer),
///     detector: Arc::new(ManualDetector::default()),
///     permissions: Arc::new(StaticPermissions::granting_all()),
/// };
/// let runtime = initialize(&Config::default(), devices);
/// assert_eq!(runtime.state().mode(), AppMode::SelectingImage);
/// assert!(!runtime.is_running());
/// ```
#[must_use]
pub fn initialize(config: &Config, devices: Devices) -> Runtime {
    tracing::debug!(
        image_directory = %config.image_directory,
        server = %config.server.base_url,
        marker_kind = %config.tracker.kind,
        "initializing runtime"
    );

    let services = Services {
        acquisition: ImageAcquisition::new(
            devices.camera,
            devices.transport,
            config.camera.clone(),
            config.image_directory.clone(),
            config.image_file.clone(),
        ),
        localization: MarkerLocalizer::new(devices.detector, config.tracker.clone()),
        registration: RegistrationController::new(config.registration),
    };
    Runtime::new(services, devices.permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarkerKind;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();
        assert_eq!(Config::from_file(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
image_file = "wall.png"

[camera]
poll_interval_ms = 250

[tracker]
kind = "aruco_april"
aruco_marker_size = 0.1

[registration]
z_offset = 0.4
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.image_file, "wall.png");
        assert_eq!(config.image_directory, Config::default().image_directory);
        assert_eq!(config.camera.poll_interval_ms, 250);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.tracker.kind, MarkerKind::ArucoApril);
        approx::assert_relative_eq!(config.tracker.aruco_marker_size, 0.1);
        approx::assert_relative_eq!(config.registration.z_offset, 0.4);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[camera\nwidth = ").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ArCanvasError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(&dir.path().join("absent.toml")),
            Err(ArCanvasError::Io(_))
        ));
    }

    #[test]
    fn map_values_parse_with_fallbacks() {
        let map: BTreeMap<String, String> = [
            ("marker_kind", "aruco"),
            ("camera_width", "640"),
            ("camera_height", "tall"),
            ("z_offset", "0.25"),
            ("trace_level", "debug"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::from_map(&map);
        assert_eq!(config.tracker.kind, MarkerKind::ArucoApril);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 960);
        approx::assert_relative_eq!(config.registration.z_offset, 0.25);
        assert_eq!(config.trace_level.as_deref(), Some("debug"));
    }
}
