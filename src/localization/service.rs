//! The marker localization service.

use super::decode::{decode, Decoded};
use super::detector::MarkerDetector;
use super::registry::{MarkerRegistry, Upsert};
use super::settings::TrackerSettings;
use crate::domain::{RawDetection, Result, TrackedMarker};
use std::sync::Arc;

/// Signal emitted for every valid pose-capable sighting while running.
#[derive(Debug, Clone, PartialEq)]
pub struct Localized {
    pub marker: TrackedMarker,
    pub upsert: Upsert,
}

/// Turns tracker detections into tracked markers and localization signals.
///
/// Detections are only accepted between [`start`](Self::start) and
/// [`stop`](Self::stop). `stop` drops the subscription before it asks the
/// tracker to stop scanning, so nothing already queued can be accepted once
/// `stop` has begun.
pub struct MarkerLocalizer {
    detector: Arc<dyn MarkerDetector>,
    settings: TrackerSettings,
    registry: MarkerRegistry,
    current: Option<String>,
    subscribed: bool,
}

impl std::fmt::Debug for MarkerLocalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerLocalizer")
            .field("settings", &self.settings)
            .field("markers", &self.registry.len())
            .field("current", &self.current)
            .field("subscribed", &self.subscribed)
            .finish_non_exhaustive()
    }
}

impl MarkerLocalizer {
    #[must_use]
    pub fn new(detector: Arc<dyn MarkerDetector>, settings: TrackerSettings) -> Self {
        Self {
            detector,
            settings,
            registry: MarkerRegistry::new(),
            current: None,
            subscribed: false,
        }
    }

    /// Subscribes to detections, applies tracker settings and starts scanning.
    ///
    /// A second `start` while running is a no-op. A rejected settings update is
    /// logged and scanning proceeds with the tracker's previous settings.
    ///
    /// # Errors
    ///
    /// Propagates a scan start failure, leaving the service stopped.
    pub async fn start(&mut self) -> Result<()> {
        if self.subscribed {
            tracing::debug!("marker localization already running");
            return Ok(());
        }
        self.subscribed = true;

        if let Err(e) = self.detector.apply_settings(&self.settings).await {
            tracing::warn!(error = %e, "tracker rejected settings");
        }
        if let Err(e) = self.detector.start_scanning().await {
            self.subscribed = false;
            return Err(e);
        }
        tracing::debug!(kind = %self.settings.kind, profile = ?self.settings.profile, "marker localization started");
        Ok(())
    }

    /// Unsubscribes, then stops the tracker's scan.
    ///
    /// # Errors
    ///
    /// Propagates the tracker's stop failure; the service is unsubscribed
    /// regardless.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.subscribed {
            return Ok(());
        }
        self.subscribed = false;
        self.detector.stop_scanning().await?;
        tracing::debug!("marker localization stopped");
        Ok(())
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.subscribed
    }

    /// Handles one tracker detection.
    ///
    /// Returns the localization signal for a valid pose-capable sighting, and
    /// `None` when the service is stopped, the identifier is empty, or the
    /// family carries no pose.
    pub fn on_marker_event(&mut self, detection: &RawDetection) -> Option<Localized> {
        if !self.subscribed {
            tracing::trace!(kind = %detection.kind, "detection after unsubscribe dropped");
            return None;
        }

        let id = match decode(detection) {
            Decoded::Localizable(id) => id,
            Decoded::PoseLess(id) => {
                tracing::info!(kind = %detection.kind, value = %id, "no pose for marker family");
                return None;
            }
            Decoded::Dropped => {
                tracing::debug!(kind = %detection.kind, "undecodable marker identifier dropped");
                return None;
            }
        };

        let size = self.settings.marker_size(detection.kind)?;
        let (upsert, marker) = self.registry.upsert(&id, detection.kind, detection.pose, size);
        let marker = marker.clone();
        tracing::debug!(
            id = %marker.id,
            created = matches!(upsert, Upsert::Created),
            position = ?marker.pose.position,
            "marker localized"
        );
        self.current = Some(id);
        Some(Localized { marker, upsert })
    }

    /// The most recently sighted marker.
    #[must_use]
    pub fn current_marker(&self) -> Option<&TrackedMarker> {
        self.current.as_deref().and_then(|id| self.registry.get(id))
    }

    #[must_use]
    pub const fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    /// Forgets every tracked marker, for a session reset.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarkerKind, MarkerPayload, Pose};
    use crate::localization::detector::test_support::RecordingDetector;
    use glam::{Quat, Vec3};

    fn tag(id: u32, x: f32) -> RawDetection {
        RawDetection {
            kind: MarkerKind::ArucoApril,
            payload: MarkerPayload::Tag(id),
            pose: Pose::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY),
        }
    }

    async fn running() -> (MarkerLocalizer, Arc<RecordingDetector>) {
        let detector = Arc::new(RecordingDetector::default());
        let mut localizer = MarkerLocalizer::new(detector.clone(), TrackerSettings::default());
        localizer.start().await.unwrap();
        (localizer, detector)
    }

    #[tokio::test]
    async fn start_applies_settings_before_scanning() {
        let (localizer, detector) = running().await;
        assert!(localizer.is_running());
        assert_eq!(detector.calls(), vec!["apply_settings", "start_scanning"]);
    }

    #[tokio::test]
    async fn repeated_start_does_not_resubscribe() {
        let (mut localizer, detector) = running().await;
        localizer.start().await.unwrap();
        assert_eq!(detector.calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_scan_start_leaves_service_stopped() {
        let detector = Arc::new(RecordingDetector {
            fail_start: true,
            ..RecordingDetector::default()
        });
        let mut localizer = MarkerLocalizer::new(detector, TrackerSettings::default());
        assert!(localizer.start().await.is_err());
        assert!(localizer.on_marker_event(&tag(1, 0.0)).is_none());
    }

    #[tokio::test]
    async fn same_id_twice_updates_and_fires_twice() {
        let (mut localizer, _) = running().await;

        let first = localizer.on_marker_event(&tag(42, 1.0)).unwrap();
        let second = localizer.on_marker_event(&tag(42, 2.0)).unwrap();

        assert_eq!(first.upsert, Upsert::Created);
        assert_eq!(second.upsert, Upsert::Updated);
        assert_eq!(localizer.registry().len(), 1);
        let current = localizer.current_marker().unwrap();
        assert_eq!(current.id, "42");
        assert!((current.pose.position.x - 2.0).abs() < f32::EPSILON);
        assert!((current.size - 0.05).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn barcodes_leave_registry_untouched() {
        let (mut localizer, _) = running().await;
        let barcode = RawDetection {
            kind: MarkerKind::UpcA,
            payload: MarkerPayload::Bytes(b"036000291452".to_vec()),
            pose: Pose::default(),
        };
        assert!(localizer.on_marker_event(&barcode).is_none());
        assert!(localizer.registry().is_empty());
        assert!(localizer.current_marker().is_none());
    }

    #[tokio::test]
    async fn stop_unsubscribes_before_stopping_scan() {
        let (mut localizer, detector) = running().await;
        localizer.stop().await.unwrap();

        assert!(!localizer.is_running());
        assert_eq!(detector.calls().last(), Some(&"stop_scanning"));
        assert!(localizer.on_marker_event(&tag(3, 0.0)).is_none());
        assert!(localizer.registry().is_empty());
    }

    #[tokio::test]
    async fn registry_persists_across_restart_until_cleared() {
        let (mut localizer, _) = running().await;
        localizer.on_marker_event(&tag(9, 0.0));
        localizer.stop().await.unwrap();
        localizer.start().await.unwrap();
        assert_eq!(localizer.registry().len(), 1);

        localizer.clear();
        assert!(localizer.registry().is_empty());
        assert!(localizer.current_marker().is_none());
    }
}
