//! Vendor marker tracker seam.

use super::settings::TrackerSettings;
use crate::domain::Result;
use async_trait::async_trait;

/// Controls the vendor marker tracker.
///
/// Detections themselves are not returned from this trait: the tracker pushes
/// [`RawDetection`](crate::domain::RawDetection)s onto the event bus through the
/// sender it was registered with, and the localizer filters them.
#[async_trait]
pub trait MarkerDetector: Send + Sync {
    async fn apply_settings(&self, settings: &TrackerSettings) -> Result<()>;
    async fn start_scanning(&self) -> Result<()>;
    async fn stop_scanning(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every call in order.
    #[derive(Default)]
    pub struct RecordingDetector {
        pub calls: Mutex<Vec<&'static str>>,
        pub fail_start: bool,
    }

    impl RecordingDetector {
        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarkerDetector for RecordingDetector {
        async fn apply_settings(&self, _settings: &TrackerSettings) -> Result<()> {
            self.calls.lock().unwrap().push("apply_settings");
            Ok(())
        }

        async fn start_scanning(&self) -> Result<()> {
            self.calls.lock().unwrap().push("start_scanning");
            if self.fail_start {
                return Err(crate::domain::ArCanvasError::Unavailable("tracker".into()));
            }
            Ok(())
        }

        async fn stop_scanning(&self) -> Result<()> {
            self.calls.lock().unwrap().push("stop_scanning");
            Ok(())
        }
    }
}
