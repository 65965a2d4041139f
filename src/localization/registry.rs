//! Registry of every marker seen during the session.
//!
//! Entries are keyed by decoded identifier and refreshed in place. Nothing is
//! evicted when a marker leaves view; [`MarkerRegistry::clear`] is the only way
//! entries disappear.

use crate::domain::{MarkerKind, Pose, TrackedMarker};
use std::collections::HashMap;

/// Whether an upsert created or refreshed an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    markers: HashMap<String, TrackedMarker>,
}

impl MarkerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entry for `id` or refreshes its pose and size.
    ///
    /// The entry's identity (id and first-seen family) is preserved on update.
    pub fn upsert(
        &mut self,
        id: &str,
        kind: MarkerKind,
        pose: Pose,
        size: f32,
    ) -> (Upsert, &TrackedMarker) {
        let mut outcome = Upsert::Updated;
        let marker = self
            .markers
            .entry(id.to_string())
            .and_modify(|marker| {
                marker.pose = pose;
                marker.size = size;
                marker.sightings += 1;
            })
            .or_insert_with(|| {
                outcome = Upsert::Created;
                TrackedMarker {
                    id: id.to_string(),
                    kind,
                    pose,
                    size,
                    sightings: 1,
                }
            });
        (outcome, marker)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedMarker> {
        self.markers.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn second_sighting_updates_in_place() {
        let mut registry = MarkerRegistry::new();
        let first = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        let second = Pose::new(Vec3::new(2.0, 1.0, 0.5), Quat::from_rotation_y(0.3));

        let (created, _) = registry.upsert("42", MarkerKind::ArucoApril, first, 0.05);
        let (updated, marker) = registry.upsert("42", MarkerKind::ArucoApril, second, 0.05);

        assert_eq!(created, Upsert::Created);
        assert_eq!(updated, Upsert::Updated);
        assert_eq!(marker.pose, second);
        assert_eq!(marker.sightings, 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_ids_create_distinct_entries() {
        let mut registry = MarkerRegistry::new();
        registry.upsert("a", MarkerKind::Qr, Pose::default(), 0.05);
        registry.upsert("b", MarkerKind::Qr, Pose::default(), 0.05);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());

        registry.clear();
        assert!(registry.is_empty());
    }
}
