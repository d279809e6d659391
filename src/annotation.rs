//! Annotation data model and storage.
//!
//! This module provides the per-image annotation state:
//! - the single coordinate point (coordinate mode)
//! - the ordered inclusion/exclusion prompt points (multi-point and segmentation modes)
//! - the mask and polygons generated by the segmentation model
//!
//! The store is the only state that gets persisted or sent to the backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::CoordinateEntry;
use crate::model::{ImageId, Mask, Point, Polygon};

// ============================================================================
// Modes and points
// ============================================================================

/// How clicks on the image turn into annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationMode {
    /// One coordinate per image; a new click replaces the old one
    #[default]
    SinglePoint,
    /// Clicks accumulate, no model round trip
    MultiPoint,
    /// Clicks accumulate as prompts and each new set requests a mask
    Segmentation,
}

impl AnnotationMode {
    /// Get the display name for this mode.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationMode::SinglePoint => "Coordinate",
            AnnotationMode::MultiPoint => "Multi-point",
            AnnotationMode::Segmentation => "Segmentation",
        }
    }

    /// Whether a new point set should be sent to the mask model.
    pub fn generates_masks(&self) -> bool {
        matches!(self, AnnotationMode::Segmentation)
    }
}

/// A point in image-pixel space, tagged as a positive or negative prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPoint {
    pub x: f64,
    pub y: f64,
    /// Left click includes, right click excludes
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

impl AnnotationPoint {
    pub fn new(position: Point, include: bool) -> Self {
        Self {
            x: position.x,
            y: position.y,
            include,
        }
    }

    pub fn include(position: Point) -> Self {
        Self::new(position, true)
    }

    pub fn exclude(position: Point) -> Self {
        Self::new(position, false)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// ============================================================================
// Per-image state
// ============================================================================

/// Everything annotated on one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAnnotations {
    /// Coordinate-mode point
    pub point: Option<Point>,
    /// Prompt points in click order
    pub points: Vec<AnnotationPoint>,
    /// Model mask for the current prompt points
    pub mask: Option<Mask>,
    /// Model polygons for the current prompt points
    pub polygons: Vec<Polygon>,
    /// Local edits not yet saved to the backend
    #[serde(skip)]
    dirty: bool,
    /// Bumped on every change to the prompt points
    #[serde(skip)]
    revision: u64,
}

impl ImageAnnotations {
    pub fn with_point(point: Point) -> Self {
        Self {
            point: Some(point),
            ..Self::default()
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Revision of the prompt point list.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Nothing annotated at all.
    pub fn is_blank(&self) -> bool {
        self.point.is_none() && self.points.is_empty() && self.mask.is_none() && self.polygons.is_empty()
    }

    fn clear_points(&mut self) {
        self.points.clear();
        self.mask = None;
        self.polygons.clear();
        self.revision += 1;
        self.dirty = true;
    }
}

/// How backend entries are merged into the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeIntent {
    /// Initial load: fill in images without unsaved local edits
    Load,
    /// Explicit "reload from database": server state replaces local state
    Reload,
}

// ============================================================================
// Store
// ============================================================================

/// Map from image identity to its annotations.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    entries: HashMap<ImageId, ImageAnnotations>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ImageId) -> Option<&ImageAnnotations> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImageId, &ImageAnnotations)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, id: &ImageId) -> &mut ImageAnnotations {
        self.entries.entry(id.clone()).or_default()
    }

    /// Coordinate mode: replace the image's point.
    pub fn set_point(&mut self, id: &ImageId, point: Point) {
        let entry = self.entry(id);
        entry.point = Some(point);
        entry.dirty = true;
        log::debug!("Set point on {}: ({:.1}, {:.1})", id, point.x, point.y);
    }

    /// Multi-point/segmentation mode: add a prompt point.
    ///
    /// Returns the new revision of the point list.
    pub fn append_point(&mut self, id: &ImageId, point: AnnotationPoint) -> u64 {
        let entry = self.entry(id);
        entry.points.push(point);
        entry.revision += 1;
        entry.dirty = true;
        log::debug!(
            "Added {} point on {}: ({:.1}, {:.1}), {} total",
            if point.include { "include" } else { "exclude" },
            id,
            point.x,
            point.y,
            entry.points.len()
        );
        entry.revision
    }

    /// Revision of an image's point list (0 if never annotated).
    pub fn points_revision(&self, id: &ImageId) -> u64 {
        self.entries.get(id).map_or(0, |e| e.revision)
    }

    /// Replace the mask and polygons unconditionally.
    pub fn set_mask(&mut self, id: &ImageId, mask: Option<Mask>, polygons: Vec<Polygon>) {
        let entry = self.entry(id);
        entry.mask = mask;
        entry.polygons = polygons;
    }

    /// Replace the mask and polygons only if they were generated for the
    /// current point list. Returns false for a stale result.
    pub fn set_mask_for_revision(
        &mut self,
        id: &ImageId,
        revision: u64,
        mask: Option<Mask>,
        polygons: Vec<Polygon>,
    ) -> bool {
        let current = self.points_revision(id);
        if current != revision {
            log::debug!(
                "Dropping stale mask for {}: revision {} but points are at {}",
                id,
                revision,
                current
            );
            return false;
        }
        self.set_mask(id, mask, polygons);
        true
    }

    /// Remove the image's prompt points along with the mask and polygons
    /// derived from them. The coordinate point is kept.
    pub fn clear_points(&mut self, id: &ImageId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.clear_points();
            log::debug!("Cleared points on {}", id);
        }
    }

    /// Forget everything about one image.
    pub fn clear(&mut self, id: &ImageId) -> Option<ImageAnnotations> {
        self.entries.remove(id)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        log::debug!("Cleared all annotations");
    }

    /// Merge entries received from the backend.
    ///
    /// `Load` only fills images that have no unsaved local edits. `Reload`
    /// replaces the whole store with the server state. Returns the number of
    /// entries taken from `remote`.
    pub fn merge_from_backend(
        &mut self,
        remote: impl IntoIterator<Item = (ImageId, ImageAnnotations)>,
        intent: MergeIntent,
    ) -> usize {
        // Revisions never decrease, even for entries a reload replaces.
        let previous = if intent == MergeIntent::Reload {
            let discarded = self.entries.values().filter(|e| e.dirty).count();
            if discarded > 0 {
                log::info!("Reload discards unsaved edits on {} images", discarded);
            }
            std::mem::take(&mut self.entries)
        } else {
            HashMap::new()
        };

        let mut applied = 0;
        for (id, mut remote_entry) in remote {
            if self.entries.get(&id).is_some_and(|local| local.dirty) {
                log::debug!("Keeping local edits on {}", id);
                continue;
            }
            let old_revision = self
                .points_revision(&id)
                .max(previous.get(&id).map_or(0, |e| e.revision));
            remote_entry.dirty = false;
            remote_entry.revision = old_revision + 1;
            self.entries.insert(id, remote_entry);
            applied += 1;
        }
        log::info!("Merged {} entries from backend ({:?})", applied, intent);
        applied
    }

    /// Any image with unsaved edits.
    pub fn has_unsaved_edits(&self) -> bool {
        self.entries.values().any(|e| e.dirty)
    }

    /// Ids of images with unsaved edits, sorted.
    pub fn dirty_ids(&self) -> Vec<ImageId> {
        let mut ids: Vec<ImageId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Save payload for every image with a coordinate point, sorted by id.
    pub fn coordinate_entries(&self, folder_path: &str) -> Vec<CoordinateEntry> {
        let mut entries: Vec<CoordinateEntry> = self
            .entries
            .iter()
            .filter_map(|(id, e)| {
                let point = e.point?;
                Some(CoordinateEntry {
                    folder_path: folder_path.to_string(),
                    image_name: id.as_str().to_string(),
                    x: point.x,
                    y: point.y,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.image_name.cmp(&b.image_name));
        entries
    }

    /// Mark the given images as saved.
    pub fn mark_saved<'a>(&mut self, ids: impl IntoIterator<Item = &'a ImageId>) {
        for id in ids {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.dirty = false;
            }
        }
    }

    /// Serialize all entries, keyed by image id.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let ordered: std::collections::BTreeMap<&ImageId, &ImageAnnotations> =
            self.entries.iter().collect();
        serde_json::to_string_pretty(&ordered)
    }

    /// Deserialize entries written by [`AnnotationStore::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<ImageId, ImageAnnotations> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }
}

// ============================================================================
// Shared handle
// ============================================================================

/// Thread-safe handle to a store, shared between the UI and background
/// writers such as the auto-label stream.
#[derive(Debug, Clone, Default)]
pub struct SharedAnnotationStore {
    inner: Arc<RwLock<AnnotationStore>>,
}

impl SharedAnnotationStore {
    pub fn new(store: AnnotationStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Read access. A writer that panicked leaves the map itself consistent,
    /// so poisoning is ignored.
    pub fn read(&self) -> RwLockReadGuard<'_, AnnotationStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access, ignoring poisoning as for [`SharedAnnotationStore::read`].
    pub fn write(&self) -> RwLockWriteGuard<'_, AnnotationStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of one image's annotations.
    pub fn snapshot(&self, id: &ImageId) -> Option<ImageAnnotations> {
        self.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ImageId {
        ImageId::new(name)
    }

    #[test]
    fn test_set_point_overwrites() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("a"), Point::new(1.0, 2.0));
        store.set_point(&id("a"), Point::new(3.0, 4.0));
        assert_eq!(store.get(&id("a")).unwrap().point, Some(Point::new(3.0, 4.0)));
        assert_eq!(store.len(), 1);
        assert!(store.get(&id("a")).unwrap().is_dirty());
    }

    #[test]
    fn test_append_point_accumulates_and_bumps_revision() {
        let mut store = AnnotationStore::new();
        assert_eq!(store.points_revision(&id("a")), 0);
        let r1 = store.append_point(&id("a"), AnnotationPoint::include(Point::new(1.0, 1.0)));
        let r2 = store.append_point(&id("a"), AnnotationPoint::exclude(Point::new(2.0, 2.0)));
        assert!(r2 > r1);

        let entry = store.get(&id("a")).unwrap();
        assert_eq!(entry.points.len(), 2);
        assert!(entry.points[0].include);
        assert!(!entry.points[1].include);
    }

    #[test]
    fn test_clear_points_discards_mask() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("a"), Point::new(9.0, 9.0));
        store.append_point(&id("a"), AnnotationPoint::include(Point::new(1.0, 1.0)));
        store.set_mask(
            &id("a"),
            Some(Mask::zeros(2, 2)),
            vec![Polygon::new(vec![Point::ZERO; 3])],
        );

        store.clear_points(&id("a"));
        let entry = store.get(&id("a")).unwrap();
        assert!(entry.points.is_empty());
        assert!(entry.mask.is_none());
        assert!(entry.polygons.is_empty());
        assert_eq!(entry.point, Some(Point::new(9.0, 9.0)));
    }

    #[test]
    fn test_stale_mask_rejected() {
        let mut store = AnnotationStore::new();
        let old = store.append_point(&id("a"), AnnotationPoint::include(Point::new(1.0, 1.0)));
        let new = store.append_point(&id("a"), AnnotationPoint::include(Point::new(2.0, 2.0)));

        assert!(!store.set_mask_for_revision(&id("a"), old, Some(Mask::zeros(1, 1)), vec![]));
        assert!(store.get(&id("a")).unwrap().mask.is_none());

        assert!(store.set_mask_for_revision(&id("a"), new, Some(Mask::zeros(1, 1)), vec![]));
        assert!(store.get(&id("a")).unwrap().mask.is_some());
    }

    #[test]
    fn test_mask_after_clear_is_stale() {
        let mut store = AnnotationStore::new();
        let r = store.append_point(&id("a"), AnnotationPoint::include(Point::new(1.0, 1.0)));
        store.clear_points(&id("a"));
        assert!(!store.set_mask_for_revision(&id("a"), r, Some(Mask::zeros(1, 1)), vec![]));
    }

    #[test]
    fn test_load_keeps_local_edits() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("edited"), Point::new(1.0, 1.0));

        let remote = vec![
            (id("edited"), ImageAnnotations::with_point(Point::new(50.0, 50.0))),
            (id("fresh"), ImageAnnotations::with_point(Point::new(7.0, 7.0))),
        ];
        let applied = store.merge_from_backend(remote, MergeIntent::Load);

        assert_eq!(applied, 1);
        assert_eq!(store.get(&id("edited")).unwrap().point, Some(Point::new(1.0, 1.0)));
        assert_eq!(store.get(&id("fresh")).unwrap().point, Some(Point::new(7.0, 7.0)));
        assert!(!store.get(&id("fresh")).unwrap().is_dirty());
    }

    #[test]
    fn test_reload_overwrites_local_edits() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("edited"), Point::new(1.0, 1.0));
        store.set_point(&id("local-only"), Point::new(2.0, 2.0));

        let remote = vec![(id("edited"), ImageAnnotations::with_point(Point::new(50.0, 50.0)))];
        let applied = store.merge_from_backend(remote, MergeIntent::Reload);

        assert_eq!(applied, 1);
        assert_eq!(store.get(&id("edited")).unwrap().point, Some(Point::new(50.0, 50.0)));
        assert!(store.get(&id("local-only")).is_none());
        assert!(!store.has_unsaved_edits());
    }

    #[test]
    fn test_mark_saved() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("b"), Point::new(1.0, 1.0));
        store.set_point(&id("a"), Point::new(1.0, 1.0));
        let dirty = store.dirty_ids();
        assert_eq!(dirty, vec![id("a"), id("b")]);

        store.mark_saved(&dirty);
        assert!(!store.has_unsaved_edits());
    }

    #[test]
    fn test_coordinate_entries_only_points() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("b.png"), Point::new(3.0, 4.0));
        store.set_point(&id("a.png"), Point::new(1.0, 2.0));
        store.append_point(&id("c.png"), AnnotationPoint::include(Point::new(5.0, 5.0)));

        let entries = store.coordinate_entries("cats");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image_name, "a.png");
        assert_eq!(entries[0].folder_path, "cats");
        assert_eq!((entries[1].x, entries[1].y), (3.0, 4.0));
    }

    #[test]
    fn test_json_round_trip_skips_session_state() {
        let mut store = AnnotationStore::new();
        store.set_point(&id("a"), Point::new(1.5, 2.5));
        store.append_point(&id("a"), AnnotationPoint::exclude(Point::new(3.0, 4.0)));

        let json = store.to_json().unwrap();
        assert!(!json.contains("dirty"));
        let loaded = AnnotationStore::from_json(&json).unwrap();
        let entry = loaded.get(&id("a")).unwrap();
        assert_eq!(entry.point, Some(Point::new(1.5, 2.5)));
        assert!(!entry.points[0].include);
        assert!(!entry.is_dirty());
    }

    #[test]
    fn test_shared_store_concurrent_writers() {
        let shared = SharedAnnotationStore::default();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let name = format!("img-{}-{}", t, i);
                        store.write().set_point(&ImageId::new(name), Point::new(1.0, 1.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.read().len(), 100);
    }
}
