//! Box store for the image currently being annotated
//!
//! Ordered collection of committed bounding boxes. Boxes belong to exactly
//! one source image at a time; the store is cleared wholesale when the
//! active image advances or a batch finishes extracting.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::geometry::BoxCandidate;

/// Unique token identifying a bounding box within the session
///
/// Time-seeded and monotonically increasing; uniqueness within a store
/// snapshot is the only requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BoxId(pub u64);

/// A committed bounding box in canvas display space
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    /// Unique id within the session
    pub id: BoxId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Ordered collection of boxes for the active image
#[derive(Debug)]
pub struct BoxStore {
    boxes: Vec<BoundingBox>,
    next_id: u64,
}

impl Default for BoxStore {
    fn default() -> Self {
        // Seed from wall-clock millis so ids stay unique across store
        // rebuilds within one session
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            boxes: Vec::new(),
            next_id: seed,
        }
    }
}

impl BoxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a candidate, minting a fresh unique id
    pub fn add(&mut self, candidate: BoxCandidate) -> BoxId {
        let id = BoxId(self.next_id);
        self.next_id += 1;
        self.boxes.push(BoundingBox {
            id,
            x: candidate.x,
            y: candidate.y,
            width: candidate.width,
            height: candidate.height,
        });
        id
    }

    /// Remove the box with the given id, if present
    pub fn remove(&mut self, id: BoxId) {
        self.boxes.retain(|b| b.id != id);
    }

    /// Remove the most recently added box
    pub fn undo_last(&mut self) -> Option<BoundingBox> {
        self.boxes.pop()
    }

    /// Empty the store (image advance, post-extraction)
    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Ordered view of all committed boxes
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f32, y: f32) -> BoxCandidate {
        BoxCandidate {
            x,
            y,
            width: 40.0,
            height: 20.0,
        }
    }

    #[test]
    fn test_add_preserves_order() {
        let mut store = BoxStore::new();
        store.add(candidate(0.0, 0.0));
        store.add(candidate(10.0, 0.0));
        store.add(candidate(20.0, 0.0));

        let xs: Vec<f32> = store.boxes().iter().map(|b| b.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_ids_unique_across_add_remove() {
        let mut store = BoxStore::new();
        let mut seen = std::collections::HashSet::new();

        for i in 0..5 {
            let id = store.add(candidate(i as f32, 0.0));
            assert!(seen.insert(id), "duplicate id minted");
        }

        // Remove a couple and add more; new ids must still be fresh
        let first = store.boxes()[0].id;
        store.remove(first);
        store.undo_last();

        for i in 0..3 {
            let id = store.add(candidate(100.0 + i as f32, 0.0));
            assert!(seen.insert(id), "id reused after removal");
        }

        let snapshot_ids: std::collections::HashSet<_> =
            store.boxes().iter().map(|b| b.id).collect();
        assert_eq!(snapshot_ids.len(), store.len());
    }

    #[test]
    fn test_remove_by_id() {
        let mut store = BoxStore::new();
        let a = store.add(candidate(0.0, 0.0));
        let b = store.add(candidate(10.0, 0.0));

        store.remove(a);
        assert_eq!(store.len(), 1);
        assert_eq!(store.boxes()[0].id, b);

        // Removing an unknown id is a no-op
        store.remove(a);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_undo_last() {
        let mut store = BoxStore::new();
        store.add(candidate(0.0, 0.0));
        store.add(candidate(10.0, 0.0));

        let undone = store.undo_last().unwrap();
        assert_eq!(undone.x, 10.0);
        assert_eq!(store.len(), 1);

        store.undo_last();
        assert!(store.undo_last().is_none());
    }

    #[test]
    fn test_clear() {
        let mut store = BoxStore::new();
        store.add(candidate(0.0, 0.0));
        store.add(candidate(10.0, 0.0));
        store.clear();
        assert!(store.is_empty());
    }
}
