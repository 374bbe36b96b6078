//! Reference face storage for reference-mode selection.
//!
//! Two independent slots hold appended reference faces. Slots are not
//! deduplicated against each other: a face present in both slots drives
//! the reference transform once per slot, matching the behaviour
//! downstream code depends on.

use std::sync::Mutex;

use vswap_models::Face;

/// Which reference set a face belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSlot {
    Primary,
    Secondary,
}

impl ReferenceSlot {
    pub const ALL: [ReferenceSlot; 2] = [ReferenceSlot::Primary, ReferenceSlot::Secondary];

    fn index(self) -> usize {
        match self {
            ReferenceSlot::Primary => 0,
            ReferenceSlot::Secondary => 1,
        }
    }
}

/// Shared store of reference faces, append-only between clears.
#[derive(Default)]
pub struct ReferenceFaceStore {
    slots: Mutex<[Vec<Face>; 2]>,
}

impl ReferenceFaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, slot: ReferenceSlot, face: Face) {
        if let Ok(mut slots) = self.slots.lock() {
            slots[slot.index()].push(face);
        }
    }

    pub fn get(&self, slot: ReferenceSlot) -> Vec<Face> {
        self.slots
            .lock()
            .map(|slots| slots[slot.index()].clone())
            .unwrap_or_default()
    }

    /// Faces from every slot, primary first. Duplicates across slots are
    /// returned as often as they were appended.
    pub fn all(&self) -> Vec<Face> {
        self.slots
            .lock()
            .map(|slots| slots.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.iter().all(Vec::is_empty))
            .unwrap_or(true)
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            for slot in slots.iter_mut() {
                slot.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(score: f32) -> Face {
        Face {
            score,
            ..Face::default()
        }
    }

    #[test]
    fn test_slots_are_independent() {
        let store = ReferenceFaceStore::new();
        store.append(ReferenceSlot::Primary, face(0.9));
        store.append(ReferenceSlot::Secondary, face(0.8));
        store.append(ReferenceSlot::Secondary, face(0.7));

        assert_eq!(store.get(ReferenceSlot::Primary).len(), 1);
        assert_eq!(store.get(ReferenceSlot::Secondary).len(), 2);
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn test_duplicates_across_slots_are_kept() {
        let store = ReferenceFaceStore::new();
        let same = face(0.9);
        store.append(ReferenceSlot::Primary, same.clone());
        store.append(ReferenceSlot::Secondary, same);

        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn test_clear_empties_every_slot() {
        let store = ReferenceFaceStore::new();
        assert!(store.is_empty());

        store.append(ReferenceSlot::Primary, face(0.9));
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(ReferenceSlot::Primary).is_empty());
    }
}
