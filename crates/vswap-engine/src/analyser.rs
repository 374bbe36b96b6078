//! Face detection seam and per-frame result caching.
//!
//! Detection itself is a collaborator supplied by the caller. The engine
//! only needs a stable view of the faces in a frame, sorted by detector
//! confidence, and a cache so repeated lookups on the same frame (one
//! per processor) run the detector once.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use image::RgbImage;
use tracing::debug;

use vswap_models::{face_distance, Face};

/// Detection backend. Implementations are expected to return faces in
/// arbitrary order; sorting is handled here.
pub trait FaceAnalyser: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Vec<Face>;
}

/// Memoizing wrapper around a detection backend.
///
/// Frames are keyed by a hash of their pixel content, so identical
/// frames share one detector run regardless of where they came from.
pub struct CachingAnalyser {
    inner: Box<dyn FaceAnalyser>,
    cache: Mutex<HashMap<u64, Vec<Face>>>,
}

impl CachingAnalyser {
    pub fn new(inner: Box<dyn FaceAnalyser>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// All faces in the frame, highest detector score first.
    pub fn get_many_faces(&self, frame: &RgbImage) -> Vec<Face> {
        let key = frame_key(frame);
        if let Ok(cache) = self.cache.lock() {
            if let Some(faces) = cache.get(&key) {
                return faces.clone();
            }
        }

        let mut faces = self.inner.detect(frame);
        faces.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(faces = faces.len(), "analysed frame");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, faces.clone());
        }
        faces
    }

    /// The face at `position` in score order, if any.
    pub fn get_one_face(&self, frame: &RgbImage, position: usize) -> Option<Face> {
        self.get_many_faces(frame).into_iter().nth(position)
    }

    /// Drop all memoized detections.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Faces whose embedding distance to at least one reference is below
/// the threshold. Order of the input faces is preserved.
pub fn find_similar_faces(faces: &[Face], references: &[Face], distance: f32) -> Vec<Face> {
    faces
        .iter()
        .filter(|face| {
            references
                .iter()
                .any(|reference| face_distance(face, reference) < distance)
        })
        .cloned()
        .collect()
}

fn frame_key(frame: &RgbImage) -> u64 {
    let mut hasher = DefaultHasher::new();
    frame.dimensions().hash(&mut hasher);
    frame.as_raw().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAnalyser {
        calls: Arc<AtomicUsize>,
        faces: Vec<Face>,
    }

    impl FaceAnalyser for CountingAnalyser {
        fn detect(&self, _frame: &RgbImage) -> Vec<Face> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.faces.clone()
        }
    }

    fn face_with(score: f32, embedding: Vec<f32>) -> Face {
        Face {
            score,
            embedding,
            ..Face::default()
        }
    }

    #[test]
    fn test_detections_are_cached_per_frame_content() {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyser = CachingAnalyser::new(Box::new(CountingAnalyser {
            calls: calls.clone(),
            faces: vec![face_with(0.9, vec![])],
        }));

        let frame = RgbImage::from_pixel(4, 4, image::Rgb([7, 7, 7]));
        analyser.get_many_faces(&frame);
        analyser.get_many_faces(&frame);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other = RgbImage::from_pixel(4, 4, image::Rgb([8, 8, 8]));
        analyser.get_many_faces(&other);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(analyser.cache_len(), 2);

        analyser.clear();
        assert_eq!(analyser.cache_len(), 0);
        analyser.get_many_faces(&frame);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_faces_sorted_by_score_descending() {
        let analyser = CachingAnalyser::new(Box::new(CountingAnalyser {
            calls: Arc::new(AtomicUsize::new(0)),
            faces: vec![
                face_with(0.4, vec![]),
                face_with(0.95, vec![]),
                face_with(0.7, vec![]),
            ],
        }));

        let frame = RgbImage::new(2, 2);
        let faces = analyser.get_many_faces(&frame);
        assert_eq!(faces[0].score, 0.95);
        assert_eq!(faces[2].score, 0.4);

        let best = analyser.get_one_face(&frame, 0).unwrap();
        assert_eq!(best.score, 0.95);
        assert!(analyser.get_one_face(&frame, 5).is_none());
    }

    #[test]
    fn test_find_similar_faces_filters_by_distance() {
        let close = face_with(0.9, vec![1.0, 0.0]);
        let far = face_with(0.8, vec![-1.0, 0.0]);
        let reference = face_with(1.0, vec![1.0, 0.01]);

        let similar = find_similar_faces(&[close.clone(), far], &[reference], 0.6);
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].score, 0.9);
    }

    #[test]
    fn test_find_similar_faces_empty_references() {
        let face = face_with(0.9, vec![1.0]);
        assert!(find_similar_faces(&[face], &[], 0.6).is_empty());
    }
}
