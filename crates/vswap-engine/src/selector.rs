//! Target face selection.
//!
//! Which detected faces a processor transforms is decided here and
//! nowhere else. Enabled modes apply in a fixed order and are additive,
//! so a face picked by several modes is visited once per mode.

use image::RgbImage;

use vswap_models::{SelectionMode, SelectorConfig};

use crate::analyser::{find_similar_faces, CachingAnalyser};
use crate::face_store::{ReferenceFaceStore, ReferenceSlot};

/// Apply `f` to every target face in the frame, in mode order
/// reference, one, many. Reference mode matches per slot: a face similar
/// to references in both slots is visited for each slot.
pub fn for_each_target_face<F>(
    config: &SelectorConfig,
    store: &ReferenceFaceStore,
    analyser: &CachingAnalyser,
    frame: &RgbImage,
    mut f: F,
) where
    F: FnMut(&vswap_models::Face),
{
    let faces = analyser.get_many_faces(frame);

    for mode in SelectionMode::ORDER {
        if !config.is_enabled(*mode) {
            continue;
        }
        match mode {
            SelectionMode::Reference => {
                for slot in ReferenceSlot::ALL {
                    let references = store.get(slot);
                    if references.is_empty() {
                        continue;
                    }
                    for face in
                        find_similar_faces(&faces, &references, config.reference_distance)
                    {
                        f(&face);
                    }
                }
            }
            SelectionMode::One => {
                if let Some(face) = faces.first() {
                    f(face);
                }
            }
            SelectionMode::Many => {
                for face in &faces {
                    f(face);
                }
            }
        }
    }
}
