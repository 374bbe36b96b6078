//! Compositing primitives and the parallel frame-transform engine.
//!
//! This crate provides:
//! - Canonical-space affine warps with exact inverses
//! - Crop-space mask construction and intersection
//! - Inverse-warp paste-back into the original frame
//! - Face selection (reference/one/many) over analyser output
//! - The pluggable frame-processor capability interface and registry
//! - A bounded-queue worker pool distributing per-frame work
//! - Tiered teardown of heavy in-memory resources

pub mod affine;
pub mod analyser;
pub mod compositing;
pub mod engine;
pub mod error;
pub mod face_store;
pub mod mask;
pub mod processor;
pub mod processors;
pub mod resources;
pub mod run;
pub mod selector;

pub use affine::{estimate_similarity, AffineMatrix, WarpTemplate};
pub use analyser::{find_similar_faces, CachingAnalyser, FaceAnalyser};
pub use compositing::{
    paste_back, warp_by_bounding_box, warp_face_by_landmarks, warp_image, MIN_DEBUG_FACE_SIZE,
};
pub use engine::{partition_batches, process_image, process_video, FrameBatch, FrameTransform};
pub use error::{EngineError, EngineResult};
pub use face_store::{ReferenceFaceStore, ReferenceSlot};
pub use mask::{
    combine_masks, create_mouth_mask, create_static_box_mask, FaceMaskModel, FaceRegion, Mask,
};
pub use processor::{FrameInputs, FrameProcessor, ProcessMode, ProcessorRegistry};
pub use resources::{apply_memory_policy, base_cache_registry, CacheRegistry, Clearable, ModelPool};
pub use run::{build_frame_transform, source_faces_from_image, swap_image, swap_video, RunInputs};
pub use selector::for_each_target_face;
