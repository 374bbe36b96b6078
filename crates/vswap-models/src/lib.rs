//! Shared data models for the VSwap frame pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Face geometry (bounding boxes, landmark sets, embeddings)
//! - Trim windows and frame references
//! - Encoding profiles and quality mapping
//! - Per-run pipeline configuration

pub mod config;
pub mod encoding;
pub mod face;
pub mod frame;
pub mod trim;

// Re-export common types
pub use config::{
    MaskConfig, MaskKind, MaskPadding, MemoryStrategy, Resolution, RunConfig, SelectionMode,
    SelectorConfig,
};
pub use encoding::{frame_quality, EncodingProfile, VideoEncoder, VideoPreset};
pub use face::{
    categorize_age, categorize_gender, face_distance, AgeBracket, BoundingBox, Face, Gender,
    LandmarkScheme, Point2,
};
pub use frame::FrameRef;
pub use trim::TrimWindow;
