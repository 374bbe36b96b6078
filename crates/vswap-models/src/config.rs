//! Per-run pipeline configuration.
//!
//! One immutable `RunConfig` is built per processing run and passed into
//! each pipeline stage at construction. Nothing here is process-global.

use serde::{Deserialize, Serialize};

use crate::encoding::EncodingProfile;
use crate::trim::TrimWindow;

/// Tiered teardown policy for heavy in-memory resources between units of
/// work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    /// No teardown.
    None,
    /// Drop the transform's inference session after each processed unit.
    #[default]
    Moderate,
    /// Moderate, plus clearing every shared cache.
    Strict,
}

/// Policy determining which detected faces receive the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Faces similar to a stored reference face, per reference slot.
    Reference,
    /// The single best detected face, if any.
    One,
    /// Every detected face independently.
    Many,
}

impl SelectionMode {
    /// Fixed application order when several modes are enabled.
    pub const ORDER: &'static [SelectionMode] = &[
        SelectionMode::Reference,
        SelectionMode::One,
        SelectionMode::Many,
    ];
}

/// Face selection configuration. Modes are additive, not exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub modes: Vec<SelectionMode>,
    /// Maximum embedding distance for reference-mode matches.
    pub reference_distance: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            modes: vec![SelectionMode::Reference],
            reference_distance: 0.6,
        }
    }
}

impl SelectorConfig {
    pub fn is_enabled(&self, mode: SelectionMode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Mask families that may contribute to the combined crop mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    /// Feathered rectangle inset by the configured padding.
    Box,
    /// Data-driven occlusion mask from the segmentation collaborator.
    Occlusion,
    /// Selected anatomical regions from the segmentation collaborator.
    Region,
    /// Derived from the mouth landmark subset.
    Mouth,
}

/// Box mask inset, in percent of the crop size per edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskPadding {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

/// Mask construction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    pub kinds: Vec<MaskKind>,
    /// Feather radius as a fraction of the crop size.
    pub blur: f32,
    pub padding: MaskPadding,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            kinds: vec![MaskKind::Box],
            blur: 0.3,
            padding: MaskPadding::default(),
        }
    }
}

impl MaskConfig {
    pub fn has(&self, kind: MaskKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Output resolution, always normalized to even dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round both dimensions to the nearest even value.
    pub fn normalize(&self) -> Resolution {
        let even = |v: u32| (v as f64 / 2.0).round() as u32 * 2;
        Resolution::new(even(self.width), even(self.height))
    }

    /// "WxH" string form for filter graphs.
    pub fn pack(&self) -> String {
        let normalized = self.normalize();
        format!("{}x{}", normalized.width, normalized.height)
    }

    /// Parse a "WxH" string.
    pub fn unpack(packed: &str) -> Option<Resolution> {
        let (w, h) = packed.split_once('x')?;
        Some(Resolution::new(w.parse().ok()?, h.parse().ok()?))
    }
}

/// Immutable configuration for one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub trim: TrimWindow,
    /// 0-100 quality for extracted temp frames.
    pub temp_frame_quality: u8,
    /// 0-100 quality for processed still images.
    pub output_image_quality: u8,
    pub output_video: EncodingProfile,
    /// Scale target for extraction; `None` keeps the source resolution.
    #[serde(default)]
    pub output_resolution: Option<Resolution>,
    /// Resample target for extraction; `None` keeps the source fps.
    #[serde(default)]
    pub output_fps: Option<f64>,
    #[serde(default)]
    pub memory_strategy: MemoryStrategy,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub mask: MaskConfig,
    /// Worker count for the frame-transform engine.
    pub execution_thread_count: usize,
    /// Bound on the in-flight batch queue.
    pub execution_queue_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trim: TrimWindow::default(),
            temp_frame_quality: 100,
            output_image_quality: 80,
            output_video: EncodingProfile::default(),
            output_resolution: None,
            output_fps: None,
            memory_strategy: MemoryStrategy::default(),
            selector: SelectorConfig::default(),
            mask: MaskConfig::default(),
            execution_thread_count: 4,
            execution_queue_depth: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_normalize() {
        assert_eq!(Resolution::new(1919, 1079).normalize(), Resolution::new(1920, 1080));
        assert_eq!(Resolution::new(1920, 1080).normalize(), Resolution::new(1920, 1080));
    }

    #[test]
    fn test_resolution_pack_unpack() {
        let res = Resolution::new(1280, 720);
        assert_eq!(res.pack(), "1280x720");
        assert_eq!(Resolution::unpack("1280x720"), Some(res));
        assert_eq!(Resolution::unpack("garbage"), None);
    }

    #[test]
    fn test_selection_order() {
        assert_eq!(
            SelectionMode::ORDER,
            &[SelectionMode::Reference, SelectionMode::One, SelectionMode::Many]
        );
    }

    #[test]
    fn test_memory_strategy_serde() {
        let json = serde_json::to_string(&MemoryStrategy::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
        let parsed: MemoryStrategy = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, MemoryStrategy::None);
    }
}
