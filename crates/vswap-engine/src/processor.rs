//! Frame processor capability interface.
//!
//! Every pixel-level effect implements [`FrameProcessor`]. The engine
//! never knows which processors exist; it pulls them from a registry by
//! name and drives the same lifecycle for all of them: preflight once,
//! preprocess per run, transform per frame, postprocess on teardown.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbImage;

use vswap_media::AudioFrame;
use vswap_models::Face;

use crate::error::EngineResult;
use crate::resources::CacheRegistry;

/// What the transformed frames are for. Processors may trade quality
/// for latency in preview and stream modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    Output,
    Preview,
    Stream,
}

/// Everything a processor may consult for one frame. Reference faces
/// are not carried here; selection reads them from the shared
/// [`crate::face_store::ReferenceFaceStore`].
pub struct FrameInputs {
    pub target_frame: RgbImage,
    /// Identity donors, for processors that map one face onto another.
    pub source_faces: Vec<Face>,
    /// Audio aligned with this frame, for audio-driven processors.
    pub audio_frame: Option<AudioFrame>,
    pub frame_number: u64,
}

pub trait FrameProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate external requirements (model files, backends) before any
    /// frame work starts.
    fn preflight_check(&self) -> EngineResult<()>;

    /// Per-run setup such as loading the inference session.
    fn preprocess(&self, mode: ProcessMode) -> EngineResult<()>;

    /// Produce the transformed frame. Must not touch the filesystem.
    fn transform_frame(&self, inputs: &FrameInputs) -> EngineResult<RgbImage>;

    /// Release the processor's inference session. Shared caches are torn
    /// down by the memory policy, not here.
    fn postprocess(&self, caches: &CacheRegistry);
}

type ProcessorFactory = Box<dyn Fn() -> Arc<dyn FrameProcessor> + Send + Sync>;

/// Name-tagged processor constructors.
#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<&'static str, ProcessorFactory>,
    order: Vec<&'static str>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn() -> Arc<dyn FrameProcessor> + Send + Sync + 'static,
    {
        if !self.factories.contains_key(name) {
            self.order.push(name);
        }
        self.factories.insert(name, Box::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FrameProcessor>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl FrameProcessor for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn preflight_check(&self) -> EngineResult<()> {
            Ok(())
        }

        fn preprocess(&self, _mode: ProcessMode) -> EngineResult<()> {
            Ok(())
        }

        fn transform_frame(&self, inputs: &FrameInputs) -> EngineResult<RgbImage> {
            Ok(inputs.target_frame.clone())
        }

        fn postprocess(&self, _caches: &CacheRegistry) {}
    }

    #[test]
    fn test_registry_lookup_and_order() {
        let mut registry = ProcessorRegistry::new();
        registry.register("upper", || Arc::new(Upper));
        registry.register("other", || Arc::new(Upper));

        assert_eq!(registry.names(), &["upper", "other"]);
        assert!(registry.get("upper").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.get("upper").unwrap().name(), "upper");
    }

    #[test]
    fn test_reregistration_keeps_single_name_entry() {
        let mut registry = ProcessorRegistry::new();
        registry.register("upper", || Arc::new(Upper));
        registry.register("upper", || Arc::new(Upper));
        assert_eq!(registry.names(), &["upper"]);
    }
}
