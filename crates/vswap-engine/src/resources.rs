//! Lifecycle management for heavy in-memory resources.
//!
//! Inference sessions live in a [`ModelPool`] shared between workers,
//! and every process-wide cache registers in a [`CacheRegistry`] so the
//! memory policy can tear them down in one sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use vswap_models::MemoryStrategy;

use crate::error::EngineResult;
use crate::processor::FrameProcessor;

/// Anything holding process-wide cached state that can be dropped.
pub trait Clearable: Send + Sync {
    fn clear(&self);
}

impl<F> Clearable for F
where
    F: Fn() + Send + Sync,
{
    fn clear(&self) {
        self()
    }
}

/// Shared cache of loaded models keyed by identity.
///
/// `acquire` takes the read lock first and only upgrades to the write
/// lock when the model is missing, so the steady state is contention
/// free. The init closure runs at most once per key between clears.
pub struct ModelPool<T> {
    models: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for ModelPool<T> {
    fn default() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> ModelPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the model for `key`, loading it through `init` on first use.
    pub fn acquire<F>(&self, key: &str, init: F) -> EngineResult<Arc<T>>
    where
        F: FnOnce() -> EngineResult<T>,
    {
        if let Ok(models) = self.models.read() {
            if let Some(model) = models.get(key) {
                return Ok(model.clone());
            }
        }

        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        // Another worker may have loaded it while we waited.
        if let Some(model) = models.get(key) {
            return Ok(model.clone());
        }

        debug!(key, "loading model");
        let model = Arc::new(init()?);
        models.insert(key.to_string(), model.clone());
        Ok(model)
    }

    /// Drop one model. Outstanding `Arc` handles keep it alive until the
    /// last worker finishes with it.
    pub fn release(&self, key: &str) -> bool {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.clear();
    }

    pub fn len(&self) -> usize {
        self.models
            .read()
            .map(|models| models.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named registry of the shared caches a strict teardown must empty:
/// static images, face analysis, content safety, occlusion and region
/// segmentation.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Vec<(&'static str, Arc<dyn Clearable>)>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, cache: Arc<dyn Clearable>) {
        self.caches.push((name, cache));
    }

    /// Clear each registered cache once.
    pub fn clear_all(&self) {
        for (name, cache) in &self.caches {
            debug!(cache = name, "clearing cache");
            cache.clear();
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.caches.iter().map(|(name, _)| *name).collect()
    }
}

/// Registry pre-wired with the caches this crate owns. Collaborator
/// caches (content safety, occlusion, region) register on top via
/// [`CacheRegistry::register`].
pub fn base_cache_registry(analyser: Arc<crate::analyser::CachingAnalyser>) -> CacheRegistry {
    let mut registry = CacheRegistry::new();
    registry.register(
        "static-image",
        Arc::new(vswap_media::vision::clear_static_image_cache),
    );
    registry.register("face-analysis", Arc::new(move || analyser.clear()));
    registry
}

/// Tiered teardown after a unit of work.
///
/// `None` keeps everything warm, `Moderate` drops the processor's
/// inference session, `Strict` additionally clears every registered
/// cache. Called once per image and once after a whole video.
pub fn apply_memory_policy(
    strategy: MemoryStrategy,
    processor: &dyn FrameProcessor,
    caches: &CacheRegistry,
) {
    match strategy {
        MemoryStrategy::None => {}
        MemoryStrategy::Moderate => {
            debug!(processor = processor.name(), "releasing inference session");
            processor.postprocess(caches);
        }
        MemoryStrategy::Strict => {
            debug!(processor = processor.name(), "releasing inference session and caches");
            processor.postprocess(caches);
            caches.clear_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::RgbImage;

    use crate::error::EngineError;
    use crate::processor::{FrameInputs, ProcessMode};

    struct CountingCache(AtomicUsize);

    impl Clearable for CountingCache {
        fn clear(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoopProcessor {
        teardowns: AtomicUsize,
    }

    impl FrameProcessor for NoopProcessor {
        fn name(&self) -> &'static str {
            "noop"
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

        fn postprocess(&self, _caches: &CacheRegistry) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_model_pool_initializes_once() {
        let pool: ModelPool<String> = ModelPool::new();
        let inits = AtomicUsize::new(0);

        let a = pool
            .acquire("swap", || {
                inits.fetch_add(1, Ordering::SeqCst);
                Ok("weights".to_string())
            })
            .unwrap();
        let b = pool
            .acquire("swap", || {
                inits.fetch_add(1, Ordering::SeqCst);
                Ok("weights".to_string())
            })
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_model_pool_failed_init_is_not_cached() {
        let pool: ModelPool<String> = ModelPool::new();
        let failed: EngineResult<Arc<String>> =
            pool.acquire("swap", || Err(EngineError::ModelLoadFailed("missing".into())));
        assert!(failed.is_err());
        assert!(pool.is_empty());

        let ok = pool.acquire("swap", || Ok("weights".to_string()));
        assert!(ok.is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_model_pool_release_and_clear() {
        let pool: ModelPool<u32> = ModelPool::new();
        pool.acquire("a", || Ok(1)).unwrap();
        pool.acquire("b", || Ok(2)).unwrap();

        assert!(pool.release("a"));
        assert!(!pool.release("a"));
        assert_eq!(pool.len(), 1);

        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_strict_policy_clears_every_cache_exactly_once() {
        let caches: Vec<Arc<CountingCache>> = (0..5)
            .map(|_| Arc::new(CountingCache(AtomicUsize::new(0))))
            .collect();

        let mut registry = CacheRegistry::new();
        let names = [
            "static-image",
            "face-analysis",
            "content-safety",
            "occlusion",
            "region",
        ];
        for (name, cache) in names.iter().zip(&caches) {
            registry.register(name, cache.clone() as Arc<dyn Clearable>);
        }

        let processor = NoopProcessor {
            teardowns: AtomicUsize::new(0),
        };
        apply_memory_policy(MemoryStrategy::Strict, &processor, &registry);

        assert_eq!(processor.teardowns.load(Ordering::SeqCst), 1);
        for cache in &caches {
            assert_eq!(cache.0.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_none_policy_clears_nothing() {
        let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
        let mut registry = CacheRegistry::new();
        registry.register("face-analysis", cache.clone() as Arc<dyn Clearable>);

        let processor = NoopProcessor {
            teardowns: AtomicUsize::new(0),
        };
        apply_memory_policy(MemoryStrategy::None, &processor, &registry);

        assert_eq!(processor.teardowns.load(Ordering::SeqCst), 0);
        assert_eq!(cache.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_base_registry_clears_analyser_cache() {
        struct NoFaces;
        impl crate::analyser::FaceAnalyser for NoFaces {
            fn detect(&self, _frame: &RgbImage) -> Vec<vswap_models::Face> {
                Vec::new()
            }
        }

        let analyser = Arc::new(crate::analyser::CachingAnalyser::new(Box::new(NoFaces)));
        let registry = base_cache_registry(analyser.clone());
        assert_eq!(registry.names(), vec!["static-image", "face-analysis"]);

        analyser.get_many_faces(&RgbImage::new(2, 2));
        assert_eq!(analyser.cache_len(), 1);

        registry.clear_all();
        assert_eq!(analyser.cache_len(), 0);
    }

    #[test]
    fn test_moderate_policy_keeps_caches() {
        let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
        let mut registry = CacheRegistry::new();
        registry.register("occlusion", cache.clone() as Arc<dyn Clearable>);

        let processor = NoopProcessor {
            teardowns: AtomicUsize::new(0),
        };
        apply_memory_policy(MemoryStrategy::Moderate, &processor, &registry);

        assert_eq!(processor.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(cache.0.load(Ordering::SeqCst), 0);
    }
}
