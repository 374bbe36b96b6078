//! Identity swap processor.
//!
//! For every selected target face: warp the frame into the arcface crop,
//! build the configured masks, run the swap backend on the crop, and
//! paste the swapped crop back under the combined mask. A face that
//! fails is skipped; the rest of the frame is unaffected.

use std::sync::Arc;

use image::RgbImage;
use tracing::debug;

use vswap_models::{Face, LandmarkScheme, MaskConfig, MaskKind, SelectionMode, SelectorConfig};

use crate::affine::WarpTemplate;
use crate::analyser::CachingAnalyser;
use crate::compositing::{paste_back, warp_face_by_landmarks};
use crate::error::{EngineError, EngineResult};
use crate::face_store::ReferenceFaceStore;
use crate::mask::{combine_masks, create_static_box_mask, FaceMaskModel, FaceRegion, Mask};
use crate::processor::{FrameInputs, FrameProcessor, ProcessMode};
use crate::resources::{CacheRegistry, ModelPool};
use crate::selector::for_each_target_face;

const CROP_SIZE: (u32, u32) = (128, 128);
const SESSION_KEY: &str = "face_swapper";

/// Inference collaborator mapping a source identity onto a face crop.
pub trait SwapBackend: Send + Sync {
    fn swap(&self, source: &Face, crop: &RgbImage) -> EngineResult<RgbImage>;
}

type SwapLoader = Box<dyn Fn() -> EngineResult<Box<dyn SwapBackend>> + Send + Sync>;

pub struct FaceSwapper {
    analyser: Arc<CachingAnalyser>,
    store: Arc<ReferenceFaceStore>,
    selector: SelectorConfig,
    mask: MaskConfig,
    mask_model: Option<Arc<dyn FaceMaskModel>>,
    session: ModelPool<Box<dyn SwapBackend>>,
    loader: SwapLoader,
}

impl FaceSwapper {
    pub fn new(
        analyser: Arc<CachingAnalyser>,
        store: Arc<ReferenceFaceStore>,
        selector: SelectorConfig,
        mask: MaskConfig,
        mask_model: Option<Arc<dyn FaceMaskModel>>,
        loader: SwapLoader,
    ) -> Self {
        Self {
            analyser,
            store,
            selector,
            mask,
            mask_model,
            session: ModelPool::new(),
            loader,
        }
    }

    fn session(&self) -> EngineResult<Arc<Box<dyn SwapBackend>>> {
        self.session.acquire(SESSION_KEY, || (self.loader)())
    }

    fn swap_face(
        &self,
        backend: &dyn SwapBackend,
        source: &Face,
        face: &Face,
        frame: &RgbImage,
    ) -> EngineResult<RgbImage> {
        let landmarks = face
            .landmark(LandmarkScheme::FiveFrom68)
            .or_else(|| face.landmark(LandmarkScheme::Five))
            .ok_or_else(|| {
                EngineError::Precondition("target face has no five-point landmarks".to_string())
            })?;

        let (crop, matrix) =
            warp_face_by_landmarks(frame, landmarks, WarpTemplate::Arcface128V2, CROP_SIZE)?;

        let mut masks: Vec<Mask> = vec![create_static_box_mask(
            CROP_SIZE.0,
            CROP_SIZE.1,
            self.mask.blur,
            &self.mask.padding,
        )];
        if self.mask.has(MaskKind::Occlusion) {
            if let Some(model) = &self.mask_model {
                masks.push(model.occlusion_mask(&crop));
            }
        }

        let swapped = backend.swap(source, &crop)?;

        // Region segmentation runs on the swapped pixels so eyebrows and
        // lips land where the new identity put them.
        if self.mask.has(MaskKind::Region) {
            if let Some(model) = &self.mask_model {
                masks.push(model.region_mask(&swapped, &FaceRegion::ALL));
            }
        }

        let combined = combine_masks(&masks);
        paste_back(frame, &swapped, &combined, &matrix)
    }
}

impl FrameProcessor for FaceSwapper {
    fn name(&self) -> &'static str {
        "face_swapper"
    }

    fn preflight_check(&self) -> EngineResult<()> {
        if self.selector.is_enabled(SelectionMode::Reference) && self.store.is_empty() {
            return Err(EngineError::Precondition(
                "reference selection enabled but no reference face stored".to_string(),
            ));
        }
        Ok(())
    }

    fn preprocess(&self, _mode: ProcessMode) -> EngineResult<()> {
        self.session().map(|_| ())
    }

    fn transform_frame(&self, inputs: &FrameInputs) -> EngineResult<RgbImage> {
        let Some(source) = inputs.source_faces.first() else {
            return Ok(inputs.target_frame.clone());
        };
        let backend = self.session()?;

        let mut result = inputs.target_frame.clone();
        for_each_target_face(
            &self.selector,
            &self.store,
            &self.analyser,
            &inputs.target_frame,
            |face| match self.swap_face(&**backend, source, face, &result) {
                Ok(frame) => result = frame,
                Err(error) => {
                    debug!(frame = inputs.frame_number, %error, "face swap skipped");
                }
            },
        );
        Ok(result)
    }

    fn postprocess(&self, _caches: &CacheRegistry) {
        self.session.clear();
    }
}
