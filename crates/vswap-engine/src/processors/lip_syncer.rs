//! Audio-driven mouth animation processor.
//!
//! The face is warped into the ffhq crop, the mouth region is lifted
//! into a close-up crop for the sync backend, and the result is pasted
//! back twice: close-up into the crop, crop into the frame under the
//! combined mouth, box and occlusion masks.

use std::sync::Arc;

use image::RgbImage;
use ndarray::Array2;
use tracing::debug;

use vswap_media::AudioFrame;
use vswap_models::{
    BoundingBox, Face, LandmarkScheme, MaskConfig, MaskKind, SelectionMode, SelectorConfig,
};

use crate::affine::WarpTemplate;
use crate::analyser::CachingAnalyser;
use crate::compositing::{paste_back, warp_by_bounding_box, warp_face_by_landmarks};
use crate::error::{EngineError, EngineResult};
use crate::face_store::ReferenceFaceStore;
use crate::mask::{combine_masks, create_mouth_mask, create_static_box_mask, FaceMaskModel, Mask};
use crate::processor::{FrameInputs, FrameProcessor, ProcessMode};
use crate::resources::{CacheRegistry, ModelPool};
use crate::selector::for_each_target_face;

const CROP_SIZE: (u32, u32) = (512, 512);
const CLOSE_SIZE: (u32, u32) = (96, 96);
/// The mouth box is lifted upward by this fraction of its height so the
/// close-up covers the chin motion the sync model produces.
const MOUTH_LIFT: f32 = 0.125;
const SESSION_KEY: &str = "lip_syncer";

/// Inference collaborator animating a mouth close-up from audio.
pub trait SyncBackend: Send + Sync {
    fn sync(&self, audio: &AudioFrame, close_crop: &RgbImage) -> EngineResult<RgbImage>;
}

type SyncLoader = Box<dyn Fn() -> EngineResult<Box<dyn SyncBackend>> + Send + Sync>;

pub struct LipSyncer {
    analyser: Arc<CachingAnalyser>,
    store: Arc<ReferenceFaceStore>,
    selector: SelectorConfig,
    mask: MaskConfig,
    mask_model: Option<Arc<dyn FaceMaskModel>>,
    session: ModelPool<Box<dyn SyncBackend>>,
    loader: SyncLoader,
}

impl LipSyncer {
    pub fn new(
        analyser: Arc<CachingAnalyser>,
        store: Arc<ReferenceFaceStore>,
        selector: SelectorConfig,
        mask: MaskConfig,
        mask_model: Option<Arc<dyn FaceMaskModel>>,
        loader: SyncLoader,
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

    fn session(&self) -> EngineResult<Arc<Box<dyn SyncBackend>>> {
        self.session.acquire(SESSION_KEY, || (self.loader)())
    }

    fn sync_face(
        &self,
        backend: &dyn SyncBackend,
        audio: &AudioFrame,
        face: &Face,
        frame: &RgbImage,
    ) -> EngineResult<RgbImage> {
        let landmark5 = face
            .landmark(LandmarkScheme::FiveFrom68)
            .or_else(|| face.landmark(LandmarkScheme::Five))
            .ok_or_else(|| {
                EngineError::Precondition("target face has no five-point landmarks".to_string())
            })?;
        let landmark68 = face.landmark(LandmarkScheme::SixtyEight).ok_or_else(|| {
            EngineError::Precondition("lip sync needs the 68-point landmark set".to_string())
        })?;

        let (crop, matrix) =
            warp_face_by_landmarks(frame, landmark5, WarpTemplate::Ffhq512, CROP_SIZE)?;
        let crop_landmark68 = matrix.transform_points(landmark68);

        let mut mouth_box = BoundingBox::from_points(&crop_landmark68);
        mouth_box.y1 -= mouth_box.height() * MOUTH_LIFT;

        let mut masks: Vec<Mask> = vec![
            create_mouth_mask(&crop_landmark68, CROP_SIZE.0, CROP_SIZE.1),
            create_static_box_mask(CROP_SIZE.0, CROP_SIZE.1, self.mask.blur, &self.mask.padding),
        ];
        if self.mask.has(MaskKind::Occlusion) {
            if let Some(model) = &self.mask_model {
                masks.push(model.occlusion_mask(&crop));
            }
        }

        let (close, close_matrix) = warp_by_bounding_box(&crop, &mouth_box, CLOSE_SIZE)?;
        let synced = backend.sync(audio, &close)?;

        // Close-up replaces its full footprint in the crop; the masks
        // only gate the final paste into the frame.
        let full = Array2::<f32>::ones((CLOSE_SIZE.1 as usize, CLOSE_SIZE.0 as usize));
        let crop = paste_back(&crop, &synced, &full, &close_matrix)?;

        let combined = combine_masks(&masks);
        paste_back(frame, &crop, &combined, &matrix)
    }
}

impl FrameProcessor for LipSyncer {
    fn name(&self) -> &'static str {
        "lip_syncer"
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
        let Some(audio) = &inputs.audio_frame else {
            debug!(frame = inputs.frame_number, "no audio for frame, skipping lip sync");
            return Ok(inputs.target_frame.clone());
        };
        let backend = self.session()?;

        let mut result = inputs.target_frame.clone();
        for_each_target_face(
            &self.selector,
            &self.store,
            &self.analyser,
            &inputs.target_frame,
            |face| match self.sync_face(&**backend, audio, face, &result) {
                Ok(frame) => result = frame,
                Err(error) => {
                    debug!(frame = inputs.frame_number, %error, "lip sync skipped");
                }
            },
        );
        Ok(result)
    }

    fn postprocess(&self, _caches: &CacheRegistry) {
        self.session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vswap_models::Point2;

    use crate::analyser::FaceAnalyser;

    struct FixedAnalyser(Vec<Face>);

    impl FaceAnalyser for FixedAnalyser {
        fn detect(&self, _frame: &RgbImage) -> Vec<Face> {
            self.0.clone()
        }
    }

    struct CountingBackend {
        syncs: Arc<AtomicUsize>,
    }

    impl SyncBackend for CountingBackend {
        fn sync(&self, _audio: &AudioFrame, close_crop: &RgbImage) -> EngineResult<RgbImage> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            assert_eq!(close_crop.dimensions(), CLOSE_SIZE);
            Ok(close_crop.clone())
        }
    }

    fn full_face() -> Face {
        let landmark5: Vec<Point2> = WarpTemplate::Ffhq512
            .scaled_points(100, 100)
            .iter()
            .map(|p| [p[0] + 20.0, p[1] + 20.0])
            .collect();
        // A 68-point set with a plausible mouth cluster.
        let mut landmark68: Vec<Point2> = (0..68)
            .map(|i| [30.0 + (i % 10) as f32 * 6.0, 30.0 + (i / 10) as f32 * 10.0])
            .collect();
        for (i, lm) in landmark68.iter_mut().enumerate().skip(48) {
            lm[0] = 55.0 + ((i - 48) % 5) as f32 * 4.0;
            lm[1] = 85.0 + ((i - 48) / 5) as f32 * 3.0;
        }
        Face {
            bounding_box: BoundingBox::from_points(&landmark5),
            landmarks: BTreeMap::from([
                (LandmarkScheme::Five, landmark5),
                (LandmarkScheme::SixtyEight, landmark68),
            ]),
            score: 0.9,
            ..Face::default()
        }
    }

    fn syncer(faces: Vec<Face>, syncs: Arc<AtomicUsize>) -> LipSyncer {
        LipSyncer::new(
            Arc::new(CachingAnalyser::new(Box::new(FixedAnalyser(faces)))),
            Arc::new(ReferenceFaceStore::new()),
            SelectorConfig {
                modes: vec![SelectionMode::Many],
                reference_distance: 0.6,
            },
            MaskConfig::default(),
            None,
            Box::new(move || {
                let syncs = syncs.clone();
                Ok(Box::new(CountingBackend { syncs }) as Box<dyn SyncBackend>)
            }),
        )
    }

    fn audio() -> AudioFrame {
        AudioFrame {
            samples: vec![0; 640],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    #[test]
    fn test_sync_runs_once_per_face() {
        let syncs = Arc::new(AtomicUsize::new(0));
        let processor = syncer(vec![full_face()], syncs.clone());

        let frame = RgbImage::from_pixel(160, 160, image::Rgb([100, 100, 100]));
        let inputs = FrameInputs {
            target_frame: frame,
            source_faces: Vec::new(),
            audio_frame: Some(audio()),
            frame_number: 3,
        };

        let result = processor.transform_frame(&inputs).unwrap();
        assert_eq!(syncs.load(Ordering::SeqCst), 1);
        assert_eq!(result.dimensions(), (160, 160));
    }

    #[test]
    fn test_no_audio_is_identity() {
        let syncs = Arc::new(AtomicUsize::new(0));
        let processor = syncer(vec![full_face()], syncs.clone());

        let frame = RgbImage::from_pixel(64, 64, image::Rgb([5, 6, 7]));
        let inputs = FrameInputs {
            target_frame: frame.clone(),
            source_faces: Vec::new(),
            audio_frame: None,
            frame_number: 0,
        };

        let result = processor.transform_frame(&inputs).unwrap();
        assert_eq!(result, frame);
        assert_eq!(syncs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_face_without_68_landmarks_is_skipped() {
        let mut face = full_face();
        face.landmarks.remove(&LandmarkScheme::SixtyEight);

        let syncs = Arc::new(AtomicUsize::new(0));
        let processor = syncer(vec![face], syncs.clone());

        let frame = RgbImage::from_pixel(64, 64, image::Rgb([5, 6, 7]));
        let inputs = FrameInputs {
            target_frame: frame.clone(),
            source_faces: Vec::new(),
            audio_frame: Some(audio()),
            frame_number: 0,
        };

        let result = processor.transform_frame(&inputs).unwrap();
        assert_eq!(result, frame);
        assert_eq!(syncs.load(Ordering::SeqCst), 0);
    }
}
