//! Diagnostic overlay processor.
//!
//! Draws analyser output straight onto the frame pixels: bounding box,
//! landmark sets, the box mask footprint, a detector-score bar and an
//! age/gender marker. Faces below the minimum annotatable size are left
//! untouched.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use ndarray::Array2;

use vswap_models::{
    AgeBracket, BoundingBox, Face, Gender, LandmarkScheme, MaskConfig, SelectorConfig,
};

use crate::affine::WarpTemplate;
use crate::analyser::CachingAnalyser;
use crate::compositing::{is_annotatable, paste_back, warp_face_by_landmarks};
use crate::error::EngineResult;
use crate::face_store::ReferenceFaceStore;
use crate::mask::create_static_box_mask;
use crate::processor::{FrameInputs, FrameProcessor, ProcessMode};
use crate::resources::CacheRegistry;
use crate::selector::for_each_target_face;

const CROP_SIZE: (u32, u32) = (128, 128);

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LANDMARK5_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LANDMARK68_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const SCORE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const FEMALE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const MALE_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Which overlays to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugItem {
    BoundingBox,
    Landmark5,
    Landmark68,
    FaceMask,
    Score,
    AgeGender,
}

impl DebugItem {
    pub const ALL: [DebugItem; 6] = [
        DebugItem::BoundingBox,
        DebugItem::Landmark5,
        DebugItem::Landmark68,
        DebugItem::FaceMask,
        DebugItem::Score,
        DebugItem::AgeGender,
    ];
}

pub struct FaceDebugger {
    analyser: Arc<CachingAnalyser>,
    store: Arc<ReferenceFaceStore>,
    selector: SelectorConfig,
    mask: MaskConfig,
    items: Vec<DebugItem>,
}

impl FaceDebugger {
    pub fn new(
        analyser: Arc<CachingAnalyser>,
        store: Arc<ReferenceFaceStore>,
        selector: SelectorConfig,
        mask: MaskConfig,
        items: Vec<DebugItem>,
    ) -> Self {
        Self {
            analyser,
            store,
            selector,
            mask,
            items,
        }
    }

    fn annotate(&self, face: &Face, frame: &RgbImage) -> RgbImage {
        let mut result = frame.clone();

        if self.items.contains(&DebugItem::FaceMask) {
            result = self.tint_mask_footprint(face, &result);
        }
        if self.items.contains(&DebugItem::BoundingBox) {
            draw_rect(&mut result, &face.bounding_box, BOX_COLOR);
        }
        if self.items.contains(&DebugItem::Landmark68) {
            if let Some(points) = face.landmark(LandmarkScheme::SixtyEight) {
                for p in points {
                    draw_dot(&mut result, p[0], p[1], 1, LANDMARK68_COLOR);
                }
            }
        }
        if self.items.contains(&DebugItem::Landmark5) {
            if let Some(points) = face
                .landmark(LandmarkScheme::FiveFrom68)
                .or_else(|| face.landmark(LandmarkScheme::Five))
            {
                for p in points {
                    draw_dot(&mut result, p[0], p[1], 2, LANDMARK5_COLOR);
                }
            }
        }
        if self.items.contains(&DebugItem::Score) {
            draw_score_bar(&mut result, face);
        }
        if self.items.contains(&DebugItem::AgeGender) {
            draw_age_gender_marker(&mut result, face);
        }
        result
    }

    /// Brighten the area the box mask would keep, so the feathered
    /// footprint is visible on the frame.
    fn tint_mask_footprint(&self, face: &Face, frame: &RgbImage) -> RgbImage {
        let Some(landmarks) = face
            .landmark(LandmarkScheme::FiveFrom68)
            .or_else(|| face.landmark(LandmarkScheme::Five))
        else {
            return frame.clone();
        };
        let Ok((_, matrix)) =
            warp_face_by_landmarks(frame, landmarks, WarpTemplate::Arcface128V2, CROP_SIZE)
        else {
            return frame.clone();
        };

        let mask = create_static_box_mask(CROP_SIZE.0, CROP_SIZE.1, self.mask.blur, &self.mask.padding);
        let tint: Array2<f32> = mask.mapv(|v| v * 0.35);
        let white = RgbImage::from_pixel(CROP_SIZE.0, CROP_SIZE.1, Rgb([255, 255, 255]));
        paste_back(frame, &white, &tint, &matrix).unwrap_or_else(|_| frame.clone())
    }
}

impl FrameProcessor for FaceDebugger {
    fn name(&self) -> &'static str {
        "face_debugger"
    }

    fn preflight_check(&self) -> EngineResult<()> {
        Ok(())
    }

    fn preprocess(&self, _mode: ProcessMode) -> EngineResult<()> {
        Ok(())
    }

    fn transform_frame(&self, inputs: &FrameInputs) -> EngineResult<RgbImage> {
        let mut result = inputs.target_frame.clone();
        for_each_target_face(
            &self.selector,
            &self.store,
            &self.analyser,
            &inputs.target_frame,
            |face| {
                if is_annotatable(&face.bounding_box) {
                    result = self.annotate(face, &result);
                }
            },
        );
        Ok(result)
    }

    fn postprocess(&self, _caches: &CacheRegistry) {}
}

fn put_pixel_checked(frame: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_rect(frame: &mut RgbImage, bb: &BoundingBox, color: Rgb<u8>) {
    let (x1, y1, x2, y2) = (bb.x1 as i64, bb.y1 as i64, bb.x2 as i64, bb.y2 as i64);
    for x in x1..=x2 {
        put_pixel_checked(frame, x, y1, color);
        put_pixel_checked(frame, x, y2, color);
    }
    for y in y1..=y2 {
        put_pixel_checked(frame, x1, y, color);
        put_pixel_checked(frame, x2, y, color);
    }
}

fn draw_dot(frame: &mut RgbImage, cx: f32, cy: f32, radius: i64, color: Rgb<u8>) {
    let (cx, cy) = (cx as i64, cy as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            put_pixel_checked(frame, cx + dx, cy + dy, color);
        }
    }
}

/// Horizontal bar above the bounding box, length proportional to the
/// detector score over the box width.
fn draw_score_bar(frame: &mut RgbImage, face: &Face) {
    let bb = &face.bounding_box;
    let length = (bb.width() * face.score.clamp(0.0, 1.0)) as i64;
    let y = bb.y1 as i64 - 4;
    for x in 0..length {
        for dy in 0..2 {
            put_pixel_checked(frame, bb.x1 as i64 + x, y + dy, SCORE_COLOR);
        }
    }
}

/// Filled square at the box corner, gender by color, age bracket by
/// notch count under it.
fn draw_age_gender_marker(frame: &mut RgbImage, face: &Face) {
    let color = match face.gender {
        Some(Gender::Female) => FEMALE_COLOR,
        Some(Gender::Male) => MALE_COLOR,
        None => return,
    };
    let bb = &face.bounding_box;
    let (x0, y0) = (bb.x1 as i64 + 2, bb.y1 as i64 + 2);
    for dy in 0..6 {
        for dx in 0..6 {
            put_pixel_checked(frame, x0 + dx, y0 + dy, color);
        }
    }

    let notches = match face.age {
        Some(AgeBracket::Child) => 1,
        Some(AgeBracket::Teenager) => 2,
        Some(AgeBracket::Adult) => 3,
        Some(AgeBracket::Senior) => 4,
        None => 0,
    };
    for n in 0..notches {
        put_pixel_checked(frame, x0 + n * 2, y0 + 8, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use vswap_models::{Point2, SelectionMode};

    use crate::analyser::FaceAnalyser;

    struct FixedAnalyser(Vec<Face>);

    impl FaceAnalyser for FixedAnalyser {
        fn detect(&self, _frame: &RgbImage) -> Vec<Face> {
            self.0.clone()
        }
    }

    fn face(bb: BoundingBox) -> Face {
        let landmarks: Vec<Point2> = WarpTemplate::Arcface128V2
            .scaled_points(bb.width() as u32, bb.height() as u32)
            .iter()
            .map(|p| [p[0] + bb.x1, p[1] + bb.y1])
            .collect();
        Face {
            bounding_box: bb,
            landmarks: BTreeMap::from([(LandmarkScheme::Five, landmarks)]),
            score: 0.8,
            age: Some(AgeBracket::Adult),
            gender: Some(Gender::Female),
            ..Face::default()
        }
    }

    fn debugger(faces: Vec<Face>, items: Vec<DebugItem>) -> FaceDebugger {
        FaceDebugger::new(
            Arc::new(CachingAnalyser::new(Box::new(FixedAnalyser(faces)))),
            Arc::new(ReferenceFaceStore::new()),
            SelectorConfig {
                modes: vec![SelectionMode::Many],
                reference_distance: 0.6,
            },
            MaskConfig::default(),
            items,
        )
    }

    fn inputs(frame: RgbImage) -> FrameInputs {
        FrameInputs {
            target_frame: frame,
            source_faces: Vec::new(),
            audio_frame: None,
            frame_number: 0,
        }
    }

    #[test]
    fn test_bounding_box_pixels_are_drawn() {
        let bb = BoundingBox::new(20.0, 20.0, 100.0, 100.0);
        let processor = debugger(vec![face(bb)], vec![DebugItem::BoundingBox]);

        let frame = RgbImage::from_pixel(160, 160, Rgb([0, 0, 0]));
        let result = processor.transform_frame(&inputs(frame)).unwrap();

        assert_eq!(*result.get_pixel(20, 20), BOX_COLOR);
        assert_eq!(*result.get_pixel(60, 20), BOX_COLOR);
        assert_eq!(*result.get_pixel(100, 60), BOX_COLOR);
        assert_eq!(*result.get_pixel(60, 60), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_small_faces_are_not_annotated() {
        let bb = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        let processor = debugger(vec![face(bb)], DebugItem::ALL.to_vec());

        let frame = RgbImage::from_pixel(80, 80, Rgb([0, 0, 0]));
        let result = processor.transform_frame(&inputs(frame.clone())).unwrap();
        assert_eq!(result, frame);
    }

    #[test]
    fn test_score_bar_length_tracks_score() {
        let bb = BoundingBox::new(10.0, 10.0, 110.0, 110.0);
        let mut short = face(bb);
        short.score = 0.5;
        let processor = debugger(vec![short], vec![DebugItem::Score]);

        let frame = RgbImage::from_pixel(160, 160, Rgb([0, 0, 0]));
        let result = processor.transform_frame(&inputs(frame)).unwrap();

        // 50% of a 100px box.
        assert_eq!(*result.get_pixel(30, 6), SCORE_COLOR);
        assert_eq!(*result.get_pixel(80, 6), Rgb([0, 0, 0]));
    }
}
