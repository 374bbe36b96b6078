//! Crop-space masks.
//!
//! A mask is a single-channel weight field over the crop, values in
//! [0,1]. All mask kinds share the crop's coordinate convention so they
//! can be intersected by element-wise minimum.

use image::RgbImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use vswap_models::{MaskPadding, Point2};

/// Single-channel weight field, row-major (height, width).
pub type Mask = Array2<f32>;

/// Anatomical regions the segmentation collaborator can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceRegion {
    Skin,
    LeftEyebrow,
    RightEyebrow,
    LeftEye,
    RightEye,
    Glasses,
    Nose,
    Mouth,
    UpperLip,
    LowerLip,
}

impl FaceRegion {
    pub const ALL: [FaceRegion; 10] = [
        FaceRegion::Skin,
        FaceRegion::LeftEyebrow,
        FaceRegion::RightEyebrow,
        FaceRegion::LeftEye,
        FaceRegion::RightEye,
        FaceRegion::Glasses,
        FaceRegion::Nose,
        FaceRegion::Mouth,
        FaceRegion::UpperLip,
        FaceRegion::LowerLip,
    ];
}

/// External segmentation collaborator producing data-driven masks.
///
/// Implementations wrap the occlusion and region models; this core only
/// consumes their crop-space output.
pub trait FaceMaskModel: Send + Sync {
    /// Mask of unoccluded face pixels in the crop.
    fn occlusion_mask(&self, crop: &RgbImage) -> Mask;

    /// Mask keeping only the selected anatomical regions.
    fn region_mask(&self, crop: &RgbImage, regions: &[FaceRegion]) -> Mask;
}

/// Feathered rectangle inset by per-edge padding (percent of crop size).
///
/// `blur` is a fraction of the crop width; the feather never shrinks
/// below the padded border.
pub fn create_static_box_mask(width: u32, height: u32, blur: f32, padding: &MaskPadding) -> Mask {
    let (w, h) = (width as usize, height as usize);
    let blur_amount = (width as f32 * 0.5 * blur) as usize;
    let blur_area = (blur_amount / 2).max(1);

    let inset = |percent: f32, extent: usize| -> usize {
        blur_area.max((extent as f32 * percent / 100.0) as usize).min(extent)
    };
    let top = inset(padding.top, h);
    let bottom = inset(padding.bottom, h);
    let left = inset(padding.left, w);
    let right = inset(padding.right, w);

    let mut mask = Array2::<f32>::ones((h, w));
    for y in 0..h {
        for x in 0..w {
            if y < top || y >= h - bottom || x < left || x >= w - right {
                mask[(y, x)] = 0.0;
            }
        }
    }

    if blur_amount > 0 {
        blur_mask(&mut mask, blur_amount / 2);
    }
    clip(&mut mask);
    mask
}

/// Mask derived from the mouth landmark subset of a 68-point set
/// (indices 48..68), filled as a convex polygon and feathered.
pub fn create_mouth_mask(landmark68: &[Point2], width: u32, height: u32) -> Mask {
    let mut mask = Array2::<f32>::zeros((height as usize, width as usize));

    if landmark68.len() < 68 {
        return mask;
    }

    let hull = convex_hull(&landmark68[48..68]);
    fill_convex_polygon(&mut mask, &hull);
    blur_mask(&mut mask, (width as usize / 32).max(1));
    clip(&mut mask);
    mask
}

/// Element-wise minimum across the supplied masks, clipped to [0,1].
///
/// A pixel survives only if every mask keeps it. An empty list is a
/// caller error.
pub fn combine_masks(masks: &[Mask]) -> Mask {
    assert!(!masks.is_empty(), "combine_masks requires at least one mask");

    let mut combined = masks[0].clone();
    for mask in &masks[1..] {
        assert_eq!(mask.dim(), combined.dim(), "masks must share crop dimensions");
        combined.zip_mut_with(mask, |a, &b| *a = a.min(b));
    }
    clip(&mut combined);
    combined
}

fn clip(mask: &mut Mask) {
    mask.mapv_inplace(|v| v.clamp(0.0, 1.0));
}

/// Separable box blur, three passes per axis (close to gaussian, fully
/// deterministic).
fn blur_mask(mask: &mut Mask, radius: usize) {
    if radius == 0 {
        return;
    }
    for _ in 0..3 {
        box_blur_axis(mask, radius, true);
        box_blur_axis(mask, radius, false);
    }
}

fn box_blur_axis(mask: &mut Mask, radius: usize, horizontal: bool) {
    let (h, w) = mask.dim();
    let (outer, inner) = if horizontal { (h, w) } else { (w, h) };
    let get = |m: &Mask, o: usize, i: usize| if horizontal { m[(o, i)] } else { m[(i, o)] };

    let mut line = vec![0.0f32; inner];
    for o in 0..outer {
        for (i, slot) in line.iter_mut().enumerate() {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(inner - 1);
            let mut acc = 0.0;
            for j in lo..=hi {
                acc += get(mask, o, j);
            }
            *slot = acc / (hi - lo + 1) as f32;
        }
        for (i, value) in line.iter().enumerate() {
            if horizontal {
                mask[(o, i)] = *value;
            } else {
                mask[(i, o)] = *value;
            }
        }
    }
}

/// Andrew's monotone chain convex hull. Returns vertices in
/// counter-clockwise order.
fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts: Vec<Point2> = points.to_vec();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: Point2, a: Point2, b: Point2| -> f32 {
        (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
    };

    let mut lower: Vec<Point2> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point2> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Scanline fill of a convex polygon with weight 1.0.
fn fill_convex_polygon(mask: &mut Mask, hull: &[Point2]) {
    if hull.len() < 3 {
        return;
    }
    let (h, w) = mask.dim();

    let min_y = hull.iter().map(|p| p[1]).fold(f32::MAX, f32::min).floor().max(0.0) as usize;
    let max_y = hull.iter().map(|p| p[1]).fold(f32::MIN, f32::max).ceil().min(h as f32 - 1.0) as usize;

    for y in min_y..=max_y {
        let yc = y as f32 + 0.5;
        let mut crossings: Vec<f32> = Vec::new();
        for i in 0..hull.len() {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            if (a[1] <= yc && b[1] > yc) || (b[1] <= yc && a[1] > yc) {
                let t = (yc - a[1]) / (b[1] - a[1]);
                crossings.push(a[0] + t * (b[0] - a[0]));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let x0 = pair[0].max(0.0) as usize;
            let x1 = (pair[1].min(w as f32 - 1.0)) as usize;
            for x in x0..=x1 {
                mask[(y, x)] = 1.0;
            }
        }
    }
}
