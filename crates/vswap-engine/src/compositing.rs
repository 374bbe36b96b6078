//! Geometric compositing primitives.
//!
//! Frames are warped into a canonical crop space for mask and transform
//! work, then pasted back through the exact inverse of the same matrix.
//! All sampling is bilinear and purely arithmetic, so identical inputs
//! reproduce identical output bits.

use image::RgbImage;
use tracing::debug;

use vswap_models::{BoundingBox, Point2};

use crate::affine::{estimate_similarity, AffineMatrix, WarpTemplate};
use crate::error::{EngineError, EngineResult};
use crate::mask::Mask;

/// Faces with a bounding box smaller than this (either side) skip debug
/// annotation overlays. Swap and sync transforms are never gated on it.
pub const MIN_DEBUG_FACE_SIZE: u32 = 60;

/// Whether a face is large enough for annotation overlays.
pub fn is_annotatable(bounding_box: &BoundingBox) -> bool {
    let annotatable = bounding_box.width() >= MIN_DEBUG_FACE_SIZE as f32
        && bounding_box.height() >= MIN_DEBUG_FACE_SIZE as f32;
    if !annotatable {
        debug!(
            "face {:.0}x{:.0} below {}px, skipping annotation overlays",
            bounding_box.width(),
            bounding_box.height(),
            MIN_DEBUG_FACE_SIZE
        );
    }
    annotatable
}

/// Align a landmark set to a named template and resample the frame into
/// crop space. Returns the crop together with the frame-to-crop matrix
/// needed for paste-back.
pub fn warp_face_by_landmarks(
    frame: &RgbImage,
    landmarks: &[Point2],
    template: WarpTemplate,
    crop_size: (u32, u32),
) -> EngineResult<(RgbImage, AffineMatrix)> {
    let target = template.scaled_points(crop_size.0, crop_size.1);
    let matrix = estimate_similarity(landmarks, &target).ok_or_else(|| {
        EngineError::DegenerateGeometry("landmark set does not define a similarity".to_string())
    })?;

    let crop = warp_image(frame, &matrix, crop_size.0, crop_size.1)?;
    Ok((crop, matrix))
}

/// Axis-aligned analogue of the landmark warp for region-only crops.
pub fn warp_by_bounding_box(
    frame: &RgbImage,
    bounding_box: &BoundingBox,
    crop_size: (u32, u32),
) -> EngineResult<(RgbImage, AffineMatrix)> {
    let (width, height) = (bounding_box.width() as f64, bounding_box.height() as f64);
    if width <= 0.0 || height <= 0.0 {
        return Err(EngineError::DegenerateGeometry(
            "bounding box has no area".to_string(),
        ));
    }

    let sx = crop_size.0 as f64 / width;
    let sy = crop_size.1 as f64 / height;
    let matrix = AffineMatrix::from_scale_translation(
        sx,
        sy,
        -(bounding_box.x1 as f64) * sx,
        -(bounding_box.y1 as f64) * sy,
    );

    let crop = warp_image(frame, &matrix, crop_size.0, crop_size.1)?;
    Ok((crop, matrix))
}

/// Resample `frame` through `matrix` (frame space to crop space) into a
/// crop of the given size. Pixels mapping outside the frame are black.
pub fn warp_image(
    frame: &RgbImage,
    matrix: &AffineMatrix,
    width: u32,
    height: u32,
) -> EngineResult<RgbImage> {
    let inverse = matrix.inverse().ok_or_else(|| {
        EngineError::DegenerateGeometry("warp matrix is singular".to_string())
    })?;

    let mut crop = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (sx, sy) = inverse.apply_f64(x as f64, y as f64);
            let rgb = sample_bilinear(frame, sx, sy);
            crop.put_pixel(x, y, image::Rgb([rgb[0] as u8, rgb[1] as u8, rgb[2] as u8]));
        }
    }
    Ok(crop)
}

/// Inverse-warp a processed crop back into frame space and alpha-blend
/// it over the original using the crop-space mask as per-pixel weight:
/// `result = original*(1-w) + crop*w`.
pub fn paste_back(
    original: &RgbImage,
    crop: &RgbImage,
    mask: &Mask,
    matrix: &AffineMatrix,
) -> EngineResult<RgbImage> {
    let inverse = matrix.inverse().ok_or_else(|| {
        EngineError::DegenerateGeometry("paste-back matrix is singular".to_string())
    })?;

    let (frame_w, frame_h) = original.dimensions();
    let (crop_w, crop_h) = crop.dimensions();

    // Frame-space footprint of the crop, from its corners through the
    // exact inverse, clamped to the frame.
    let corners = [
        inverse.apply_f64(0.0, 0.0),
        inverse.apply_f64(crop_w as f64 - 1.0, 0.0),
        inverse.apply_f64(0.0, crop_h as f64 - 1.0),
        inverse.apply_f64(crop_w as f64 - 1.0, crop_h as f64 - 1.0),
    ];
    let min_x = corners.iter().map(|c| c.0).fold(f64::MAX, f64::min).floor().max(0.0) as u32;
    let min_y = corners.iter().map(|c| c.1).fold(f64::MAX, f64::min).floor().max(0.0) as u32;
    let max_x = (corners.iter().map(|c| c.0).fold(f64::MIN, f64::max).ceil() as i64)
        .clamp(0, frame_w as i64 - 1) as u32;
    let max_y = (corners.iter().map(|c| c.1).fold(f64::MIN, f64::max).ceil() as i64)
        .clamp(0, frame_h as i64 - 1) as u32;

    let mut result = original.clone();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (cx, cy) = matrix.apply_f64(x as f64, y as f64);
            if cx < 0.0 || cy < 0.0 || cx > crop_w as f64 - 1.0 || cy > crop_h as f64 - 1.0 {
                continue;
            }

            let weight = sample_mask_bilinear(mask, cx, cy).clamp(0.0, 1.0) as f64;
            if weight <= 0.0 {
                continue;
            }

            let base = original.get_pixel(x, y).0;
            let swap = sample_bilinear(crop, cx, cy);
            let blended = [
                (base[0] as f64 * (1.0 - weight) + swap[0] * weight).round() as u8,
                (base[1] as f64 * (1.0 - weight) + swap[1] * weight).round() as u8,
                (base[2] as f64 * (1.0 - weight) + swap[2] * weight).round() as u8,
            ];
            result.put_pixel(x, y, image::Rgb(blended));
        }
    }
    Ok(result)
}

/// Bilinear RGB sample; out-of-bounds reads are black.
fn sample_bilinear(frame: &RgbImage, x: f64, y: f64) -> [f64; 3] {
    let (w, h) = frame.dimensions();
    if x < 0.0 || y < 0.0 || x > w as f64 - 1.0 || y > h as f64 - 1.0 {
        return [0.0, 0.0, 0.0];
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut out = [0.0; 3];
    let p00 = frame.get_pixel(x0, y0).0;
    let p10 = frame.get_pixel(x1, y0).0;
    let p01 = frame.get_pixel(x0, y1).0;
    let p11 = frame.get_pixel(x1, y1).0;
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Bilinear mask sample; out-of-bounds reads are zero weight.
fn sample_mask_bilinear(mask: &Mask, x: f64, y: f64) -> f32 {
    let (h, w) = mask.dim();
    if x < 0.0 || y < 0.0 || x > w as f64 - 1.0 || y > h as f64 - 1.0 {
        return 0.0;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = mask[(y0, x0)] * (1.0 - fx) + mask[(y0, x1)] * fx;
    let bottom = mask[(y1, x0)] * (1.0 - fx) + mask[(y1, x1)] * fx;
    top * (1.0 - fy) + bottom * fy
}
