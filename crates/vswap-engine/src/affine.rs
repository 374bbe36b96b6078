//! 2x3 affine transforms between frame space and crop space.
//!
//! Every forward warp retains its matrix so paste-back can invert it
//! exactly. Inversion is closed-form on the 2x2 block; there is no
//! least-squares refit anywhere in this module, so identical inputs
//! always produce identical outputs.

use serde::{Deserialize, Serialize};

use vswap_models::Point2;

/// A 2x3 row-major affine matrix mapping source points to destination
/// points: `dst = M * [x, y, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    pub m: [[f64; 3]; 2],
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    pub fn new(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    /// Axis-aligned scale plus translation.
    pub fn from_scale_translation(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            m: [[sx, 0.0, tx], [0.0, sy, ty]],
        }
    }

    /// Map a single point.
    #[inline]
    pub fn apply(&self, p: Point2) -> Point2 {
        let (x, y) = (p[0] as f64, p[1] as f64);
        [
            (self.m[0][0] * x + self.m[0][1] * y + self.m[0][2]) as f32,
            (self.m[1][0] * x + self.m[1][1] * y + self.m[1][2]) as f32,
        ]
    }

    /// Map a point in f64 precision (used by the pixel samplers).
    #[inline]
    pub fn apply_f64(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m[0][0] * x + self.m[0][1] * y + self.m[0][2],
            self.m[1][0] * x + self.m[1][1] * y + self.m[1][2],
        )
    }

    /// Map a whole landmark set.
    pub fn transform_points(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|p| self.apply(*p)).collect()
    }

    /// Exact inverse. `None` when the linear block is singular.
    pub fn inverse(&self) -> Option<AffineMatrix> {
        let [[a, b, tx], [c, d, ty]] = self.m;
        let det = a * d - b * c;
        if det.abs() < f64::EPSILON {
            return None;
        }

        let (ia, ib) = (d / det, -b / det);
        let (ic, id) = (-c / det, a / det);
        Some(AffineMatrix {
            m: [
                [ia, ib, -(ia * tx + ib * ty)],
                [ic, id, -(ic * tx + id * ty)],
            ],
        })
    }
}

/// Estimate the similarity transform (uniform scale, rotation,
/// translation) mapping `src` onto `dst` by closed-form least squares.
///
/// Deterministic: no sampling, no iteration. `None` when the point sets
/// are degenerate (fewer than two points, mismatched lengths, or all
/// sources coincident).
pub fn estimate_similarity(src: &[Point2], dst: &[Point2]) -> Option<AffineMatrix> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }

    let n = src.len() as f64;
    let mean = |pts: &[Point2]| {
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0] as f64, sy + p[1] as f64));
        (sx / n, sy / n)
    };
    let (mx_src, my_src) = mean(src);
    let (mx_dst, my_dst) = mean(dst);

    // Treat centered points as complex numbers: the optimal s*R is
    // sum(w * conj(z)) / sum(|z|^2).
    let mut num_re = 0.0;
    let mut num_im = 0.0;
    let mut den = 0.0;
    for (z, w) in src.iter().zip(dst) {
        let (zx, zy) = (z[0] as f64 - mx_src, z[1] as f64 - my_src);
        let (wx, wy) = (w[0] as f64 - mx_dst, w[1] as f64 - my_dst);
        num_re += wx * zx + wy * zy;
        num_im += wy * zx - wx * zy;
        den += zx * zx + zy * zy;
    }

    if den < f64::EPSILON {
        return None;
    }

    let a = num_re / den;
    let b = num_im / den;
    let tx = mx_dst - (a * mx_src - b * my_src);
    let ty = my_dst - (b * mx_src + a * my_src);

    Some(AffineMatrix {
        m: [[a, -b, tx], [b, a, ty]],
    })
}

/// Named landmark templates a face crop can be aligned to. Points are
/// normalized to [0,1] and scaled by the crop size at warp time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpTemplate {
    Arcface112V2,
    Arcface128V2,
    Ffhq512,
}

impl WarpTemplate {
    /// The fixed five-point reference layout for this template.
    pub fn points(&self) -> &'static [Point2; 5] {
        match self {
            WarpTemplate::Arcface112V2 => &[
                [0.341_916_07, 0.461_574_11],
                [0.656_533_93, 0.459_833_93],
                [0.500_225_00, 0.640_505_36],
                [0.370_975_89, 0.824_691_96],
                [0.631_516_96, 0.823_250_89],
            ],
            WarpTemplate::Arcface128V2 => &[
                [0.361_676_56, 0.403_877_34],
                [0.636_967_19, 0.402_354_69],
                [0.500_196_87, 0.560_442_19],
                [0.387_103_91, 0.721_605_47],
                [0.615_077_34, 0.720_344_53],
            ],
            WarpTemplate::Ffhq512 => &[
                [0.376_916_76, 0.468_646_64],
                [0.622_856_97, 0.469_128_13],
                [0.501_238_59, 0.613_319_04],
                [0.393_088_22, 0.725_411_00],
                [0.611_502_05, 0.724_904_65],
            ],
        }
    }

    /// Template points scaled to a crop size.
    pub fn scaled_points(&self, crop_width: u32, crop_height: u32) -> Vec<Point2> {
        self.points()
            .iter()
            .map(|p| [p[0] * crop_width as f32, p[1] * crop_height as f32])
            .collect()
    }
}
