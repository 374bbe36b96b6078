//! Face geometry produced by the external analyser.
//!
//! These types are read-only inputs to the compositing pipeline: the
//! analyser collaborator fills them in, and the frame processors derive
//! affine transforms and masks from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates.
pub type Point2 = [f32; 2];

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Axis-aligned hull of a landmark set.
    pub fn from_points(points: &[Point2]) -> Self {
        let mut bb = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for p in points {
            bb.x1 = bb.x1.min(p[0]);
            bb.y1 = bb.y1.min(p[1]);
            bb.x2 = bb.x2.max(p[0]);
            bb.y2 = bb.y2.max(p[1]);
        }
        bb
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// Named landmark layouts attached to a face.
///
/// Scheme names follow the analyser's convention: a raw five-point set,
/// a five-point set condensed from the 68-point model, and the full
/// 68-point model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LandmarkScheme {
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "5/68")]
    FiveFrom68,
    #[serde(rename = "68")]
    SixtyEight,
}

/// Age bracket summary from the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    Child,
    Teenager,
    Adult,
    Senior,
}

/// Binary gender summary from the analyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
}

/// Map a raw age estimate to a bracket.
pub fn categorize_age(age: u32) -> AgeBracket {
    match age {
        0..=13 => AgeBracket::Child,
        14..=19 => AgeBracket::Teenager,
        20..=59 => AgeBracket::Adult,
        _ => AgeBracket::Senior,
    }
}

/// Map a raw gender class (0 = female) to a label.
pub fn categorize_gender(value: u32) -> Gender {
    if value == 0 {
        Gender::Female
    } else {
        Gender::Male
    }
}

/// A detected face. Immutable once produced by the analyser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Detection bounding box in frame coordinates.
    pub bounding_box: BoundingBox,
    /// Ordered landmark points keyed by scheme.
    pub landmarks: BTreeMap<LandmarkScheme, Vec<Point2>>,
    /// Detection confidence.
    pub score: f32,
    /// Identity embedding used for reference-mode similarity.
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub age: Option<AgeBracket>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

impl Face {
    /// Look up a landmark set by scheme.
    pub fn landmark(&self, scheme: LandmarkScheme) -> Option<&[Point2]> {
        self.landmarks.get(&scheme).map(Vec::as_slice)
    }
}

/// Identity distance between two faces: `1 - cos(a, b)` over normalized
/// embeddings. Faces without embeddings are maximally distant.
pub fn face_distance(a: &Face, b: &Face) -> f32 {
    if a.embedding.is_empty() || b.embedding.is_empty() || a.embedding.len() != b.embedding.len() {
        return f32::MAX;
    }

    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let (na, nb) = (norm(&a.embedding), norm(&b.embedding));
    if na == 0.0 || nb == 0.0 {
        return f32::MAX;
    }

    let dot: f32 = a
        .embedding
        .iter()
        .zip(&b.embedding)
        .map(|(x, y)| x * y)
        .sum();

    1.0 - dot / (na * nb)
}
