//! Distance metrics for vector similarity
//!
//! The index treats the metric as an opaque pairwise scalar function and
//! returns raw scores: squared Euclidean by default, so callers wanting a
//! true Euclidean distance take the square root themselves.

use serde::{Deserialize, Serialize};

/// Distance metrics for measuring vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Squared Euclidean (L2) distance, no square root taken
    #[default]
    SquaredEuclidean,
    /// Cosine similarity (converted to distance: 1 - similarity)
    Cosine,
    /// Dot product (negated for minimum distance)
    DotProduct,
}

impl DistanceMetric {
    /// Compute the distance between two equal-length slices.
    ///
    /// Dimension agreement is enforced by the index before this is called.
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::SquaredEuclidean => squared_euclidean(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }
}

/// Compute squared Euclidean (L2) distance between two vectors
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Compute cosine distance (1 - cosine similarity).
///
/// A zero vector has no direction; pairs involving one score maximally far.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot_product(a, b) / (norm_a * norm_b);
    // Clamp to [-1, 1] to handle floating point errors
    1.0 - similarity.clamp(-1.0, 1.0)
}

/// Compute dot product of two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
