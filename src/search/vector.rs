//! Fixed-dimension vector math: L2 normalization and cosine similarity.

use thiserror::Error;

/// Norms at or below this value are treated as degenerate.
pub const NORM_EPSILON: f32 = 1e-10;

/// Added to the cosine denominator for numeric stability with tiny norms.
/// It never hides invalid input: zero vectors are rejected by [`normalize`]
/// before they reach a comparison.
pub const SIMILARITY_EPSILON: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    #[error("degenerate vector: norm {norm} is too small to normalize")]
    Degenerate { norm: f32 },

    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Euclidean norm of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide `v` by its Euclidean norm.
///
/// Fails with [`VectorError::Degenerate`] for empty vectors, non-finite norms,
/// and norms at or below [`NORM_EPSILON`].
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, VectorError> {
    let norm = l2_norm(v);
    if v.is_empty() || !norm.is_finite() || norm <= NORM_EPSILON {
        return Err(VectorError::Degenerate { norm });
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// `dot(a, b) / (|a| * |b| + ε)`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok(dot / (l2_norm(a) * l2_norm(b) + SIMILARITY_EPSILON))
}
