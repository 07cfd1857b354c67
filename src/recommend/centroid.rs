//! Taste centroid: the component-wise mean of a set of embeddings.

use super::error::RecommendError;

/// Mean vector of `embeddings`, or `None` when there is nothing to average.
///
/// All inputs must share one dimensionality. A mismatch is a data-integrity
/// error, never truncated away.
pub fn compute_centroid(embeddings: &[Vec<f32>]) -> Result<Option<Vec<f32>>, RecommendError> {
    let first = match embeddings.first() {
        Some(f) => f,
        None => return Ok(None),
    };
    let dim = first.len();

    let mut sum = vec![0.0f32; dim];
    for embedding in embeddings {
        if embedding.len() != dim {
            return Err(RecommendError::DimensionMismatch {
                expected: dim,
                found: embedding.len(),
            });
        }
        for (acc, x) in sum.iter_mut().zip(embedding) {
            *acc += x;
        }
    }

    let n = embeddings.len() as f32;
    Ok(Some(sum.into_iter().map(|s| s / n).collect()))
}
