//! Errors surfaced by the recommendation pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
    /// Two embeddings of different lengths met in one computation
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A history, track or vector store call failed
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl RecommendError {
    /// Data-integrity failures should be answered with the global fallback
    /// instead of an error page.
    pub fn is_integrity(&self) -> bool {
        matches!(self, RecommendError::DimensionMismatch { .. })
    }
}
