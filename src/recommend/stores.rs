//! Collaborator interfaces the recommender reads from.

use anyhow::Result;
use std::collections::HashSet;

use crate::history::PlayHistoryEntry;
use crate::storage::{Track, TrackId};

/// A track id paired with its feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEmbedding {
    pub id: TrackId,
    pub embedding: Vec<f32>,
}

pub trait HistoryStore: Send + Sync {
    /// Every history entry of the user, most recent play first.
    fn user_history(&self, user_id: &str) -> Result<Vec<PlayHistoryEntry>>;
}

pub trait TrackStore: Send + Sync {
    /// Batched lookup. Unknown ids are skipped; order is unspecified.
    fn tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>>;

    /// Eligible tracks having one of `genres` (case-insensitive), excluding
    /// `exclude`, most played first.
    fn tracks_by_genres(
        &self,
        genres: &[String],
        limit: usize,
        exclude: &HashSet<TrackId>,
    ) -> Result<Vec<Track>>;

    fn global_top_played(&self, limit: usize) -> Result<Vec<Track>>;
}

pub trait VectorStore: Send + Sync {
    /// Embeddings of the eligible tracks among `ids`. Tracks without a vector
    /// are omitted.
    fn embeddings(&self, ids: &[TrackId]) -> Result<Vec<TrackEmbedding>>;

    /// Every eligible track with a vector of the canonical dimensionality.
    fn candidate_pool(&self) -> Result<Vec<TrackEmbedding>>;
}
