//! Recommendation assembly.
//!
//! Builds a listener's list in one pass:
//! 1. the most recent plays, newest first
//! 2. unheard tracks from the listener's favourite genres, most played first
//! 3. if still short, unheard tracks closest to the centroid of the recent plays
//!
//! Exclusion always uses the whole history, while the signals (seed, centroid)
//! only use the most recent plays.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use super::centroid::compute_centroid;
use super::error::RecommendError;
use super::genre::{match_by_genre, top_genres};
use super::similarity::{self, ScoredTrack};
use super::stores::{HistoryStore, TrackStore, VectorStore};
use crate::config::RecommendSettings;
use crate::storage::{Track, TrackId};

/// Outcome of a recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub track_ids: Vec<TrackId>,
    /// True when the list is the global top-played fallback
    pub fallback: bool,
}

pub struct Recommender {
    history: Arc<dyn HistoryStore>,
    tracks: Arc<dyn TrackStore>,
    vectors: Arc<dyn VectorStore>,
    settings: RecommendSettings,
}

impl Recommender {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        tracks: Arc<dyn TrackStore>,
        vectors: Arc<dyn VectorStore>,
        settings: RecommendSettings,
    ) -> Self {
        Self {
            history,
            tracks,
            vectors,
            settings,
        }
    }

    pub fn settings(&self) -> &RecommendSettings {
        &self.settings
    }

    /// Ordered track ids for `user_id`, at most `max_results()` long.
    pub fn recommend(&self, user_id: &str) -> Result<Recommendation, RecommendError> {
        let history = self.history.user_history(user_id)?;
        if history.is_empty() {
            debug!("User {} has no history, serving global top", user_id);
            return self.global_fallback();
        }

        let history_ids: Vec<TrackId> = history.into_iter().map(|e| e.track_id).collect();
        let all_history_ids: HashSet<TrackId> = history_ids.iter().cloned().collect();
        let recent_ids: Vec<TrackId> = history_ids
            .iter()
            .take(self.settings.recent_limit)
            .cloned()
            .collect();

        let novel_limit = self.settings.novel_limit;
        let mut novel = self.genre_candidates(&history_ids, &all_history_ids)?;
        let from_genres = novel.len();

        if novel.len() < novel_limit && !recent_ids.is_empty() {
            let wanted = novel_limit - novel.len();
            let ranked = self.embedding_candidates(&recent_ids, &all_history_ids, wanted)?;
            let mut seen: HashSet<TrackId> = novel.iter().cloned().collect();
            for id in ranked {
                if novel.len() >= novel_limit {
                    break;
                }
                if seen.insert(id.clone()) {
                    novel.push(id);
                }
            }
        }
        novel.truncate(novel_limit);

        debug!(
            "User {}: {} recent, {} from genres, {} from embeddings",
            user_id,
            recent_ids.len(),
            from_genres,
            novel.len() - from_genres
        );

        let mut track_ids = recent_ids;
        track_ids.extend(novel);
        if track_ids.is_empty() {
            return self.global_fallback();
        }
        Ok(Recommendation {
            track_ids,
            fallback: false,
        })
    }

    /// Like [`Recommender::recommend`], but answers data-integrity failures
    /// with the global top-played list. Store failures still propagate.
    pub fn recommend_or_fallback(
        &self,
        user_id: &str,
    ) -> Result<Recommendation, RecommendError> {
        match self.recommend(user_id) {
            Err(e) if e.is_integrity() => {
                warn!("Recommendation for {} failed ({}), using fallback", user_id, e);
                self.global_fallback()
            }
            other => other,
        }
    }

    pub fn global_top(&self, limit: usize) -> Result<Vec<Track>, RecommendError> {
        Ok(self.tracks.global_top_played(limit)?)
    }

    /// Tracks closest to `track_id`'s own embedding, optionally restricted to
    /// one genre. A track without an embedding has no neighbours.
    pub fn similar_tracks(
        &self,
        track_id: &str,
        genre: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<ScoredTrack>, RecommendError> {
        let ids = vec![track_id.to_string()];
        let query = match self.vectors.embeddings(&ids)?.into_iter().next() {
            Some(e) => e.embedding,
            None => return Ok(Vec::new()),
        };

        let mut pool = self.vectors.candidate_pool()?;
        if let Some(genre) = genre {
            let pool_ids: Vec<TrackId> = pool.iter().map(|c| c.id.clone()).collect();
            let in_genre: HashSet<TrackId> = self
                .tracks
                .tracks_by_ids(&pool_ids)?
                .into_iter()
                .filter(|t| t.has_genre(genre))
                .map(|t| t.id)
                .collect();
            pool.retain(|c| in_genre.contains(&c.id));
        }

        let exclude: HashSet<TrackId> = ids.into_iter().collect();
        Ok(similarity::rank(Some(query.as_slice()), &pool, &exclude, top_k))
    }

    fn global_fallback(&self) -> Result<Recommendation, RecommendError> {
        let track_ids = self
            .global_top(self.settings.max_results())?
            .into_iter()
            .map(|t| t.id)
            .collect();
        Ok(Recommendation {
            track_ids,
            fallback: true,
        })
    }

    /// Genre-matched novel ids. `history_ids` must be in recency order.
    fn genre_candidates(
        &self,
        history_ids: &[TrackId],
        exclude: &HashSet<TrackId>,
    ) -> Result<Vec<TrackId>, RecommendError> {
        // One batched fetch, then restore recency order for the tie-break
        let fetched = self.tracks.tracks_by_ids(history_ids)?;
        let mut by_id: HashMap<TrackId, Track> =
            fetched.into_iter().map(|t| (t.id.clone(), t)).collect();
        let history_tracks: Vec<Track> = history_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        let genres = top_genres(&history_tracks, self.settings.top_genre_count);
        if genres.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Top genres: {:?}", genres);

        let matched = match_by_genre(
            self.tracks.as_ref(),
            &genres,
            exclude,
            self.settings.novel_limit,
        )?;
        Ok(matched.into_iter().map(|t| t.id).collect())
    }

    /// Up to `wanted` unheard ids nearest the centroid of the recent plays.
    fn embedding_candidates(
        &self,
        recent_ids: &[TrackId],
        exclude: &HashSet<TrackId>,
        wanted: usize,
    ) -> Result<Vec<TrackId>, RecommendError> {
        let seeds: Vec<Vec<f32>> = self
            .vectors
            .embeddings(recent_ids)?
            .into_iter()
            .map(|e| e.embedding)
            .collect();

        let centroid = match compute_centroid(&seeds)? {
            Some(c) => c,
            None => {
                debug!("No embeddings among recent plays, skipping similarity fill");
                return Ok(Vec::new());
            }
        };

        let pool = self.vectors.candidate_pool()?;
        Ok(similarity::rank_ids(
            Some(centroid.as_slice()),
            &pool,
            exclude,
            wanted,
        ))
    }
}
