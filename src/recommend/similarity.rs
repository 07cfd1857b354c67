//! Cosine-distance ranking of candidate tracks against a query vector.

use rayon::prelude::*;
use std::collections::HashSet;
use tracing::warn;

use super::stores::TrackEmbedding;
use crate::storage::TrackId;

/// `1 - cos(a, b)`. Zero-magnitude vectors are maximally dissimilar (1.0).
///
/// Callers must not pass vectors of different lengths.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A candidate with its distance to the query (lower = more similar)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTrack {
    pub id: TrackId,
    pub distance: f32,
}

/// Rank `candidates` by distance to `query`, closest first.
///
/// Excluded ids are dropped before ranking. Equal distances keep the pool's
/// original order. Candidates whose dimensionality differs from the query are
/// skipped.
pub fn rank(
    query: Option<&[f32]>,
    candidates: &[TrackEmbedding],
    exclude: &HashSet<TrackId>,
    top_k: usize,
) -> Vec<ScoredTrack> {
    let query = match query {
        Some(q) if top_k > 0 => q,
        _ => return Vec::new(),
    };

    // par_iter + collect preserves pool order, which the stable sort relies on
    let mut results: Vec<ScoredTrack> = candidates
        .par_iter()
        .filter(|c| !exclude.contains(&c.id))
        .filter_map(|c| {
            if c.embedding.len() != query.len() {
                warn!(
                    "Skipping track {}: {} dimensions, query has {}",
                    c.id,
                    c.embedding.len(),
                    query.len()
                );
                return None;
            }
            Some(ScoredTrack {
                id: c.id.clone(),
                distance: cosine_distance(query, &c.embedding),
            })
        })
        .collect();

    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results.truncate(top_k);
    results
}

/// Ids only, for callers that do not care about the scores.
pub fn rank_ids(
    query: Option<&[f32]>,
    candidates: &[TrackEmbedding],
    exclude: &HashSet<TrackId>,
    top_k: usize,
) -> Vec<TrackId> {
    rank(query, candidates, exclude, top_k)
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, embedding: &[f32]) -> TrackEmbedding {
        TrackEmbedding {
            id: id.to_string(),
            embedding: embedding.to_vec(),
        }
    }

    #[test]
    fn test_cosine_distance_identical() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_vector() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 1.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 1.0], &[0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_cosine_distance_opposite() {
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_orders_closest_first() {
        let pool = vec![
            candidate("far", &[0.0, 1.0]),
            candidate("near", &[1.0, 0.1]),
            candidate("mid", &[1.0, 1.0]),
        ];
        let ids = rank_ids(Some(&[1.0, 0.0][..]), &pool, &HashSet::new(), 10);
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_rank_ties_keep_pool_order() {
        let pool = vec![
            candidate("z", &[0.5, 1.0]),
            candidate("a", &[0.5, 1.0]),
            candidate("m", &[0.5, 1.0]),
        ];
        let ids = rank_ids(Some(&[1.0, 1.0][..]), &pool, &HashSet::new(), 10);
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_rank_excludes_and_truncates() {
        let pool = vec![
            candidate("a", &[1.0, 0.0]),
            candidate("b", &[1.0, 0.2]),
            candidate("c", &[1.0, 0.4]),
        ];
        let exclude: HashSet<TrackId> = ["a".to_string()].into_iter().collect();
        let ids = rank_ids(Some(&[1.0, 0.0][..]), &pool, &exclude, 1);
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_rank_returns_fewer_than_k() {
        let pool = vec![candidate("a", &[1.0, 0.0])];
        assert_eq!(rank_ids(Some(&[1.0, 0.0][..]), &pool, &HashSet::new(), 5).len(), 1);
    }

    #[test]
    fn test_rank_without_query_or_pool() {
        let pool = vec![candidate("a", &[1.0, 0.0])];
        assert!(rank(None, &pool, &HashSet::new(), 5).is_empty());
        assert!(rank(Some(&[1.0, 0.0][..]), &[], &HashSet::new(), 5).is_empty());
    }

    #[test]
    fn test_rank_skips_mismatched_dimensions() {
        let pool = vec![candidate("short", &[1.0]), candidate("ok", &[0.0, 1.0])];
        let ids = rank_ids(Some(&[1.0, 0.0][..]), &pool, &HashSet::new(), 5);
        assert_eq!(ids, vec!["ok"]);
    }
}
