//! Genre affinity: which genres a listener favours, and unheard tracks in them.

use anyhow::Result;
use std::collections::{HashMap, HashSet};

use super::stores::TrackStore;
use crate::storage::{normalize_genre, Track, TrackId};

/// The `n` most frequent genre labels across `tracks`, lower-cased.
///
/// Ties go to the genre encountered first, so pass tracks most recent first.
pub fn top_genres(tracks: &[Track], n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for track in tracks {
        for genre in &track.genres {
            let key = normalize_genre(genre);
            if key.is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(key.clone(), counts.len());
                    counts.push((key, 1));
                }
            }
        }
    }

    // Stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(n).map(|(g, _)| g).collect()
}

/// Most played eligible tracks in any of `genres`, none of them in `exclude`.
pub fn match_by_genre(
    store: &dyn TrackStore,
    genres: &[String],
    exclude: &HashSet<TrackId>,
    limit: usize,
) -> Result<Vec<Track>> {
    if genres.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let tracks = store.tracks_by_genres(genres, limit, exclude)?;
    // Do not trust the store with the exclusion invariant
    Ok(tracks
        .into_iter()
        .filter(|t| !exclude.contains(&t.id))
        .take(limit)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::track;

    #[test]
    fn test_top_genres_counts_case_insensitively() {
        let tracks = vec![
            track("1", &["Rock"], 0),
            track("2", &["pop"], 0),
            track("3", &["rock", "Pop"], 0),
            track("4", &["ROCK"], 0),
        ];
        assert_eq!(top_genres(&tracks, 2), vec!["rock", "pop"]);
    }

    #[test]
    fn test_top_genres_ties_keep_first_seen() {
        let tracks = vec![
            track("1", &["jazz"], 0),
            track("2", &["blues"], 0),
            track("3", &["metal"], 0),
            track("4", &["blues", "jazz"], 0),
        ];
        assert_eq!(top_genres(&tracks, 3), vec!["jazz", "blues", "metal"]);
    }

    #[test]
    fn test_top_genres_skips_blank_labels() {
        let tracks = vec![track("1", &["", "  "], 0), track("2", &[], 0)];
        assert!(top_genres(&tracks, 3).is_empty());
    }

    #[test]
    fn test_top_genres_match_their_source_labels() {
        let tracks = vec![track("1", &["Électro", " Rock"], 0)];
        let genres = top_genres(&tracks, 2);
        assert_eq!(genres, vec!["électro", "rock"]);
        assert!(genres.iter().all(|g| tracks[0].has_genre(g)));
    }

    #[test]
    fn test_top_genres_fewer_than_n() {
        let tracks = vec![track("1", &["ambient"], 0)];
        assert_eq!(top_genres(&tracks, 3), vec!["ambient"]);
    }
}
