use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

pub type TrackId = String;

/// Canonical form of a genre label: trimmed and Unicode lower-cased.
pub fn normalize_genre(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MusicLibrary {
    pub tracks: BTreeMap<TrackId, Track>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    /// Free-text genre labels, in the order the uploader gave them
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Track {
    /// Approved and not soft-deleted.
    pub fn is_eligible(&self) -> bool {
        self.approved && !self.deleted
    }

    /// Exact label match after [`normalize_genre`] on both sides.
    pub fn has_genre(&self, genre: &str) -> bool {
        let wanted = normalize_genre(genre);
        !wanted.is_empty() && self.genres.iter().any(|g| normalize_genre(g) == wanted)
    }
}

impl MusicLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read track catalog file")?;
        let library =
            serde_json::from_str(&content).context("Failed to parse track catalog JSON")?;
        Ok(library)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize track catalog")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create catalog directory")?;
        }
        fs::write(path, content).context("Failed to write track catalog file")?;
        Ok(())
    }

    pub fn insert(&mut self, track: Track) {
        self.tracks.insert(track.id.clone(), track);
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Eligible tracks carrying any of `genres`, most played first.
    pub fn find_by_genres(
        &self,
        genres: &[String],
        exclude: &HashSet<TrackId>,
        limit: usize,
    ) -> Vec<Track> {
        let mut matches: Vec<&Track> = self
            .tracks
            .values()
            .filter(|t| t.is_eligible())
            .filter(|t| !exclude.contains(&t.id))
            .filter(|t| genres.iter().any(|g| t.has_genre(g)))
            .collect();

        // Stable sort keeps id order among equal play counts
        matches.sort_by(|a, b| b.play_count.cmp(&a.play_count));
        matches.into_iter().take(limit).cloned().collect()
    }

    pub fn top_played(&self, limit: usize) -> Vec<Track> {
        let mut tracks: Vec<&Track> = self.tracks.values().filter(|t| t.is_eligible()).collect();
        tracks.sort_by(|a, b| b.play_count.cmp(&a.play_count));
        tracks.into_iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
pub(crate) fn track(id: &str, genres: &[&str], play_count: u64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Artist".to_string(),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        play_count,
        approved: true,
        deleted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_library() -> MusicLibrary {
        let mut lib = MusicLibrary::default();
        lib.insert(track("a", &["Rock"], 10));
        lib.insert(track("b", &["pop", "rock"], 50));
        lib.insert(track("c", &["Jazz"], 99));
        lib.insert(track("d", &["ROCK"], 10));
        let mut hidden = track("e", &["rock"], 1000);
        hidden.approved = false;
        lib.insert(hidden);
        let mut removed = track("f", &["rock"], 500);
        removed.deleted = true;
        lib.insert(removed);
        lib
    }

    #[test]
    fn test_genre_match_ignores_case() {
        let lib = sample_library();
        let found = lib.find_by_genres(&["rock".to_string()], &HashSet::new(), 10);
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d"]);
    }

    #[test]
    fn test_genre_match_is_exact() {
        let lib = sample_library();
        let found = lib.find_by_genres(&["roc".to_string()], &HashSet::new(), 10);
        assert!(found.is_empty());
    }

    #[test]
    fn test_genre_match_excludes_and_limits() {
        let lib = sample_library();
        let exclude: HashSet<TrackId> = ["b".to_string()].into_iter().collect();
        let found = lib.find_by_genres(&["rock".to_string()], &exclude, 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn test_genre_match_folds_unicode_case() {
        let t = track("x", &["ÉLECTRO"], 0);
        assert!(t.has_genre("électro"));
        assert!(t.has_genre("Électro"));
        assert!(!t.has_genre("electro"));
    }

    #[test]
    fn test_genre_match_ignores_surrounding_whitespace() {
        let t = track("x", &[" Rock "], 0);
        assert!(t.has_genre("rock"));
        assert!(t.has_genre(" Rock"));
        assert!(!t.has_genre("rock n roll"));
        assert!(!t.has_genre("  "));
    }

    #[test]
    fn test_top_played_skips_ineligible() {
        let lib = sample_library();
        let ids: Vec<String> = lib.top_played(3).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracks.json");
        let lib = sample_library();
        lib.save(&path).unwrap();

        let loaded = MusicLibrary::load(&path).unwrap();
        assert_eq!(loaded.tracks.len(), 6);
        assert_eq!(loaded.get("b"), lib.get("b"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let lib = MusicLibrary::load(&dir.path().join("nope.json")).unwrap();
        assert!(lib.tracks.is_empty());
    }
}
