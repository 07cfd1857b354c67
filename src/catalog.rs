//! File-backed catalog: track metadata plus their embeddings.

use anyhow::Result;
use std::collections::HashSet;
use tracing::info;

use crate::config::DataPaths;
use crate::embedding_store::EmbeddingStore;
use crate::recommend::{TrackEmbedding, TrackStore, VectorStore};
use crate::storage::{MusicLibrary, Track, TrackId};

#[derive(Debug, Default)]
pub struct Catalog {
    pub library: MusicLibrary,
    pub embeddings: EmbeddingStore,
}

impl Catalog {
    pub fn new(library: MusicLibrary, embeddings: EmbeddingStore) -> Self {
        Self {
            library,
            embeddings,
        }
    }

    pub fn load(paths: &DataPaths) -> Result<Self> {
        let library = MusicLibrary::load(&paths.tracks)?;
        let embeddings = EmbeddingStore::load(&paths.embeddings)?;
        info!(
            "Loaded catalog: {} tracks, {} embeddings (dimension {:?})",
            library.tracks.len(),
            embeddings.len(),
            embeddings.dimension()
        );
        Ok(Self::new(library, embeddings))
    }

    fn eligible(&self, id: &str) -> bool {
        self.library.get(id).map_or(false, |t| t.is_eligible())
    }
}

impl TrackStore for Catalog {
    fn tracks_by_ids(&self, ids: &[TrackId]) -> Result<Vec<Track>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.library.get(id))
            .cloned()
            .collect())
    }

    fn tracks_by_genres(
        &self,
        genres: &[String],
        limit: usize,
        exclude: &HashSet<TrackId>,
    ) -> Result<Vec<Track>> {
        Ok(self.library.find_by_genres(genres, exclude, limit))
    }

    fn global_top_played(&self, limit: usize) -> Result<Vec<Track>> {
        Ok(self.library.top_played(limit))
    }
}

impl VectorStore for Catalog {
    fn embeddings(&self, ids: &[TrackId]) -> Result<Vec<TrackEmbedding>> {
        Ok(ids
            .iter()
            .filter(|id| self.eligible(id))
            .filter_map(|id| {
                self.embeddings.get(id).map(|e| TrackEmbedding {
                    id: id.clone(),
                    embedding: e.clone(),
                })
            })
            .collect())
    }

    fn candidate_pool(&self) -> Result<Vec<TrackEmbedding>> {
        Ok(self
            .embeddings
            .iter_canonical()
            .filter(|(id, _)| self.eligible(id))
            .map(|(id, e)| TrackEmbedding {
                id: id.clone(),
                embedding: e.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::track;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.library.insert(track("a", &["rock"], 1));
        catalog.library.insert(track("b", &["rock"], 2));
        let mut pending = track("c", &["rock"], 3);
        pending.approved = false;
        catalog.library.insert(pending);
        catalog.library.insert(track("no-vector", &["rock"], 4));

        catalog.embeddings.insert("a".into(), vec![1.0, 0.0]).unwrap();
        catalog.embeddings.insert("b".into(), vec![0.0, 1.0]).unwrap();
        catalog.embeddings.insert("c".into(), vec![1.0, 1.0]).unwrap();
        // Vector for a track missing from the library
        catalog.embeddings.insert("orphan".into(), vec![1.0, 1.0]).unwrap();
        catalog
    }

    #[test]
    fn test_embeddings_only_for_eligible_tracks() {
        let catalog = sample_catalog();
        let ids: Vec<TrackId> = ["b", "c", "no-vector", "a", "orphan"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found: Vec<TrackId> = catalog
            .embeddings(&ids)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(found, vec!["b", "a"]);
    }

    #[test]
    fn test_candidate_pool_is_eligible_and_ordered() {
        let catalog = sample_catalog();
        let pool: Vec<TrackId> = catalog
            .candidate_pool()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(pool, vec!["a", "b"]);
    }

    #[test]
    fn test_tracks_by_ids_skips_unknown() {
        let catalog = sample_catalog();
        let ids = vec!["a".to_string(), "ghost".to_string()];
        assert_eq!(catalog.tracks_by_ids(&ids).unwrap().len(), 1);
    }
}
