use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::storage::TrackId;

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct EmbeddingStore {
    /// Dimensionality shared by every vector, fixed by the first insert.
    dimension: Option<usize>,
    data: BTreeMap<TrackId, Vec<f32>>,
}

impl EmbeddingStore {
    /// Load from a binary file. Returns empty store if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).context("Failed to read embedding store file")?;
        let store = bincode::deserialize(&bytes).context("Failed to deserialize embedding store")?;
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create embedding store directory")?;
        }
        let bytes = bincode::serialize(self).context("Failed to serialize embedding store")?;
        fs::write(path, bytes).context("Failed to write embedding store file")?;
        Ok(())
    }

    /// Insert or replace the vector for a track.
    pub fn insert(&mut self, id: TrackId, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            bail!("Refusing empty embedding for track {}", id);
        }
        match self.dimension {
            Some(dim) if dim != embedding.len() => bail!(
                "Embedding for track {} has {} dimensions, store holds {}",
                id,
                embedding.len(),
                dim
            ),
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }
        self.data.insert(id, embedding);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Vec<f32>> {
        self.data.get(id)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries of the canonical dimensionality, in id order.
    pub fn iter_canonical(&self) -> impl Iterator<Item = (&TrackId, &Vec<f32>)> {
        let dim = self.dimension;
        self.data
            .iter()
            .filter(move |(_, v)| Some(v.len()) == dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_insert_fixes_dimension() {
        let mut store = EmbeddingStore::default();
        store.insert("a".into(), vec![1.0, 2.0]).unwrap();
        assert_eq!(store.dimension(), Some(2));
        assert!(store.insert("b".into(), vec![1.0, 2.0, 3.0]).is_err());
        assert!(store.get("b").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejects_empty_vector() {
        let mut store = EmbeddingStore::default();
        assert!(store.insert("a".into(), vec![]).is_err());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin");

        let mut store = EmbeddingStore::default();
        store.insert("a".into(), vec![0.5, 0.25]).unwrap();
        store.insert("b".into(), vec![1.0, 0.0]).unwrap();
        store.save(&path).unwrap();

        let loaded = EmbeddingStore::load(&path).unwrap();
        assert_eq!(loaded.dimension(), Some(2));
        assert_eq!(loaded.get("a"), Some(&vec![0.5, 0.25]));
        let ids: Vec<&TrackId> = loaded.iter_canonical().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
