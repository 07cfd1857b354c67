//! Per-user play history.
//!
//! One entry per (user, track) pair. Repeated plays only move `last_play`
//! forward, so the history of a user doubles as the set of every track they
//! have ever finished.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::recommend::HistoryStore;
use crate::storage::TrackId;

pub type UserId = String;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayHistoryEntry {
    pub track_id: TrackId,
    /// UNIX timestamp (seconds) of the latest completed play
    pub last_play: Option<u64>,
}

#[derive(Debug, Default)]
pub struct PlayHistory {
    entries: DashMap<UserId, Vec<PlayHistoryEntry>>,
}

impl PlayHistory {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read play history file")?;
        let snapshot: BTreeMap<UserId, Vec<PlayHistoryEntry>> =
            serde_json::from_str(&content).context("Failed to parse play history JSON")?;
        Ok(Self {
            entries: snapshot.into_iter().collect(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot: BTreeMap<UserId, Vec<PlayHistoryEntry>> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize play history")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create play history directory")?;
        }
        // Write beside the target and rename, so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).context("Failed to write play history file")?;
        fs::rename(&tmp, path).context("Failed to replace play history file")?;
        Ok(())
    }

    /// Record a completed play, updating the existing entry if there is one.
    pub fn record_play(&self, user_id: &str, track_id: &str, at: u64) {
        let mut list = self.entries.entry(user_id.to_string()).or_default();
        match list.iter_mut().find(|e| e.track_id == track_id) {
            Some(entry) => {
                entry.last_play = Some(entry.last_play.map_or(at, |prev| prev.max(at)));
            }
            None => list.push(PlayHistoryEntry {
                track_id: track_id.to_string(),
                last_play: Some(at),
            }),
        }
    }

    /// Entries most recent first. Missing timestamps sort last.
    pub fn for_user(&self, user_id: &str) -> Vec<PlayHistoryEntry> {
        let mut list = match self.entries.get(user_id) {
            Some(list) => list.value().clone(),
            None => return Vec::new(),
        };
        // `None < Some(_)`, so reversing the comparison puts nulls at the end
        list.sort_by(|a, b| b.last_play.cmp(&a.last_play));
        list
    }

    pub fn user_count(&self) -> usize {
        self.entries.len()
    }
}

impl HistoryStore for PlayHistory {
    fn user_history(&self, user_id: &str) -> Result<Vec<PlayHistoryEntry>> {
        Ok(self.for_user(user_id))
    }
}
