use clap::Args;
use std::path::{Path, PathBuf};

/// Tuning knobs for the recommendation pipeline.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RecommendSettings {
    /// Number of most recent plays used to seed the result and build the taste centroid
    #[arg(long, env = "RECENT_LIMIT", default_value_t = 10)]
    pub recent_limit: usize,

    /// Number of never-played tracks appended after the recent ones
    #[arg(long, env = "NOVEL_LIMIT", default_value_t = 20)]
    pub novel_limit: usize,

    /// How many of the user's most frequent genres drive the genre match
    #[arg(long = "top-genres", env = "TOP_GENRES", default_value_t = 3)]
    pub top_genre_count: usize,

    /// Default result size for similar-track lookups
    #[arg(long, env = "SIMILAR_LIMIT", default_value_t = 20)]
    pub similar_limit: usize,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            novel_limit: 20,
            top_genre_count: 3,
            similar_limit: 20,
        }
    }
}

impl RecommendSettings {
    /// Upper bound on the length of a recommendation list.
    pub fn max_results(&self) -> usize {
        self.recent_limit + self.novel_limit
    }
}

/// File layout inside a data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub tracks: PathBuf,
    pub embeddings: PathBuf,
    pub history: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            tracks: data_dir.join("tracks.json"),
            embeddings: data_dir.join("embeddings.bin"),
            history: data_dir.join("history.json"),
        }
    }
}
