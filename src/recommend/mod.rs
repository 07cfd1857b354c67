//! Content-based track recommendation.
//!
//! Blends recency, genre affinity and embedding similarity into one ordered
//! list of track ids per listener.

pub mod centroid;
pub mod engine;
pub mod error;
pub mod genre;
pub mod similarity;
pub mod stores;

pub use engine::{Recommendation, Recommender};
pub use error::RecommendError;
pub use stores::{HistoryStore, TrackEmbedding, TrackStore, VectorStore};
