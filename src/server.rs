use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::history::PlayHistory;
use crate::recommend::{RecommendError, Recommender, TrackStore};
use crate::storage::{Track, TrackId};

pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub history: Arc<PlayHistory>,
    pub recommender: Recommender,
    /// Where to persist history after each recorded play. `None` keeps it in memory.
    pub history_path: Option<PathBuf>,
    /// Held across a history save so concurrent plays write one at a time
    history_save: Mutex<()>,
}

impl AppState {
    pub fn new(
        catalog: Arc<Catalog>,
        history: Arc<PlayHistory>,
        recommender: Recommender,
        history_path: Option<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            history,
            recommender,
            history_path,
            history_save: Mutex::new(()),
        }
    }

    /// Persist the in-memory history, off the async runtime.
    async fn save_history(&self) -> Result<()> {
        let Some(path) = self.history_path.clone() else {
            return Ok(());
        };
        let _guard = self.history_save.lock().await;
        let history = self.history.clone();
        tokio::task::spawn_blocking(move || history.save(&path))
            .await
            .context("History save task failed")?
    }
}

#[derive(Serialize, Debug)]
struct TrackSummary {
    id: TrackId,
    title: String,
    artist: String,
    genres: Vec<String>,
}

impl From<Track> for TrackSummary {
    fn from(t: Track) -> Self {
        Self {
            id: t.id,
            title: t.title,
            artist: t.artist,
            genres: t.genres,
        }
    }
}

#[derive(Serialize, Debug)]
struct RecommendationResponse {
    user_id: String,
    track_ids: Vec<TrackId>,
    tracks: Vec<TrackSummary>,
    fallback: bool,
}

#[derive(Serialize, Debug)]
struct SimilarTrack {
    #[serde(flatten)]
    track: TrackSummary,
    distance: f32,
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SimilarParams {
    limit: Option<usize>,
    genre: Option<String>,
}

pub fn make_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/users/{user_id}/recommendations",
            get(get_recommendations),
        )
        .route("/api/users/{user_id}/plays/{track_id}", post(record_play))
        .route("/api/tracks/top", get(get_top_tracks))
        .route("/api/tracks/{track_id}/similar", get(get_similar))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let app = make_app(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Recommendation API listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn store_failure(e: RecommendError) -> Response {
    error!("Recommendation store failure: {:#}", e);
    error_response(StatusCode::SERVICE_UNAVAILABLE, e)
}

/// Metadata for `ids`, in the same order. Ids the store does not know are dropped.
fn hydrate(store: &dyn TrackStore, ids: &[TrackId]) -> Result<Vec<Track>> {
    let mut by_id: HashMap<TrackId, Track> = store
        .tracks_by_ids(ids)?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    let recommendation = match state.recommender.recommend_or_fallback(&user_id) {
        Ok(r) => r,
        Err(e) => return store_failure(e),
    };

    let tracks = match hydrate(state.catalog.as_ref(), &recommendation.track_ids) {
        Ok(t) => t.into_iter().map(TrackSummary::from).collect(),
        Err(e) => return store_failure(e.into()),
    };

    Json(RecommendationResponse {
        user_id,
        track_ids: recommendation.track_ids,
        tracks,
        fallback: recommendation.fallback,
    })
    .into_response()
}

async fn get_top_tracks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or_else(|| state.recommender.settings().max_results());
    match state.recommender.global_top(limit) {
        Ok(tracks) => {
            Json(tracks.into_iter().map(TrackSummary::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => store_failure(e),
    }
}

async fn get_similar(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Response {
    if state.catalog.library.get(&track_id).is_none() {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown track {}", track_id));
    }
    let limit = params
        .limit
        .unwrap_or(state.recommender.settings().similar_limit);

    let scored = match state
        .recommender
        .similar_tracks(&track_id, params.genre.as_deref(), limit)
    {
        Ok(s) => s,
        Err(e) => return store_failure(e),
    };

    let ids: Vec<TrackId> = scored.iter().map(|s| s.id.clone()).collect();
    let tracks = match hydrate(state.catalog.as_ref(), &ids) {
        Ok(t) => t,
        Err(e) => return store_failure(e.into()),
    };
    let distances: HashMap<&str, f32> = scored
        .iter()
        .map(|s| (s.id.as_str(), s.distance))
        .collect();

    let enriched: Vec<SimilarTrack> = tracks
        .into_iter()
        .map(|t| {
            let distance = distances.get(t.id.as_str()).copied().unwrap_or(1.0);
            SimilarTrack {
                track: t.into(),
                distance,
            }
        })
        .collect();
    Json(enriched).into_response()
}

async fn record_play(
    State(state): State<Arc<AppState>>,
    Path((user_id, track_id)): Path<(String, String)>,
) -> Response {
    if state.catalog.library.get(&track_id).is_none() {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown track {}", track_id));
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    state.history.record_play(&user_id, &track_id, now);

    if let Err(e) = state.save_history().await {
        error!("Failed to persist play history: {:#}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
    }
    StatusCode::NO_CONTENT.into_response()
}
