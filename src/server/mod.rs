use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::config::Config;
use crate::error::Result;
use crate::output::{mime_for, EpisodeMetadata};
use crate::publish::EpisodeHistory;

const ALLOWED_AUDIO: [&str; 4] = ["mp3", "wav", "m4a", "ogg"];

pub struct ServerState {
    output_dir: PathBuf,
    feed_path: PathBuf,
    metadata_path: PathBuf,
    history_path: PathBuf,
    max_episodes: usize,
}

impl ServerState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output.directory.clone(),
            feed_path: config.feed_path(),
            metadata_path: config.metadata_path(),
            history_path: config.history_path(),
            max_episodes: config.output.max_episodes,
        }
    }
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// `GET` routes also answer `HEAD` with headers only.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/feed.xml", get(feed))
        .route("/episode.json", get(episode_metadata))
        .route("/episode/:filename", get(episode_file))
        .route("/stats", get(stats))
        .with_state(state)
}

pub async fn serve(state: ServerState, host: &str, port: u16) -> Result<()> {
    let state = Arc::new(state);
    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("Serving {} on http://{}", state.output_dir.display(), address);
    println!("Serving podcast feed at http://{}/feed.xml", address);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "InboxCast RSS Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "rss_feed": "/feed.xml",
            "episode_metadata": "/episode.json",
            "episode_audio": "/episode/{filename}",
            "stats": "/stats",
            "health": "/health"
        }
    }))
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "output_dir": state.output_dir.display().to_string(),
        "files": {
            "feed.xml": state.feed_path.exists(),
            "episode.json": state.metadata_path.exists()
        }
    }))
}

async fn feed(State(state): State<Arc<ServerState>>) -> Response {
    match tokio::fs::read(&state.feed_path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
                (header::CACHE_CONTROL, "public, max-age=300"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => error(
            StatusCode::NOT_FOUND,
            "RSS feed not found. Run 'inboxcast run' or 'inboxcast publish' first.",
        ),
    }
}

fn load_metadata(path: &FsPath) -> std::result::Result<EpisodeMetadata, Response> {
    if !path.exists() {
        return Err(error(
            StatusCode::NOT_FOUND,
            "Episode metadata not found. Run 'inboxcast run' or 'inboxcast publish' first.",
        ));
    }
    EpisodeMetadata::read(path).map_err(|e| {
        tracing::warn!("Invalid episode metadata {}: {}", path.display(), e);
        error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid episode metadata file")
    })
}

async fn episode_metadata(State(state): State<Arc<ServerState>>) -> Response {
    match load_metadata(&state.metadata_path) {
        Ok(metadata) => Json(metadata).into_response(),
        Err(response) => response,
    }
}

/// Plain file names with an audio extension only.
pub fn is_servable(filename: &str) -> bool {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return false;
    }
    FsPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_AUDIO.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn episode_file(
    State(state): State<Arc<ServerState>>,
    Path(filename): Path<String>,
) -> Response {
    if !is_servable(&filename) {
        return error(StatusCode::BAD_REQUEST, "Invalid file type");
    }

    let path = state.output_dir.join(&filename);
    if !path.is_file() {
        return error(StatusCode::NOT_FOUND, "Episode file not found");
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, mime_for(&filename)),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            error(StatusCode::INTERNAL_SERVER_ERROR, "Could not read episode file")
        }
    }
}

async fn stats(State(state): State<Arc<ServerState>>) -> Response {
    let metadata = match load_metadata(&state.metadata_path) {
        Ok(metadata) => metadata,
        Err(response) => return response,
    };
    let history = EpisodeHistory::load(&state.history_path, state.max_episodes);
    Json(json!({
        "episode_date": metadata.episode_date,
        "total_items": metadata.total_items,
        "estimated_duration_ms": metadata.estimated_duration_ms,
        "sources": metadata.sources,
        "chapters": metadata.chapters.len(),
        "history": history.stats()
    }))
    .into_response()
}
