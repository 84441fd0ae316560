//! moodify-ea library - Emotion Analysis microservice
//!
//! Face image in, mood music out: the facial analyzer's label is normalized to
//! a canonical emotion, then resolved to a genre for the requested era and
//! language. Optionally the genre is turned into playable tracks.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use moodify_common::config::ServerConfig;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::services::{MoodAnalyzer, TrackFinder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Analysis pipeline (emotion table, classifier, resolver)
    pub analyzer: Arc<MoodAnalyzer>,
    /// Track search; `None` when not configured
    pub track_finder: Option<Arc<TrackFinder>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(analyzer: MoodAnalyzer, track_finder: Option<TrackFinder>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            track_finder: track_finder.map(Arc::new),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router with default server settings
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, &ServerConfig::default())
}

/// Build application router
pub fn build_router_with(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(cors_layer(&server.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Permissive CORS unless origins are configured
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}
