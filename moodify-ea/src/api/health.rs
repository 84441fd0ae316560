//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("moodify-ea")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash captured at build time
    pub git_hash: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Canonical emotions in the loaded table
    pub emotions: usize,
    /// Classifier backend identifier
    pub classifier: String,
    /// Whether track search is configured
    pub track_search: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "moodify-ea".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        emotions: state.analyzer.emotion_table().len(),
        classifier: state.analyzer.classifier_backend().to_string(),
        track_search: state.track_finder.is_some(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
