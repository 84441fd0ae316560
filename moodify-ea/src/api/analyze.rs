//! Analysis endpoints
//!
//! - `POST /analyze`: emotion, genre, language and era for a face image
//! - `POST /api/analyze`: the same analysis plus matching tracks

use axum::{extract::State, routing::post, Json, Router};
use moodify_common::api::{AnalysisResult, AnalyzeRequest, RecommendationResponse};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisResult>> {
    let result = state.analyzer.handle(&request).await?;
    Ok(Json(result))
}

/// POST /api/analyze
///
/// 503 when track search is not configured, 404 (with the analysis) when no
/// query finds any track.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<RecommendationResponse>> {
    let finder = state
        .track_finder
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Track search is not configured".to_string()))?;

    let analysis = state.analyzer.handle(&request).await?;
    let tracks = finder.find(&analysis.genre, &analysis.language).await?;

    if tracks.is_empty() {
        return Err(ApiError::NoTracks(analysis));
    }

    Ok(Json(RecommendationResponse { analysis, tracks }))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/api/analyze", post(recommend))
}
