//! Error types for moodify-ea
//!
//! Classification failures never show up here: they resolve to the
//! `aesthetic` fallback emotion. Callers only see a missing image (400) or an
//! unexpected failure (500, with details).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use moodify_common::api::AnalysisResult;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::services::{AnalyzeError, TrackSearchError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No track found for the analysis (404); the analysis is still returned
    #[error("No suitable tracks found")]
    NoTracks(AnalysisResult),

    /// Feature not configured (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream API answered with an error status
    #[error("Upstream error {status}: {details}")]
    Upstream { status: u16, details: String },

    /// Internal server error (500)
    #[error("{message}: {details}")]
    Internal { message: String, details: String },
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::MissingImage => ApiError::BadRequest(err.to_string()),
            AnalyzeError::Payload(_) => ApiError::Internal {
                message: "Emotion analysis failed".to_string(),
                details: err.to_string(),
            },
        }
    }
}

impl From<TrackSearchError> for ApiError {
    fn from(err: TrackSearchError) -> Self {
        match err.upstream_status() {
            Some(status) => ApiError::Upstream {
                status,
                details: err.to_string(),
            },
            None => ApiError::Internal {
                message: "Music recommendation failed".to_string(),
                details: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "code": "BAD_REQUEST" }),
            ),
            ApiError::NoTracks(analysis) => {
                let mut body = serde_json::to_value(&analysis).unwrap_or_else(|_| json!({}));
                if let Value::Object(map) = &mut body {
                    map.insert(
                        "error".to_string(),
                        json!("No suitable tracks found. Try a broader language or image."),
                    );
                    map.insert("code".to_string(), json!("NOT_FOUND"));
                }
                (StatusCode::NOT_FOUND, body)
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": msg, "code": "SERVICE_UNAVAILABLE" }),
            ),
            ApiError::Upstream { status, details } => {
                error!(status, details = %details, "Upstream request failed");
                let status = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    json!({
                        "error": "Music recommendation failed",
                        "code": "UPSTREAM_ERROR",
                        "details": details,
                    }),
                )
            }
            ApiError::Internal { message, details } => {
                error!(details = %details, "{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": message,
                        "code": "INTERNAL_ERROR",
                        "details": details,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
