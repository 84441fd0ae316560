//! Request and response bodies of the analysis endpoints

use serde::{Deserialize, Serialize};

/// Language used when the request names none
pub const DEFAULT_LANGUAGE: &str = "english";

/// Era used when the request names none or an unknown one
pub const DEFAULT_ERA: &str = "today";

/// POST /analyze and /api/analyze body
///
/// `imageData` is a base64 image, optionally prefixed `data:image/...;base64,`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "imageData", default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
}

impl AnalyzeRequest {
    /// Requested language, lower-cased, `english` by default
    pub fn language(&self) -> String {
        self.language
            .as_deref()
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_lowercase()
    }

    /// Requested era, lower-cased, `today` by default (not yet validated)
    pub fn era(&self) -> String {
        self.era.as_deref().unwrap_or(DEFAULT_ERA).to_lowercase()
    }
}

/// Outcome of one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Canonical emotion actually matched
    pub base_emotion: String,
    /// Sub-emotion shown to the user
    pub emotion: String,
    pub genre: String,
    pub language: String,
    /// Validated era
    pub era: String,
}

/// One playable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub name: String,
    pub artist: String,
    pub url: String,
    pub image: String,
    /// Preview clip; often unavailable
    pub preview: Option<String>,
}

/// POST /api/analyze response: the analysis plus tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub tracks: Vec<TrackSummary>,
}
