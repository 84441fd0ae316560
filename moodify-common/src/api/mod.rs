//! API types shared between the Moodify services and their clients

pub mod types;

pub use types::{AnalysisResult, AnalyzeRequest, RecommendationResponse, TrackSummary};
