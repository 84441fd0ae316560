//! HTTP API handlers for moodify-ea

pub mod analyze;
pub mod health;

pub use analyze::{analyze, analyze_routes, recommend};
pub use health::health_routes;
