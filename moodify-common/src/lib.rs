//! # Moodify Common Library
//!
//! Shared code for the Moodify services including:
//! - Error types
//! - Bootstrap configuration loading
//! - The emotion table (canonical emotions, sub-emotions, genre tables)
//! - API request/response types

pub mod api;
pub mod config;
pub mod emotion_table;
pub mod error;

pub use emotion_table::{EmotionEntry, EmotionTable};
pub use error::{Error, Result};
