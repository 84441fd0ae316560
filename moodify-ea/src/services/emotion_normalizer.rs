//! Raw classifier label → canonical emotion key
//!
//! Matching is by substring, not equality: `"Very_Happy"` and `"happy_face"`
//! both resolve to a configured key `"happy"`. Keys are tried in the emotion
//! table's definition order and the first one contained in the label wins.

use moodify_common::EmotionTable;
use std::sync::Arc;

use super::emotion_classifier::ClassifierOutcome;

/// Canonical emotion used when classification fails or yields no label
pub const FALLBACK_EMOTION: &str = "aesthetic";

/// Canonical emotion used when a label matches no configured key
pub const DEFAULT_EMOTION: &str = "neutral";

/// Maps classifier outcomes onto the emotion table's keys
#[derive(Clone)]
pub struct EmotionNormalizer {
    table: Arc<EmotionTable>,
}

impl EmotionNormalizer {
    pub fn new(table: Arc<EmotionTable>) -> Self {
        Self { table }
    }

    /// Canonical key for a classifier outcome
    ///
    /// Failure or blank label → `aesthetic`; no substring match → `neutral`.
    pub fn normalize(&self, outcome: &ClassifierOutcome) -> String {
        match outcome {
            Ok(label) => self.normalize_label(label),
            Err(_) => FALLBACK_EMOTION.to_string(),
        }
    }

    /// Canonical key for a raw label
    pub fn normalize_label(&self, label: &str) -> String {
        if label.trim().is_empty() {
            return FALLBACK_EMOTION.to_string();
        }

        let label = label.to_lowercase();

        self.table
            .keys()
            .find(|key| label.contains(key))
            .unwrap_or(DEFAULT_EMOTION)
            .to_string()
    }
}
