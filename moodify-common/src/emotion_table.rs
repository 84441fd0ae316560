//! Emotion table: canonical emotions, their sub-emotions and genre tables
//!
//! Loaded once at startup from a JSON document of the form:
//!
//! ```json
//! {
//!   "happy": {
//!     "sub_emotions": ["joyful", "excited"],
//!     "genres": {
//!       "today": { "english": "dance pop", "default": "pop" },
//!       "90s":   { "spanish": "salsa" }
//!     }
//!   }
//! }
//! ```
//!
//! Key order of the document is kept: the normalizer scans keys in that
//! order and the first substring match wins.
//!
//! Keys (emotion, era and language) are trimmed and lower-cased on load,
//! since every lookup is made with lower-cased identifiers.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Language key used as the per-era fallback genre
pub const DEFAULT_LANGUAGE_KEY: &str = "default";

/// Genre table of one era: language identifier → genre
pub type LanguageGenres = HashMap<String, String>;

/// Entry as it appears in the JSON document
#[derive(Debug, Deserialize)]
struct RawEmotionEntry {
    #[serde(default)]
    sub_emotions: Vec<String>,
    #[serde(default)]
    genres: HashMap<String, LanguageGenres>,
}

/// One canonical emotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionEntry {
    key: String,
    sub_emotions: Vec<String>,
    genres: HashMap<String, LanguageGenres>,
}

impl EmotionEntry {
    /// Create an entry. An empty sub-emotion list becomes `[key]`.
    pub fn new(
        key: impl Into<String>,
        sub_emotions: Vec<String>,
        genres: HashMap<String, LanguageGenres>,
    ) -> Self {
        let key = fold_key(&key.into());

        let mut sub_emotions: Vec<String> = sub_emotions
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if sub_emotions.is_empty() {
            sub_emotions.push(key.clone());
        }

        let genres = genres
            .into_iter()
            .map(|(era, languages)| {
                let languages = languages
                    .into_iter()
                    .map(|(language, genre)| (fold_key(&language), genre))
                    .collect();
                (fold_key(&era), languages)
            })
            .collect();

        Self {
            key,
            sub_emotions,
            genres,
        }
    }

    /// Canonical emotion key (lower case)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display variants; never empty
    pub fn sub_emotions(&self) -> &[String] {
        &self.sub_emotions
    }

    /// Genre table for an era, if configured
    pub fn genres_for_era(&self, era: &str) -> Option<&LanguageGenres> {
        self.genres.get(era)
    }
}

/// Read-only emotion table, shared across requests
#[derive(Debug, Clone, Default)]
pub struct EmotionTable {
    entries: IndexMap<String, EmotionEntry>,
}

impl EmotionTable {
    /// Load the table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read emotion table {}: {}",
                path.display(),
                e
            ))
        })?;

        let table = Self::from_json_str(&content)?;

        info!(
            path = %path.display(),
            emotions = table.len(),
            "Loaded emotion table"
        );

        Ok(table)
    }

    /// Parse the table from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: IndexMap<String, RawEmotionEntry> = serde_json::from_str(json)?;

        Self::from_entries(
            raw.into_iter()
                .map(|(key, entry)| EmotionEntry::new(key, entry.sub_emotions, entry.genres)),
        )
    }

    /// Build a table from entries, keeping their order
    ///
    /// Fails when two entries share a key (after case folding) or a key is blank.
    pub fn from_entries(entries: impl IntoIterator<Item = EmotionEntry>) -> Result<Self> {
        let mut map = IndexMap::new();

        for entry in entries {
            if entry.key.is_empty() {
                return Err(Error::Config("Emotion key must not be blank".to_string()));
            }
            if map.contains_key(&entry.key) {
                return Err(Error::Config(format!(
                    "Duplicate emotion key '{}'",
                    entry.key
                )));
            }
            debug!(
                key = %entry.key,
                sub_emotions = entry.sub_emotions.len(),
                eras = entry.genres.len(),
                "Emotion entry"
            );
            map.insert(entry.key.clone(), entry);
        }

        Ok(Self { entries: map })
    }

    /// Look up an entry; unknown keys are `None`
    pub fn get(&self, key: &str) -> Option<&EmotionEntry> {
        self.entries.get(key)
    }

    /// Canonical keys in definition order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "sad": { "sub_emotions": ["melancholic"] },
        "happy": {
            "sub_emotions": ["joyful", "excited"],
            "genres": {
                "90s": { "Spanish": "salsa", "default": "pop" }
            }
        },
        "neutral": {}
    }"#;

    #[test]
    fn test_keys_keep_document_order() {
        let table = EmotionTable::from_json_str(SAMPLE).unwrap();
        let keys: Vec<&str> = table.keys().collect();
        assert_eq!(keys, vec!["sad", "happy", "neutral"]);
    }

    #[test]
    fn test_missing_sub_emotions_default_to_key() {
        let table = EmotionTable::from_json_str(SAMPLE).unwrap();
        assert_eq!(table.get("neutral").unwrap().sub_emotions(), ["neutral"]);
    }

    #[test]
    fn test_language_keys_are_folded() {
        let table = EmotionTable::from_json_str(SAMPLE).unwrap();
        let nineties = table.get("happy").unwrap().genres_for_era("90s").unwrap();
        assert_eq!(nineties.get("spanish").map(String::as_str), Some("salsa"));
        assert_eq!(nineties.get(DEFAULT_LANGUAGE_KEY).map(String::as_str), Some("pop"));
    }

    #[test]
    fn test_unknown_key_is_absent() {
        let table = EmotionTable::from_json_str(SAMPLE).unwrap();
        assert!(table.get("angry").is_none());
    }

    #[test]
    fn test_duplicate_keys_after_folding_rejected() {
        let entries = vec![
            EmotionEntry::new("Happy", vec![], HashMap::new()),
            EmotionEntry::new("happy ", vec![], HashMap::new()),
        ];
        assert!(matches!(
            EmotionTable::from_entries(entries),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            EmotionTable::from_json_str("{ not json"),
            Err(Error::Json(_))
        ));
    }
}
