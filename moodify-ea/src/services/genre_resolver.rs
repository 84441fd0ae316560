//! Canonical emotion + era + language → display emotion and genre
//!
//! Genre precedence for an era:
//! 1. the era's entry for the requested language
//! 2. the era's `default` entry
//! 3. `pop`
//!
//! The `aesthetic` fallback emotion always maps to `lofi hip-hop`, whatever
//! the table says. Resolution never fails.

use moodify_common::emotion_table::DEFAULT_LANGUAGE_KEY;
use moodify_common::EmotionTable;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

use super::emotion_normalizer::FALLBACK_EMOTION;

/// Genre used when the table has nothing for the era
pub const FALLBACK_GENRE: &str = "pop";

/// Genre for the `aesthetic` fallback emotion
pub const AESTHETIC_GENRE: &str = "lofi hip-hop";

/// Temporal style bucket for genre selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Era {
    #[default]
    Today,
    Nineties,
    Mixed,
}

impl Era {
    /// Parse an era identifier; case-insensitive, unknown values become `Today`
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "today" => Era::Today,
            "90s" => Era::Nineties,
            "mixed" => Era::Mixed,
            _ => Era::Today,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Era::Today => "today",
            Era::Nineties => "90s",
            Era::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chooses which sub-emotion is shown
///
/// Production picks uniformly at random; tests plug in a fixed choice.
pub trait SubEmotionPicker: Send + Sync {
    /// Index into a non-empty list of `len` options
    fn pick_index(&self, len: usize) -> usize;
}

/// Uniform random choice
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl SubEmotionPicker for RandomPicker {
    fn pick_index(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}

/// Result of genre resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Sub-emotion shown to the user
    pub emotion: String,
    pub genre: String,
    /// Era actually used
    pub era: Era,
}

/// Resolves genres from the emotion table
#[derive(Clone)]
pub struct GenreResolver {
    table: Arc<EmotionTable>,
    picker: Arc<dyn SubEmotionPicker>,
}

impl GenreResolver {
    pub fn new(table: Arc<EmotionTable>, picker: Arc<dyn SubEmotionPicker>) -> Self {
        Self { table, picker }
    }

    /// Resolver with random sub-emotion selection
    pub fn with_random_picker(table: Arc<EmotionTable>) -> Self {
        Self::new(table, Arc::new(RandomPicker))
    }

    /// Resolve display emotion and genre for a canonical emotion
    pub fn resolve(&self, canonical: &str, era: &str, language: &str) -> Resolution {
        let era = Era::parse(era);
        let entry = self.table.get(canonical);

        let emotion = match entry {
            Some(entry) => {
                let options = entry.sub_emotions();
                // Guard against a picker that ignores the bound
                let index = self.picker.pick_index(options.len()).min(options.len() - 1);
                options[index].clone()
            }
            None => canonical.to_string(),
        };

        let genre = if canonical == FALLBACK_EMOTION {
            AESTHETIC_GENRE.to_string()
        } else {
            entry
                .and_then(|entry| entry.genres_for_era(era.as_str()))
                .and_then(|genres| {
                    genres
                        .get(language)
                        .or_else(|| genres.get(DEFAULT_LANGUAGE_KEY))
                })
                .cloned()
                .unwrap_or_else(|| FALLBACK_GENRE.to_string())
        };

        Resolution { emotion, genre, era }
    }
}
