//! Services for emotion analysis and music recommendation

pub mod emotion_classifier;
pub mod emotion_normalizer;
pub mod genre_resolver;
pub mod image_decoder;
pub mod mood_analyzer;
pub mod track_search;

pub use emotion_classifier::{
    classifier_from_config, ClassificationFailure, ClassifierOutcome, CommandClassifier,
    EmotionClassifier, HttpClassifier, TimeoutClassifier,
};
pub use emotion_normalizer::{EmotionNormalizer, DEFAULT_EMOTION, FALLBACK_EMOTION};
pub use genre_resolver::{
    Era, GenreResolver, RandomPicker, Resolution, SubEmotionPicker, AESTHETIC_GENRE,
    FALLBACK_GENRE,
};
pub use image_decoder::{decode_image_data, DecodedImage, ImageDecodeError};
pub use mood_analyzer::{AnalyzeError, MoodAnalyzer};
pub use track_search::{
    CatalogTrack, SpotifyClient, TrackCatalog, TrackFinder, TrackSearchError,
};
