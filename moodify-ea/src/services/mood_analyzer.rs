//! Analysis pipeline: image → classifier → normalizer → genre resolver
//!
//! Classification failure is an expected outcome, not an error: it is logged
//! and resolved through the `aesthetic` fallback emotion. Only a missing image
//! or an undecodable payload make [`MoodAnalyzer::handle`] return an error.
//! The classifier is called at most once per request.

use moodify_common::api::{AnalysisResult, AnalyzeRequest};
use moodify_common::EmotionTable;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::emotion_classifier::EmotionClassifier;
use super::emotion_normalizer::EmotionNormalizer;
use super::genre_resolver::{GenreResolver, RandomPicker, SubEmotionPicker};
use super::image_decoder::{decode_image_data, ImageDecodeError};

/// Errors reported to the caller
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Request carries no image
    #[error("Image data is required")]
    MissingImage,

    /// Image payload could not be decoded
    #[error("Invalid image payload: {0}")]
    Payload(#[from] ImageDecodeError),
}

/// Request orchestrator
#[derive(Clone)]
pub struct MoodAnalyzer {
    classifier: Arc<dyn EmotionClassifier>,
    normalizer: EmotionNormalizer,
    resolver: GenreResolver,
    table: Arc<EmotionTable>,
}

impl MoodAnalyzer {
    pub fn new(
        table: Arc<EmotionTable>,
        classifier: Arc<dyn EmotionClassifier>,
        picker: Arc<dyn SubEmotionPicker>,
    ) -> Self {
        Self {
            classifier,
            normalizer: EmotionNormalizer::new(table.clone()),
            resolver: GenreResolver::new(table.clone(), picker),
            table,
        }
    }

    /// Analyzer with random sub-emotion selection
    pub fn with_random_picker(
        table: Arc<EmotionTable>,
        classifier: Arc<dyn EmotionClassifier>,
    ) -> Self {
        Self::new(table, classifier, Arc::new(RandomPicker))
    }

    pub fn emotion_table(&self) -> &EmotionTable {
        &self.table
    }

    pub fn classifier_backend(&self) -> &'static str {
        self.classifier.backend_id()
    }

    /// Run one analysis request
    pub async fn handle(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeError> {
        let image_data = request
            .image_data
            .as_deref()
            .filter(|data| !data.trim().is_empty())
            .ok_or(AnalyzeError::MissingImage)?;

        let image = decode_image_data(image_data)?;
        let language = request.language();
        let era = request.era();

        let outcome = self.classifier.classify(image.bytes()).await;
        if let Err(failure) = &outcome {
            warn!(
                backend = self.classifier.backend_id(),
                error = %failure,
                "Emotion classification failed, using fallback emotion"
            );
        }

        let base_emotion = self.normalizer.normalize(&outcome);
        let resolution = self.resolver.resolve(&base_emotion, &era, &language);

        info!(
            raw_label = outcome.as_deref().unwrap_or("<failed>"),
            base_emotion = %base_emotion,
            emotion = %resolution.emotion,
            genre = %resolution.genre,
            language = %language,
            era = %resolution.era,
            "Analysis complete"
        );

        Ok(AnalysisResult {
            base_emotion,
            emotion: resolution.emotion,
            genre: resolution.genre,
            language,
            era: resolution.era.as_str().to_string(),
        })
    }
}
