//! Facial emotion classifier adapters
//!
//! The facial analysis model lives outside this service. Two backends reach it:
//!
//! - [`CommandClassifier`] runs a local analyzer program with the image written
//!   to a temporary file, and reads JSON from its stdout.
//! - [`HttpClassifier`] posts the image to a remote analyzer service.
//!
//! Analyzers run with face-detection enforcement disabled, so any picture
//! yields a best-effort label. Whatever goes wrong (no face, bad image,
//! backend crash, timeout) comes back as a [`ClassificationFailure`]; the
//! caller never sees a foreign error type.
//!
//! Analyzer output comes in several shapes (a single object or a list of
//! per-face objects, `dominant_emotion` or `emotion`, a label or a score map).
//! All of that is handled by [`parse_analyzer_output`] and stays in this module.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use moodify_common::config::{ClassifierBackend, ClassifierConfig};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::image_decoder::extension_for;

/// Why no label could be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationFailure {
    /// Analyzer found no face in the picture
    #[error("No face detected")]
    NoFace,

    /// Analyzer could not read the image
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Classification took longer than the configured limit
    #[error("Classification timed out after {0:?}")]
    Timeout(Duration),

    /// Analyzer failed or could not be reached
    #[error("Analyzer backend error: {0}")]
    Backend(String),

    /// Analyzer answered with something that holds no emotion label
    #[error("Unrecognized analyzer output: {0}")]
    UnrecognizedOutput(String),

    /// Temporary image file could not be written
    #[error("I/O error: {0}")]
    Io(String),
}

/// Raw label on success, failure otherwise
pub type ClassifierOutcome = Result<String, ClassificationFailure>;

/// Facial emotion classifier
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Backend identifier for logs and health output
    fn backend_id(&self) -> &'static str;

    /// Classify raw image bytes into the most likely emotion label
    async fn classify(&self, image: &[u8]) -> ClassifierOutcome;
}

/// Build the configured classifier, wrapped with the configured timeout
pub fn classifier_from_config(
    config: &ClassifierConfig,
) -> moodify_common::Result<Arc<dyn EmotionClassifier>> {
    let inner: Arc<dyn EmotionClassifier> = match config.backend {
        ClassifierBackend::Command => Arc::new(CommandClassifier::new(
            config.program.clone(),
            config.args.clone(),
        )),
        ClassifierBackend::Http => {
            let url = config.url.clone().ok_or_else(|| {
                moodify_common::Error::Config(
                    "classifier.url is required for the http backend".to_string(),
                )
            })?;
            Arc::new(HttpClassifier::new(url)?)
        }
    };

    Ok(Arc::new(TimeoutClassifier::new(
        inner,
        Duration::from_secs(config.timeout_secs),
    )))
}

/// Extract the dominant emotion label from analyzer JSON
pub fn parse_analyzer_output(value: &Value) -> ClassifierOutcome {
    match value {
        // One entry per detected face; the first is the most prominent
        Value::Array(faces) => match faces.first() {
            Some(first) => parse_analyzer_output(first),
            None => Err(ClassificationFailure::NoFace),
        },
        Value::Object(map) => {
            if let Some(error) = map.get("error") {
                let message = error
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(failure_from_message(&message));
            }

            if let Some(label) = map.get("dominant_emotion").and_then(Value::as_str) {
                return Ok(label.to_string());
            }

            match map.get("emotion") {
                Some(Value::String(label)) => Ok(label.clone()),
                // Score map: {"happy": 91.2, "sad": 3.1, ...}
                Some(Value::Object(scores)) => scores
                    .iter()
                    .filter_map(|(label, score)| score.as_f64().map(|s| (label, s)))
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(label, _)| label.clone())
                    .ok_or_else(|| ClassificationFailure::UnrecognizedOutput(value.to_string())),
                _ => Err(ClassificationFailure::UnrecognizedOutput(value.to_string())),
            }
        }
        Value::String(label) => Ok(label.clone()),
        other => Err(ClassificationFailure::UnrecognizedOutput(other.to_string())),
    }
}

fn failure_from_message(message: &str) -> ClassificationFailure {
    let lower = message.to_lowercase();
    if lower.contains("face could not be detected") || lower.contains("no face") {
        ClassificationFailure::NoFace
    } else if lower.contains("image") && (lower.contains("invalid") || lower.contains("cannot")) {
        ClassificationFailure::InvalidImage(message.to_string())
    } else {
        ClassificationFailure::Backend(message.to_string())
    }
}

/// Local analyzer program
///
/// Invoked as `<program> <args...> <image path>`; must print analyzer JSON on
/// stdout. The image lives in a temporary file owned by the classify future:
/// it is removed when the program exits, and when the future is dropped
/// (timeout) the program is killed and the file removed as well.
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn write_image(image: &[u8]) -> Result<tempfile::NamedTempFile, ClassificationFailure> {
        let suffix = format!(".{}", extension_for(image));
        let mut temp_file = tempfile::Builder::new()
            .prefix("moodify-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| ClassificationFailure::Io(e.to_string()))?;
        temp_file
            .write_all(image)
            .and_then(|_| temp_file.flush())
            .map_err(|e| ClassificationFailure::Io(e.to_string()))?;
        Ok(temp_file)
    }
}

#[async_trait]
impl EmotionClassifier for CommandClassifier {
    fn backend_id(&self) -> &'static str {
        "command"
    }

    async fn classify(&self, image: &[u8]) -> ClassifierOutcome {
        let temp_file = Self::write_image(image)?;

        debug!(
            program = %self.program,
            image_file = %temp_file.path().display(),
            "Running analyzer program"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(temp_file.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ClassificationFailure::Backend(format!(
                    "Analyzer program not found: {}",
                    self.program
                )),
                _ => ClassificationFailure::Backend(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(match serde_json::from_slice::<Value>(&output.stdout) {
                // Analyzers report structured errors on stdout when they can
                Ok(value) if value.get("error").is_some() => match parse_analyzer_output(&value) {
                    Err(failure) => failure,
                    Ok(_) => ClassificationFailure::Backend(stderr.trim().to_string()),
                },
                _ => failure_from_message(&format!(
                    "exit code {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                )),
            });
        }

        let value: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            ClassificationFailure::UnrecognizedOutput(format!("invalid JSON on stdout: {}", e))
        })?;

        parse_analyzer_output(&value)
    }
}

/// Remote analyzer service
///
/// Receives `{"imageData": "data:<mime>;base64,..."}` and answers with
/// analyzer JSON.
pub struct HttpClassifier {
    http_client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> moodify_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("moodify-ea/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| moodify_common::Error::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EmotionClassifier for HttpClassifier {
    fn backend_id(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, image: &[u8]) -> ClassifierOutcome {
        let mime = infer::get(image)
            .map(|kind| kind.mime_type())
            .unwrap_or("image/jpeg");
        let body = json!({
            "imageData": format!("data:{};base64,{}", mime, STANDARD.encode(image)),
        });

        debug!(url = %self.url, bytes = image.len(), "Posting image to analyzer service");

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassificationFailure::Backend(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClassificationFailure::Backend(e.to_string()))?;

        let value: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(match value {
                Some(value) if value.get("error").is_some() => parse_analyzer_output(&value)
                    .err()
                    .unwrap_or_else(|| ClassificationFailure::Backend(format!("HTTP {}", status))),
                _ => ClassificationFailure::Backend(format!("HTTP {}: {}", status, text)),
            });
        }

        match value {
            Some(value) => parse_analyzer_output(&value),
            None => Err(ClassificationFailure::UnrecognizedOutput(text)),
        }
    }
}

/// Bounds another classifier's run time; an elapsed limit is a failure
pub struct TimeoutClassifier {
    inner: Arc<dyn EmotionClassifier>,
    timeout: Duration,
}

impl TimeoutClassifier {
    pub fn new(inner: Arc<dyn EmotionClassifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl EmotionClassifier for TimeoutClassifier {
    fn backend_id(&self) -> &'static str {
        self.inner.backend_id()
    }

    async fn classify(&self, image: &[u8]) -> ClassifierOutcome {
        match tokio::time::timeout(self.timeout, self.inner.classify(image)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClassificationFailure::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_object() {
        let value = json!({"dominant_emotion": "Happy"});
        assert_eq!(parse_analyzer_output(&value), Ok("Happy".to_string()));
    }

    #[test]
    fn test_parse_list_takes_first_face() {
        let value = json!([
            {"dominant_emotion": "sad", "emotion": {"sad": 80.0}},
            {"dominant_emotion": "happy"}
        ]);
        assert_eq!(parse_analyzer_output(&value), Ok("sad".to_string()));
    }

    #[test]
    fn test_parse_empty_list_is_no_face() {
        assert_eq!(
            parse_analyzer_output(&json!([])),
            Err(ClassificationFailure::NoFace)
        );
    }

    #[test]
    fn test_parse_emotion_label_key() {
        let value = json!({"emotion": "surprise"});
        assert_eq!(parse_analyzer_output(&value), Ok("surprise".to_string()));
    }

    #[test]
    fn test_parse_score_map_picks_highest() {
        let value = json!({"emotion": {"angry": 2.5, "neutral": 61.0, "happy": 36.5}});
        assert_eq!(parse_analyzer_output(&value), Ok("neutral".to_string()));
    }

    #[test]
    fn test_parse_error_no_face() {
        let value = json!({"error": "Face could not be detected in numpy array."});
        assert_eq!(
            parse_analyzer_output(&value),
            Err(ClassificationFailure::NoFace)
        );
    }

    #[test]
    fn test_parse_error_backend() {
        let value = json!({"error": "model weights missing"});
        assert!(matches!(
            parse_analyzer_output(&value),
            Err(ClassificationFailure::Backend(_))
        ));
    }

    #[test]
    fn test_parse_unrecognized() {
        assert!(matches!(
            parse_analyzer_output(&json!({"age": 31})),
            Err(ClassificationFailure::UnrecognizedOutput(_))
        ));
        assert!(matches!(
            parse_analyzer_output(&json!(42)),
            Err(ClassificationFailure::UnrecognizedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_backend_failure() {
        let classifier = CommandClassifier::new("moodify-analyzer-that-does-not-exist", vec![]);
        assert!(matches!(
            classifier.classify(b"bytes").await,
            Err(ClassificationFailure::Backend(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_is_parsed() {
        // sh -c '<script>' <arg0> <image path>
        let classifier = CommandClassifier::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"test -f "$1" && echo '[{"dominant_emotion": "fear"}]'"#.to_string(),
                "analyzer".to_string(),
            ],
        );
        assert_eq!(classifier.classify(b"bytes").await, Ok("fear".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_structured_error_on_failure() {
        let classifier = CommandClassifier::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"echo '{"error": "Face could not be detected"}'; exit 1"#.to_string(),
                "analyzer".to_string(),
            ],
        );
        assert_eq!(
            classifier.classify(b"bytes").await,
            Err(ClassificationFailure::NoFace)
        );
    }

    /// Analyzer script that records the image path it was given in `$1`
    #[cfg(unix)]
    fn recording_classifier(marker: &std::path::Path, script: &str) -> CommandClassifier {
        // sh -c '<script>' <arg0> <marker> <image path>
        CommandClassifier::new(
            "sh",
            vec![
                "-c".to_string(),
                format!(r#"printf %s "$2" > "$1"; {}"#, script),
                "analyzer".to_string(),
                marker.display().to_string(),
            ],
        )
    }

    #[cfg(unix)]
    fn recorded_image_path(marker: &std::path::Path) -> std::path::PathBuf {
            let recorded = std::fs::read_to_string(marker).expect("Analyzer should record image path");
        std::path::PathBuf::from(recorded)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_image_file_removed_after_success() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("image-path");
        let classifier = recording_classifier(&marker, r#"echo '{"dominant_emotion": "sad"}'"#);

        assert_eq!(classifier.classify(b"bytes").await, Ok("sad".to_string()));

        let image_path = recorded_image_path(&marker);
        let file_name = image_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("moodify-"), "unexpected {}", file_name);
        assert!(!image_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_image_file_removed_after_failed_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("image-path");
        let classifier = recording_classifier(&marker, "exit 3");

        assert!(matches!(
            classifier.classify(b"bytes").await,
            Err(ClassificationFailure::Backend(_))
        ));
        assert!(!recorded_image_path(&marker).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_analyzer_is_killed() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("image-path");
        let finished = dir.path().join("finished");
        let script = format!(
            r#"sleep 2; touch "{}"; echo '{{"dominant_emotion": "happy"}}'"#,
            finished.display()
        );
        let classifier = TimeoutClassifier::new(
            Arc::new(recording_classifier(&marker, &script)),
            Duration::from_millis(500),
        );

        assert_eq!(
            classifier.classify(b"bytes").await,
            Err(ClassificationFailure::Timeout(Duration::from_millis(500)))
        );
        assert!(!recorded_image_path(&marker).exists());

        // A surviving analyzer would have finished by now
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!finished.exists());
    }

    struct SlowClassifier;

    #[async_trait]
    impl EmotionClassifier for SlowClassifier {
        fn backend_id(&self) -> &'static str {
            "slow"
        }

        async fn classify(&self, _image: &[u8]) -> ClassifierOutcome {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("happy".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_failure() {
        let classifier = TimeoutClassifier::new(Arc::new(SlowClassifier), Duration::from_millis(20));
        assert_eq!(
            classifier.classify(b"bytes").await,
            Err(ClassificationFailure::Timeout(Duration::from_millis(20)))
        );
        assert_eq!(classifier.backend_id(), "slow");
    }

    #[test]
    fn test_http_backend_from_config() {
        let config = ClassifierConfig {
            backend: ClassifierBackend::Http,
            url: Some("http://127.0.0.1:5002/analyze".to_string()),
            ..ClassifierConfig::default()
        };
        let classifier = classifier_from_config(&config).unwrap();
        assert_eq!(classifier.backend_id(), "http");
    }
}
