//! Image payload decoding
//!
//! Browser clients send the picture as a data URL
//! (`data:image/jpeg;base64,/9j/4AAQ...`); other clients may send the bare
//! base64 payload. Both decode to raw image bytes here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Image decoding errors
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    /// Nothing left after stripping the data URL prefix
    #[error("Image payload is empty")]
    Empty,

    /// Data URL without the `,` separating header and payload
    #[error("Malformed data URL")]
    MalformedDataUrl,

    /// Payload is not valid base64
    #[error("Invalid base64 image payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Decoded image bytes
#[derive(Debug, Clone)]
pub struct DecodedImage {
    bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File extension matching the sniffed image type (`jpg` when unknown)
    pub fn extension(&self) -> &'static str {
        extension_for(&self.bytes)
    }
}

/// File extension for raw image bytes, `jpg` when the type is not recognized
pub fn extension_for(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.extension())
        .unwrap_or("jpg")
}

/// Decode a data URL or bare base64 string into image bytes
pub fn decode_image_data(data: &str) -> Result<DecodedImage, ImageDecodeError> {
    let data = data.trim();

    let payload = if data.starts_with("data:") {
        data.split_once(',')
            .map(|(_, payload)| payload)
            .ok_or(ImageDecodeError::MalformedDataUrl)?
    } else {
        data
    };

    // Line-wrapped base64 is common in pasted payloads
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(ImageDecodeError::Empty);
    }

    let bytes = STANDARD.decode(payload.as_bytes())?;
    if bytes.is_empty() {
        return Err(ImageDecodeError::Empty);
    }

    Ok(DecodedImage::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_bare_base64() {
        let image = decode_image_data(PNG_BASE64).unwrap();
        assert_eq!(&image.bytes()[1..4], b"PNG");
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_decode_strips_data_url_prefix() {
        let data_url = format!("data:image/png;base64,{}", PNG_BASE64);
        let image = decode_image_data(&data_url).unwrap();
        assert_eq!(&image.bytes()[1..4], b"PNG");
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let (head, tail) = PNG_BASE64.split_at(20);
        let wrapped = format!("{}\n{}", head, tail);
        assert!(decode_image_data(&wrapped).is_ok());
    }

    #[test]
    fn test_data_url_without_separator() {
        assert!(matches!(
            decode_image_data("data:image/png;base64"),
            Err(ImageDecodeError::MalformedDataUrl)
        ));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(
            decode_image_data("data:image/png;base64,"),
            Err(ImageDecodeError::Empty)
        ));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            decode_image_data("not*base64!"),
            Err(ImageDecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_unknown_bytes_fall_back_to_jpg() {
        assert_eq!(extension_for(b"plain text"), "jpg");
    }
}
