use serde::{Deserialize, Serialize};
use tracing::debug;

use super::format::MediaType;
use crate::pipeline::imaging::ImagingError;

/// A document photo as handed over by the file picker.
///
/// The declared type is whatever the client reported; it is NOT checked
/// against the content here.
#[derive(Debug, Clone)]
pub struct RawImageInput {
    bytes: Vec<u8>,
    declared_type: String,
}

impl RawImageInput {
    pub fn new(bytes: Vec<u8>, declared_type: impl Into<String>) -> Self {
        Self {
            bytes,
            declared_type: declared_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why an input was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnsupportedFormat,
    FileTooLarge,
}

/// Verdict of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Accepted { media_type: MediaType },
    Rejected { reason: RejectReason, message: String },
}

impl ValidationResult {
    fn rejected(reason: RejectReason, max_bytes: u64) -> Self {
        let message = match reason {
            RejectReason::UnsupportedFormat => {
                "Format non supporté. Utilisez JPG, PNG ou WEBP.".to_string()
            }
            RejectReason::FileTooLarge => format!(
                "Image trop volumineuse. Maximum {} MB.",
                megabytes_label(max_bytes)
            ),
        };
        Self::Rejected { reason, message }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { reason, .. } => Some(*reason),
        }
    }

    /// User-facing explanation for a rejection.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { message, .. } => Some(message),
        }
    }
}

/// Size in MiB for the rejection message: up to two decimals, French
/// decimal comma, no trailing zeros (`10`, `1,5`, `0,25`).
fn megabytes_label(bytes: u64) -> String {
    let formatted = format!("{:.2}", bytes as f64 / (1024.0 * 1024.0));
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .replace('.', ",")
}

/// Gate an input on its declared type and byte size. Pixel data is never
/// decoded; the format check runs before the size check.
pub fn validate(input: &RawImageInput, max_input_bytes: u64) -> ValidationResult {
    let Some(media_type) = MediaType::from_mime(input.declared_type()) else {
        debug!(declared = input.declared_type(), "Rejected image: unsupported format");
        return ValidationResult::rejected(RejectReason::UnsupportedFormat, max_input_bytes);
    };

    if input.size_bytes() > max_input_bytes {
        debug!(
            size = input.size_bytes(),
            max = max_input_bytes,
            "Rejected image: file too large"
        );
        return ValidationResult::rejected(RejectReason::FileTooLarge, max_input_bytes);
    }

    ValidationResult::Accepted { media_type }
}

/// [`validate`] as a `Result`, for callers that abort on rejection.
pub fn require_valid(input: &RawImageInput, max_input_bytes: u64) -> Result<MediaType, ImagingError> {
    match validate(input, max_input_bytes) {
        ValidationResult::Accepted { media_type } => Ok(media_type),
        ValidationResult::Rejected {
            reason: RejectReason::UnsupportedFormat,
            ..
        } => Err(ImagingError::UnsupportedFormat(input.declared_type().to_string())),
        ValidationResult::Rejected {
            reason: RejectReason::FileTooLarge,
            ..
        } => Err(ImagingError::FileTooLarge {
            size_bytes: input.size_bytes(),
            max_bytes: max_input_bytes,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 10 * 1024 * 1024;

    fn input(size: usize, mime: &str) -> RawImageInput {
        RawImageInput::new(vec![0u8; size], mime)
    }

    #[test]
    fn accepts_supported_types() {
        for (mime, expected) in [
            ("image/jpeg", MediaType::Jpeg),
            ("image/jpg", MediaType::Jpeg),
            ("image/png", MediaType::Png),
            ("image/webp", MediaType::WebP),
        ] {
            let result = validate(&input(1024, mime), LIMIT);
            assert_eq!(result, ValidationResult::Accepted { media_type: expected });
            assert!(result.is_valid());
            assert_eq!(result.reason(), None);
        }
    }

    #[test]
    fn rejects_unsupported_types() {
        for mime in ["image/gif", "image/heic", "application/pdf", "text/plain", ""] {
            let result = validate(&input(1024, mime), LIMIT);
            assert!(!result.is_valid());
            assert_eq!(result.reason(), Some(RejectReason::UnsupportedFormat));
            assert!(result.message().unwrap().contains("JPG, PNG ou WEBP"));
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate(&input(LIMIT as usize, "image/png"), LIMIT).is_valid());

        let result = validate(&input(LIMIT as usize + 1, "image/png"), LIMIT);
        assert_eq!(result.reason(), Some(RejectReason::FileTooLarge));
        assert_eq!(result.message(), Some("Image trop volumineuse. Maximum 10 MB."));
    }

    #[test]
    fn fractional_limit_is_not_truncated() {
        let limit = 3 * 1024 * 1024 / 2;
        let result = validate(&input(limit as usize + 1, "image/jpeg"), limit);
        assert_eq!(result.message(), Some("Image trop volumineuse. Maximum 1,5 MB."));

        assert_eq!(megabytes_label(256 * 1024), "0,25");
        assert_eq!(megabytes_label(2 * 1024 * 1024), "2");
    }

    #[test]
    fn eleven_megabyte_png_too_large() {
        let result = validate(&input(11 * 1024 * 1024, "image/png"), LIMIT);
        assert_eq!(result.reason(), Some(RejectReason::FileTooLarge));
    }

    #[test]
    fn format_checked_before_size() {
        let result = validate(&input(LIMIT as usize + 1, "image/gif"), LIMIT);
        assert_eq!(result.reason(), Some(RejectReason::UnsupportedFormat));
    }

    #[test]
    fn content_is_not_inspected() {
        // Garbage bytes still pass: decoding is the pipeline's job.
        let garbage = RawImageInput::new(b"definitely not a jpeg".to_vec(), "image/jpeg");
        assert!(validate(&garbage, LIMIT).is_valid());
    }

    #[test]
    fn validation_is_repeatable() {
        for candidate in [input(10, "image/png"), input(10, "image/bmp"), input(LIMIT as usize + 1, "image/jpeg")] {
            assert_eq!(validate(&candidate, LIMIT), validate(&candidate, LIMIT));
        }
    }

    #[test]
    fn require_valid_maps_to_errors() {
        let err = require_valid(&input(10, "image/gif"), LIMIT).unwrap_err();
        assert!(matches!(err, ImagingError::UnsupportedFormat(ref m) if m == "image/gif"));

        let err = require_valid(&input(LIMIT as usize + 5, "image/webp"), LIMIT).unwrap_err();
        assert!(matches!(
            err,
            ImagingError::FileTooLarge { size_bytes, max_bytes } if size_bytes == LIMIT + 5 && max_bytes == LIMIT
        ));

        assert_eq!(require_valid(&input(10, "image/jpg"), LIMIT).unwrap(), MediaType::Jpeg);
    }

    #[test]
    fn verdict_serializes_for_the_ui() {
        let json = serde_json::to_value(validate(&input(10, "image/gif"), LIMIT)).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "unsupported_format");

        let json = serde_json::to_value(validate(&input(10, "image/png"), LIMIT)).unwrap();
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["media_type"], "png");
    }
}
