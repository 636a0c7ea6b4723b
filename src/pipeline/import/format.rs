use std::fmt;
use std::path::Path;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Image encodings accepted for document photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    WebP,
}

impl MediaType {
    /// Parse a declared MIME type. Case and surrounding whitespace are
    /// ignored, `image/jpg` is accepted as an alias, and parameters
    /// (`; charset=...`) are dropped.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// Detect the encoding from magic bytes (NOT the declared type).
/// Returns `None` for anything outside the accepted set.
pub fn sniff_media_type(bytes: &[u8]) -> Option<MediaType> {
    match bytes {
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(MediaType::Jpeg),
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(MediaType::Png),
        // WebP: RIFF....WEBP
        _ if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" => {
            Some(MediaType::WebP)
        }
        _ => None,
    }
}

/// Guess the declared MIME type of a file from its extension, the way a
/// browser file picker fills in `File.type`.
pub fn mime_from_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
