use serde::{Deserialize, Serialize};

use super::orientation::Orientation;
use crate::pipeline::import::MediaType;

/// Which rendition of a document photo an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Shown on the public listing. Blurred when the reporter asked for it.
    Public,
    /// Kept for the owner and moderators. Never blurred.
    Private,
}

/// An encoded image ready for upload.
///
/// Owns its bytes: the public and private artifacts of one submission never
/// share a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub width: u32,
    pub height: u32,
    pub variant: Variant,
    /// True if a privacy transform altered the pixels.
    pub blurred: bool,
}

impl ImageArtifact {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            media_type: self.media_type,
            width: self.width,
            height: self.height,
            size_bytes: self.size_bytes(),
            variant: self.variant,
            blurred: self.blurred,
        }
    }
}

/// Byte-free description of an artifact, for logs and JSON reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub media_type: MediaType,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub variant: Variant,
    pub blurred: bool,
}

/// The two uploadable renditions produced for one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeidentifiedImages {
    pub public: ImageArtifact,
    pub private: ImageArtifact,
    /// Whether the reporter requested blurring. When false both artifacts
    /// carry the same unmodified picture.
    pub was_blurred: bool,
    /// Turn applied to the upload before any other transform.
    pub orientation: Orientation,
}

impl DeidentifiedImages {
    pub fn summary(&self) -> ProcessingSummary {
        ProcessingSummary {
            public: self.public.summary(),
            private: self.private.summary(),
            was_blurred: self.was_blurred,
            orientation: self.orientation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub public: ArtifactSummary,
    pub private: ArtifactSummary,
    pub was_blurred: bool,
    pub orientation: Orientation,
}

/// Rectangle to obscure, in pixels of the oriented raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlurRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlurRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect with a `width` x `height` raster. `None` when nothing of the
    /// region lies inside it.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BlurRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(BlurRegion::new(self.x, self.y, w, h))
    }
}
