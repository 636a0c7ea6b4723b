//! Size reducer: bounds artifact size before upload.
//!
//! Artifacts at or under `max_bytes` pass through untouched, media type
//! included. Anything larger is scaled to fit `max_width` x `max_height`
//! (never upscaled) and re-encoded as JPEG. The quality heuristic is a single
//! estimate from the size of the uploaded file, so the result can still be
//! above `max_bytes`; `QualityStrategy::BoundedSearch` trades extra encodes
//! for a tighter fit.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::codec::{decode_image, encode_image};
use super::deidentify::Rendition;
use super::types::ImageArtifact;
use super::ImagingError;
use crate::config::{ImagingConfig, QualityStrategy, ResizeQuality};
use crate::pipeline::import::MediaType;

/// Limits applied by [`SizeReducer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionPolicy {
    pub max_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub resize_quality: ResizeQuality,
    pub strategy: QualityStrategy,
}

impl ReductionPolicy {
    pub fn from_config(config: &ImagingConfig) -> Self {
        Self {
            max_bytes: config.max_output_bytes,
            max_width: config.max_width,
            max_height: config.max_height,
            resize_quality: config.resize_quality,
            strategy: config.quality_strategy,
        }
    }
}

impl Default for ReductionPolicy {
    fn default() -> Self {
        Self::from_config(&ImagingConfig::default())
    }
}

pub struct SizeReducer {
    policy: ReductionPolicy,
    max_decode_dimension: u32,
}

impl SizeReducer {
    pub fn new(policy: ReductionPolicy, max_decode_dimension: u32) -> Self {
        Self {
            policy,
            max_decode_dimension,
        }
    }

    pub fn policy(&self) -> &ReductionPolicy {
        &self.policy
    }

    /// Reduce a standalone artifact, decoding its bytes only if it is
    /// actually over the limit. The artifact is its own source.
    pub fn reduce_if_needed(&self, artifact: ImageArtifact) -> Result<ImageArtifact, ImagingError> {
        if artifact.size_bytes() <= self.policy.max_bytes {
            return Ok(artifact);
        }
        let source_size = artifact.size_bytes();
        let raster = decode_image(&artifact.bytes, artifact.media_type, self.max_decode_dimension)?;
        let reduced = self.reduce_rendition(Rendition { raster, artifact }, source_size)?;
        Ok(reduced.artifact)
    }

    /// Reduce a rendition using the raster it was encoded from.
    ///
    /// Whether to reduce depends on the rendition's own size. The JPEG
    /// quality is estimated from `source_size`, the uploaded file, since the
    /// rendition's size reflects our re-encode rather than the photo.
    pub fn reduce_rendition(
        &self,
        rendition: Rendition,
        source_size: u64,
    ) -> Result<Rendition, ImagingError> {
        let original_size = rendition.artifact.size_bytes();
        if original_size <= self.policy.max_bytes {
            return Ok(rendition);
        }

        let Rendition { raster, artifact } = rendition;
        let (width, height) = raster.dimensions();
        let (new_w, new_h) =
            compute_scaled_dimensions(width, height, self.policy.max_width, self.policy.max_height);

        let resized = if (new_w, new_h) == (width, height) {
            raster
        } else {
            let filter = match self.policy.resize_quality {
                ResizeQuality::High => FilterType::CatmullRom,
                ResizeQuality::Fast => FilterType::Triangle,
            };
            raster.resize_exact(new_w, new_h, filter)
        };

        let (bytes, quality) = match self.policy.strategy {
            QualityStrategy::SingleShot => {
                let quality = quality_for(self.policy.max_bytes, source_size);
                (encode_image(&resized, MediaType::Jpeg, quality)?, quality)
            }
            QualityStrategy::BoundedSearch { max_attempts } => {
                search_quality(&resized, self.policy.max_bytes, max_attempts)?
            }
        };

        info!(
            variant = ?artifact.variant,
            from = format!("{width}x{height}"),
            to = format!("{new_w}x{new_h}"),
            original_size,
            source_size,
            reduced_size = bytes.len(),
            quality,
            "Artifact reduced"
        );

        Ok(Rendition {
            raster: resized,
            artifact: ImageArtifact {
                bytes,
                media_type: MediaType::Jpeg,
                width: new_w,
                height: new_h,
                ..artifact
            },
        })
    }
}

/// Scale `width` x `height` down to fit inside `max_width` x `max_height`,
/// keeping the aspect ratio. Images that already fit are returned as-is.
pub fn compute_scaled_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }

    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    if scale >= 1.0 {
        return (width, height);
    }

    let new_w = ((width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
    let new_h = ((height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
    (new_w, new_h)
}

/// JPEG quality (1-100) from the ratio `max_bytes / size`, capped at 100.
pub fn quality_for(max_bytes: u64, size_bytes: u64) -> u8 {
    if size_bytes == 0 {
        return 100;
    }
    let ratio = (max_bytes as f64 / size_bytes as f64).min(1.0);
    ((ratio * 100.0).round() as u8).clamp(1, 100)
}

/// Binary search over JPEG quality. Returns the highest quality that fits,
/// or the smallest encoding tried when none does.
fn search_quality(
    raster: &DynamicImage,
    max_bytes: u64,
    max_attempts: u8,
) -> Result<(Vec<u8>, u8), ImagingError> {
    let mut low = 1u8;
    let mut high = 100u8;
    let mut best_fit: Option<(Vec<u8>, u8)> = None;
    let mut smallest: Option<(Vec<u8>, u8)> = None;

    for attempt in 0..max_attempts.max(1) {
        if low > high {
            break;
        }
        let quality = low + (high - low) / 2;
        let bytes = encode_image(raster, MediaType::Jpeg, quality)?;
        debug!(attempt, quality, size = bytes.len(), max_bytes, "Quality search step");

        if bytes.len() as u64 <= max_bytes {
            low = quality + 1;
            best_fit = Some((bytes, quality));
        } else {
            if quality == 1 {
                smallest = Some((bytes, quality));
                break;
            }
            high = quality - 1;
            if smallest.as_ref().map_or(true, |(s, _)| bytes.len() < s.len()) {
                smallest = Some((bytes, quality));
            }
        }
    }

    match best_fit.or(smallest) {
        Some(found) => Ok(found),
        // Unreachable with at least one attempt; encode once more to stay total.
        None => Ok((encode_image(raster, MediaType::Jpeg, 1)?, 1)),
    }
}
