//! Document photo pipeline: validate, decode, de-identify, reduce.
//!
//! Pipeline flow:
//! 1. Validate declared type and size (no decoding)
//! 2. Decode at native resolution
//! 3. `orientation.read()`: turn the raster upright from EXIF
//! 4. `deidentifier.deidentify()`: public + private renditions
//! 5. `reducer.reduce_rendition()`: each rendition on its own, quality
//!    estimated from the upload size
//!
//! Any failure aborts the run; no partial result is returned. The pipeline
//! holds no per-call state, so one instance can serve concurrent callers.

use std::sync::Arc;

use image::GenericImageView;
use tracing::debug;

use super::codec::{decode_image, encode_image};
use super::deidentify::{Deidentifier, PrivacyTransform, RegionBlur, WholeImageBlur};
use super::orientation::{ExifOrientationReader, IgnoreOrientation, Orientation, OrientationReader};
use super::reduce::{ReductionPolicy, SizeReducer};
use super::types::{BlurRegion, DeidentifiedImages, ImageArtifact, Variant};
use super::ImagingError;
use crate::config::ImagingConfig;
use crate::pipeline::import::{require_valid, validate, MediaType, RawImageInput, ValidationResult};

/// Turns an uploaded photo into the two artifacts stored with a report.
pub trait DocumentImageProcessor: Send + Sync {
    /// Gate a file before it is accepted by the picker.
    fn validate(&self, input: &RawImageInput) -> ValidationResult;

    /// Produce the public and private artifacts.
    fn process(
        &self,
        input: &RawImageInput,
        apply_blur: bool,
    ) -> Result<DeidentifiedImages, ImagingError>;
}

/// Composes the pipeline services.
pub struct ImagePipeline {
    orientation: Box<dyn OrientationReader>,
    deidentifier: Deidentifier,
    reducer: SizeReducer,
    max_input_bytes: u64,
    max_decode_dimension: u32,
}

impl ImagePipeline {
    pub fn new(
        orientation: Box<dyn OrientationReader>,
        transform: Box<dyn PrivacyTransform>,
        config: &ImagingConfig,
    ) -> Self {
        Self {
            orientation,
            deidentifier: Deidentifier::new(transform, config.encode_quality),
            reducer: SizeReducer::new(ReductionPolicy::from_config(config), config.max_decode_dimension),
            max_input_bytes: config.max_input_bytes,
            max_decode_dimension: config.max_decode_dimension,
        }
    }

    /// Production pipeline: whole-image blur, EXIF orientation when enabled.
    pub fn from_config(config: &ImagingConfig) -> Self {
        Self::new(
            orientation_for(config),
            Box::new(WholeImageBlur::new(config.blur_radius)),
            config,
        )
    }

    /// Pipeline that blurs only the given rectangles.
    pub fn with_regions(config: &ImagingConfig, regions: Vec<BlurRegion>) -> Self {
        Self::new(
            orientation_for(config),
            Box::new(RegionBlur::new(regions, config.region_blur_radius)),
            config,
        )
    }

    pub fn reducer(&self) -> &SizeReducer {
        &self.reducer
    }

    /// Run the CPU-bound pipeline on the blocking pool.
    pub async fn process_async(
        self: Arc<Self>,
        input: RawImageInput,
        apply_blur: bool,
    ) -> Result<DeidentifiedImages, ImagingError> {
        tokio::task::spawn_blocking(move || self.process(&input, apply_blur))
            .await
            .map_err(|e| ImagingError::Worker(e.to_string()))?
    }
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::from_config(&ImagingConfig::default())
    }
}

fn orientation_for(config: &ImagingConfig) -> Box<dyn OrientationReader> {
    if config.correct_orientation {
        Box::new(ExifOrientationReader)
    } else {
        Box::new(IgnoreOrientation)
    }
}

impl DocumentImageProcessor for ImagePipeline {
    fn validate(&self, input: &RawImageInput) -> ValidationResult {
        validate(input, self.max_input_bytes)
    }

    fn process(
        &self,
        input: &RawImageInput,
        apply_blur: bool,
    ) -> Result<DeidentifiedImages, ImagingError> {
        // 1. Validate
        let media_type = require_valid(input, self.max_input_bytes)?;

        // 2. Decode
        let raster = decode_image(input.bytes(), media_type, self.max_decode_dimension)?;
        let (src_w, src_h) = raster.dimensions();

        // 3. Turn upright
        let orientation = self.orientation.read(input.bytes());
        let raster = orientation.apply(raster);

        // 4. Public + private renditions
        let renditions = self.deidentifier.deidentify(&raster, media_type, apply_blur)?;

        // 5. Bound each rendition's size
        let public = self.reducer.reduce_rendition(renditions.public, input.size_bytes())?;
        let private = self.reducer.reduce_rendition(renditions.private, input.size_bytes())?;

        debug!(
            source = format!("{src_w}x{src_h}"),
            input_size = input.size_bytes(),
            public_size = public.artifact.size_bytes(),
            private_size = private.artifact.size_bytes(),
            blurred = apply_blur,
            ?orientation,
            transform = self.deidentifier.transform_name(),
            "Document image processed"
        );

        Ok(DeidentifiedImages {
            public: public.artifact,
            private: private.artifact,
            was_blurred: renditions.was_blurred,
            orientation,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Mock implementation (testing)
// ═══════════════════════════════════════════════════════════

/// Returns a fixed 8x8 grey PNG pair without touching the input bytes.
pub struct MockImageProcessor {
    fail: bool,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentImageProcessor for MockImageProcessor {
    fn validate(&self, input: &RawImageInput) -> ValidationResult {
        validate(input, ImagingConfig::default().max_input_bytes)
    }

    fn process(
        &self,
        _input: &RawImageInput,
        apply_blur: bool,
    ) -> Result<DeidentifiedImages, ImagingError> {
        if self.fail {
            return Err(ImagingError::ImageDecode("Mock processing failure".into()));
        }

        let canvas = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([128, 128, 128]),
        ));
        let bytes = encode_image(&canvas, MediaType::Png, 92)?;
        let artifact = |variant, blurred| ImageArtifact {
            bytes: bytes.clone(),
            media_type: MediaType::Png,
            width: 8,
            height: 8,
            variant,
            blurred,
        };

        Ok(DeidentifiedImages {
            public: artifact(Variant::Public, apply_blur),
            private: artifact(Variant::Private, false),
            was_blurred: apply_blur,
            orientation: Orientation::Upright,
        })
    }
}
