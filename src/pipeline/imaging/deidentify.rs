//! Privacy transform: turns one decoded raster into a public and a private
//! rendition.
//!
//! The default strategy blurs the whole picture; nothing here locates faces
//! or numbers. `RegionBlur` is for callers that know which rectangles to
//! hide.

use image::{imageops, DynamicImage, GenericImageView};
use tracing::debug;

use super::codec::encode_image;
use super::types::{BlurRegion, ImageArtifact, Variant};
use super::ImagingError;
use crate::pipeline::import::MediaType;

/// Obscures a raster. Pure: never mutates the input.
pub trait PrivacyTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, raster: &DynamicImage) -> DynamicImage;
}

/// Gaussian blur over the entire image.
#[derive(Debug, Clone)]
pub struct WholeImageBlur {
    radius: f32,
}

impl WholeImageBlur {
    /// `radius` is the Gaussian standard deviation in native pixels, the
    /// same unit as CSS `blur(25px)`.
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl PrivacyTransform for WholeImageBlur {
    fn name(&self) -> &'static str {
        "whole_image_blur"
    }

    fn apply(&self, raster: &DynamicImage) -> DynamicImage {
        gaussian_blur(raster, self.radius)
    }
}

/// Gaussian blur restricted to caller-supplied rectangles.
///
/// Each rectangle is blurred on its own, so colour from outside a region
/// never bleeds in. Regions are clamped to the raster; ones entirely outside
/// it are skipped.
#[derive(Debug, Clone)]
pub struct RegionBlur {
    regions: Vec<BlurRegion>,
    radius: f32,
}

impl RegionBlur {
    pub fn new(regions: Vec<BlurRegion>, radius: f32) -> Self {
        Self { regions, radius }
    }
}

impl PrivacyTransform for RegionBlur {
    fn name(&self) -> &'static str {
        "region_blur"
    }

    fn apply(&self, raster: &DynamicImage) -> DynamicImage {
        let (width, height) = raster.dimensions();
        let mut output = raster.clone();

        for region in self.regions.iter().filter_map(|r| r.clamp_to(width, height)) {
            let patch = raster.crop_imm(region.x, region.y, region.width, region.height);
            let blurred = gaussian_blur(&patch, self.radius);
            imageops::replace(&mut output, &blurred, i64::from(region.x), i64::from(region.y));
        }

        output
    }
}

/// Identity transform.
pub struct NoBlur;

impl PrivacyTransform for NoBlur {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply(&self, raster: &DynamicImage) -> DynamicImage {
        raster.clone()
    }
}

fn gaussian_blur(raster: &DynamicImage, sigma: f32) -> DynamicImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return raster.clone();
    }
    raster.blur(sigma)
}

/// A rendition kept together with the raster it was encoded from, so the
/// size reducer can work without decoding the bytes again.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub raster: DynamicImage,
    pub artifact: ImageArtifact,
}

/// Output of [`Deidentifier::deidentify`].
#[derive(Debug, Clone)]
pub struct Renditions {
    pub public: Rendition,
    pub private: Rendition,
    pub was_blurred: bool,
}

/// Runs a [`PrivacyTransform`] and encodes both renditions at native size in
/// the input's media type.
pub struct Deidentifier {
    transform: Box<dyn PrivacyTransform>,
    encode_quality: u8,
}

impl Deidentifier {
    pub fn new(transform: Box<dyn PrivacyTransform>, encode_quality: u8) -> Self {
        Self {
            transform,
            encode_quality,
        }
    }

    pub fn transform_name(&self) -> &'static str {
        self.transform.name()
    }

    /// With `apply_blur` the public rendition is transformed and the private
    /// one is the untouched raster. Without it both renditions hold the same
    /// untouched pixels and bytes.
    pub fn deidentify(
        &self,
        raster: &DynamicImage,
        media_type: MediaType,
        apply_blur: bool,
    ) -> Result<Renditions, ImagingError> {
        let (width, height) = raster.dimensions();

        let private_bytes = encode_image(raster, media_type, self.encode_quality)?;
        let private = Rendition {
            raster: raster.clone(),
            artifact: ImageArtifact {
                bytes: private_bytes,
                media_type,
                width,
                height,
                variant: Variant::Private,
                blurred: false,
            },
        };

        let public = if apply_blur {
            let blurred = self.transform.apply(raster);
            let bytes = encode_image(&blurred, media_type, self.encode_quality)?;
            debug!(
                transform = self.transform.name(),
                size = bytes.len(),
                dimensions = format!("{width}x{height}"),
                "Public rendition blurred"
            );
            Rendition {
                raster: blurred,
                artifact: ImageArtifact {
                    bytes,
                    media_type,
                    width,
                    height,
                    variant: Variant::Public,
                    blurred: true,
                },
            }
        } else {
            Rendition {
                raster: private.raster.clone(),
                artifact: ImageArtifact {
                    variant: Variant::Public,
                    ..private.artifact.clone()
                },
            }
        };

        Ok(Renditions {
            public,
            private,
            was_blurred: apply_blur,
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::pipeline::imaging::codec::decode_image;

    fn checkerboard(width: u32, height: u32, cell: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    /// Sum of absolute horizontal neighbour differences on the red channel.
    fn edge_energy(img: &DynamicImage) -> u64 {
        let rgb = img.to_rgb8();
        let mut total = 0u64;
        for y in 0..rgb.height() {
            for x in 1..rgb.width() {
                let a = rgb.get_pixel(x - 1, y).0[0] as i64;
                let b = rgb.get_pixel(x, y).0[0] as i64;
                total += (a - b).unsigned_abs();
            }
        }
        total
    }

    #[test]
    fn whole_blur_softens_edges() {
        let img = checkerboard(96, 64, 4);
        let blurred = WholeImageBlur::new(6.0).apply(&img);
        assert_eq!(blurred.dimensions(), (96, 64));
        assert!(edge_energy(&blurred) * 4 < edge_energy(&img));
    }

    #[test]
    fn whole_blur_keeps_uniform_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([90, 120, 200])));
        let blurred = WholeImageBlur::new(25.0).apply(&img).to_rgb8();
        for p in blurred.pixels() {
            assert!((p.0[0] as i32 - 90).abs() <= 1);
            assert!((p.0[2] as i32 - 200).abs() <= 1);
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let img = checkerboard(16, 16, 2);
        assert_eq!(WholeImageBlur::new(0.0).apply(&img).to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn region_blur_only_touches_regions() {
        let img = checkerboard(64, 64, 4);
        let region = BlurRegion::new(16, 16, 24, 24);
        let out = RegionBlur::new(vec![region], 3.0).apply(&img);

        let (src, dst) = (img.to_rgb8(), out.to_rgb8());
        let mut changed_inside = 0;
        for (x, y, p) in dst.enumerate_pixels() {
            let inside = (16..40).contains(&x) && (16..40).contains(&y);
            if inside {
                if p != src.get_pixel(x, y) {
                    changed_inside += 1;
                }
            } else {
                assert_eq!(p, src.get_pixel(x, y), "pixel ({x},{y}) outside region changed");
            }
        }
        assert!(changed_inside > 0);
    }

    #[test]
    fn region_blur_ignores_regions_off_image() {
        let img = checkerboard(32, 32, 4);
        let out = RegionBlur::new(vec![BlurRegion::new(100, 100, 10, 10)], 3.0).apply(&img);
        assert_eq!(out.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn region_blur_clamps_overflowing_region() {
        let img = checkerboard(32, 32, 4);
        let out = RegionBlur::new(vec![BlurRegion::new(24, 24, 100, 100)], 3.0).apply(&img);
        assert_eq!(out.dimensions(), (32, 32));
        assert_eq!(out.to_rgb8().get_pixel(0, 0), img.to_rgb8().get_pixel(0, 0));
        assert_ne!(out.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn deidentify_with_blur_yields_distinct_renditions() {
        let img = checkerboard(80, 60, 5);
        let deid = Deidentifier::new(Box::new(WholeImageBlur::new(6.0)), 92);
        let out = deid.deidentify(&img, MediaType::Png, true).unwrap();

        assert!(out.was_blurred);
        assert_eq!(out.public.artifact.variant, Variant::Public);
        assert_eq!(out.private.artifact.variant, Variant::Private);
        assert!(out.public.artifact.blurred);
        assert!(!out.private.artifact.blurred);

        let public = decode_image(&out.public.artifact.bytes, MediaType::Png, 16384).unwrap();
        let private = decode_image(&out.private.artifact.bytes, MediaType::Png, 16384).unwrap();
        assert_eq!(public.dimensions(), (80, 60));
        assert_eq!(private.to_rgb8(), img.to_rgb8());
        assert_ne!(public.to_rgb8(), private.to_rgb8());
    }

    #[test]
    fn deidentify_without_blur_is_identical() {
        let img = checkerboard(50, 40, 5);
        let deid = Deidentifier::new(Box::new(WholeImageBlur::new(6.0)), 92);
        let out = deid.deidentify(&img, MediaType::Jpeg, false).unwrap();

        assert!(!out.was_blurred);
        assert_eq!(out.public.artifact.bytes, out.private.artifact.bytes);
        assert!(!out.public.artifact.blurred);
        assert_eq!(out.public.artifact.media_type, MediaType::Jpeg);
        assert_eq!(out.public.artifact.variant, Variant::Public);
    }

    #[test]
    fn output_keeps_input_media_type() {
        let img = checkerboard(24, 24, 3);
        let deid = Deidentifier::new(Box::new(NoBlur), 92);
        for media in [MediaType::Jpeg, MediaType::Png, MediaType::WebP] {
            let out = deid.deidentify(&img, media, true).unwrap();
            assert_eq!(out.public.artifact.media_type, media);
            assert_eq!(out.private.artifact.media_type, media);
        }
        assert_eq!(deid.transform_name(), "none");
    }
}
