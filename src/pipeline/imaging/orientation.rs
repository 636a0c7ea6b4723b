//! Upright rendering of phone photos.
//!
//! Cameras store the sensor image as-is and record how to display it in EXIF
//! tag 0x0112. A browser canvas honours that tag when drawing, so the
//! pipeline applies it before blurring or resizing. Every artifact is
//! re-encoded without EXIF, so a skipped rotation would leave a portrait ID
//! card sideways for good.

use std::io::Cursor;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Display transform recorded by the camera, named after the pixel operation
/// that makes the picture upright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Upright,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    /// Rotate 90 clockwise, then mirror horizontally.
    Transpose,
    Rotate90,
    /// Rotate 270 clockwise, then mirror horizontally.
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation value (1-8). Other values are not orientations.
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Upright,
            2 => Self::MirrorHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirrorVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => return None,
        })
    }

    pub fn exif_value(self) -> u32 {
        match self {
            Self::Upright => 1,
            Self::MirrorHorizontal => 2,
            Self::Rotate180 => 3,
            Self::MirrorVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// Width and height trade places once applied.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    pub fn apply(self, raster: DynamicImage) -> DynamicImage {
        match self {
            Self::Upright => raster,
            Self::MirrorHorizontal => raster.fliph(),
            Self::Rotate180 => raster.rotate180(),
            Self::MirrorVertical => raster.flipv(),
            Self::Transpose => raster.rotate90().fliph(),
            Self::Rotate90 => raster.rotate90(),
            Self::Transverse => raster.rotate270().fliph(),
            Self::Rotate270 => raster.rotate270(),
        }
    }
}

/// Decides how an uploaded file should be turned upright.
pub trait OrientationReader: Send + Sync {
    /// `raw_bytes` are the uploaded file bytes.
    fn read(&self, raw_bytes: &[u8]) -> Orientation;
}

/// Reads EXIF tag 0x0112 via `kamadak-exif`.
pub struct ExifOrientationReader;

impl OrientationReader for ExifOrientationReader {
    fn read(&self, raw_bytes: &[u8]) -> Orientation {
        let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(raw_bytes)) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Orientation::Upright,
            Err(e) => {
                debug!(error = %e, "Unreadable EXIF block, keeping stored orientation");
                return Orientation::Upright;
            }
        };

        let Some(value) = exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
        else {
            return Orientation::Upright;
        };

        Orientation::from_exif(value).unwrap_or_else(|| {
            debug!(value, "Ignoring out-of-range EXIF orientation");
            Orientation::Upright
        })
    }
}

/// Treats every upload as upright.
pub struct IgnoreOrientation;

impl OrientationReader for IgnoreOrientation {
    fn read(&self, _raw_bytes: &[u8]) -> Orientation {
        Orientation::Upright
    }
}

/// JPEG APP1 segment with a big-endian TIFF holding one IFD0 entry:
/// Orientation (SHORT) = `value`.
#[cfg(test)]
pub(crate) fn exif_app1_segment(value: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&value.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(&payload);
    segment
}
