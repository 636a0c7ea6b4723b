use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgb, RgbImage};

use super::ImagingError;
use crate::pipeline::import::{sniff_media_type, MediaType};

/// Decode image bytes at native resolution.
///
/// The container is identified from magic bytes, falling back to the declared
/// type, the same way a browser ignores a wrong `Content-Type` on an `<img>`.
/// Width or height above `max_dimension` is refused before pixels are
/// allocated.
pub fn decode_image(
    bytes: &[u8],
    declared: MediaType,
    max_dimension: u32,
) -> Result<DynamicImage, ImagingError> {
    let format = sniff_media_type(bytes).unwrap_or(declared);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format.image_format());
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    reader
        .decode()
        .map_err(|e| ImagingError::ImageDecode(format!("{format} data: {e}")))
}

/// Encode a raster in the given media type.
///
/// `quality` (1-100) applies to the lossy formats, JPEG and WebP. JPEG has no
/// alpha channel, so transparency is composited onto black the way a canvas
/// export does.
pub fn encode_image(
    image: &DynamicImage,
    media_type: MediaType,
    quality: u8,
) -> Result<Vec<u8>, ImagingError> {
    let quality = quality.clamp(1, 100);
    let mut bytes = Vec::new();

    let result = match media_type {
        MediaType::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
            flatten_onto_black(image)
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())
        }
        MediaType::Png => image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| e.to_string()),
        MediaType::WebP => encode_lossy_webp(image, f32::from(quality)).map(|encoded| bytes = encoded),
    };

    result.map_err(|e| ImagingError::ImageEncode(format!("{media_type} encoding failed: {e}")))?;
    Ok(bytes)
}

/// Premultiply by alpha, i.e. draw over an opaque black background.
fn flatten_onto_black(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over_black = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb([over_black(r), over_black(g), over_black(b)])
    })
}

// `image` only writes lossless WebP.
fn encode_lossy_webp(image: &DynamicImage, quality: f32) -> Result<Vec<u8>, String> {
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, quality)
            .map(|memory| memory.to_vec())
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
            .encode_simple(false, quality)
            .map(|memory| memory.to_vec())
    };
    encoded.map_err(|e| format!("{e:?}"))
}
