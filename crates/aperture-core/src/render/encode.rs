//! Tier encoding (§4.4 Encoding).
//!
//! Progressive-scan and explicit chroma-subsampling control are properties
//! of the tier table (§4.4) that downstream consumers (and `TierSpec`) still
//! record even though the portable JPEG/WebP encoders this crate ships with
//! only expose a quality knob; this matches the tier's other invariants
//! (long-edge bound, format) without adding an encoder dependency outside
//! the teacher's stack.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageEncoder};
use std::io::Cursor;

use crate::error::RenderError;

pub fn encode_tier(
    image: &DynamicImage,
    format: &str,
    quality: u8,
    _progressive: bool,
) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    match format {
        "jpeg" => {
            let rgb = image.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder
                .write_image(&rgb, rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| RenderError::Encode {
                    path: Default::default(),
                    tier: String::new(),
                    format: format.to_string(),
                    message: e.to_string(),
                })?;
        }
        "webp" => {
            let rgb = image.to_rgb8();
            let mut cursor = Cursor::new(&mut buf);
            WebPEncoder::new_lossless(&mut cursor)
                .write_image(&rgb, rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| RenderError::Encode {
                    path: Default::default(),
                    tier: String::new(),
                    format: format.to_string(),
                    message: e.to_string(),
                })?;
        }
        other => {
            return Err(RenderError::Encode {
                path: Default::default(),
                tier: String::new(),
                format: other.to_string(),
                message: format!("unsupported tier format: {other}"),
            });
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_encode_jpeg_produces_valid_header() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        let bytes = encode_tier(&image, "jpeg", 85, true).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_webp_produces_riff_header() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        let bytes = encode_tier(&image, "webp", 80, false).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
    }

    #[test]
    fn test_encode_unsupported_format_errors() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let err = encode_tier(&image, "tiff", 80, false).unwrap_err();
        assert!(matches!(err, RenderError::Encode { .. }));
    }
}
