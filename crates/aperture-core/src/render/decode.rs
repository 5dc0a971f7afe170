//! Source decoding: RAW vs encoded inputs (§4.4 Decoding).

use image::DynamicImage;
use std::path::Path;

use crate::error::RenderError;
use crate::types::SourceKind;

use super::raw::decode_raw;

#[derive(Debug)]
pub struct DecodedSource {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
}

/// Decode a source file per its kind.
///
/// - RAW: demosaic, camera white balance, no auto-brighten, 8-bit sRGB
///   output (`raw::decode_raw`), EXIF orientation applied after decoding.
/// - Encoded: open, apply EXIF transpose, convert to 3-channel sRGB.
pub fn decode_source(path: &Path, kind: SourceKind) -> Result<DecodedSource, RenderError> {
    let image = match kind {
        SourceKind::Raw => decode_raw(path)?,
        SourceKind::Encoded => image::open(path).map_err(|e| RenderError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
    };

    let oriented = apply_exif_orientation(image, path);
    let rgb = DynamicImage::ImageRgb8(oriented.to_rgb8());

    let (width, height) = (rgb.width(), rgb.height());
    Ok(DecodedSource {
        image: rgb,
        width,
        height,
    })
}

fn apply_exif_orientation(image: DynamicImage, path: &Path) -> DynamicImage {
    let orientation = read_exif_orientation(path).unwrap_or(1);
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

fn read_exif_orientation(path: &Path) -> Option<u32> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| match &f.value {
            exif::Value::Short(v) => v.first().map(|&x| x as u32),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_missing_file_is_render_error() {
        let err = decode_source(Path::new("/nonexistent/a.jpg"), SourceKind::Encoded).unwrap_err();
        assert!(matches!(err, RenderError::Decode { .. }));
    }
}
