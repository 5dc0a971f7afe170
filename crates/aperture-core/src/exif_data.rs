//! EXIF metadata extraction (§4.5 `exif`, §3 Image.exif_blob/camera_body).
//! Adapted from the teacher's metadata extractor, lenient by design:
//! missing or malformed tags simply leave the corresponding field `None`.

use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExifFields {
    pub captured_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub iso: Option<u32>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub focal_length: Option<f32>,
    pub orientation: Option<u32>,
}

/// Extract what EXIF data is present; `None` if the file carries none at all.
pub fn extract(path: &Path) -> Option<ExifFields> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    let data = ExifFields {
        captured_at: datetime(&exif),
        camera_make: string_field(&exif, Tag::Make),
        camera_model: string_field(&exif, Tag::Model),
        gps_latitude: gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        gps_longitude: gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        iso: u32_field(&exif, Tag::PhotographicSensitivity),
        aperture: aperture(&exif),
        shutter_speed: shutter_speed(&exif),
        focal_length: focal_length(&exif),
        orientation: u32_field(&exif, Tag::Orientation),
    };

    let has_any = data.captured_at.is_some()
        || data.camera_make.is_some()
        || data.camera_model.is_some()
        || data.gps_latitude.is_some()
        || data.iso.is_some()
        || data.aperture.is_some()
        || data.shutter_speed.is_some()
        || data.focal_length.is_some()
        || data.orientation.is_some();
    has_any.then_some(data)
}

fn string_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim_matches('"').to_string())
}

fn u32_field(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match &f.value {
        Value::Short(v) => v.first().map(|&x| x as u32),
        Value::Long(v) => v.first().copied(),
        _ => None,
    })
}

fn datetime(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
        .map(|f| f.display_value().to_string().trim_matches('"').to_string())
}

fn gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord = exif.get_field(coord_tag, In::PRIMARY)?;
    let reference = exif.get_field(ref_tag, In::PRIMARY)?;
    let degrees = gps_rationals(&coord.value)?;
    let ref_str = reference.display_value().to_string();
    let sign = if ref_str.contains('S') || ref_str.contains('W') { -1.0 } else { 1.0 };
    Some(sign * degrees)
}

fn gps_rationals(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(r) if r.len() >= 3 => Some(r[0].to_f64() + r[1].to_f64() / 60.0 + r[2].to_f64() / 3600.0),
        _ => None,
    }
}

fn aperture(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::FNumber, In::PRIMARY)
        .map(|f| format!("f/{}", f.display_value()))
}

fn shutter_speed(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::ExposureTime, In::PRIMARY).map(|f| f.display_value().to_string())
}

fn focal_length(exif: &exif::Exif) -> Option<f32> {
    exif.get_field(Tag::FocalLength, In::PRIMARY).and_then(|f| match &f.value {
        Value::Rational(v) => v.first().map(|r| r.to_f64() as f32),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_missing_file_is_none() {
        assert!(extract(Path::new("/nonexistent/file.jpg")).is_none());
    }
}
