//! RAW (Bayer CFA) decoding for DNG/TIFF-EP sources (§4.4 Decoding).
//!
//! Reads the IFD tag tree via `dng`, demosaics the sensor mosaic with a
//! same-color-neighbor bilinear average, applies the camera's as-shot
//! white balance, and maps camera RGB to sRGB via the file's `ColorMatrix1`
//! (inverted — DNG defines it as XYZ→camera, so we invert to get
//! camera→XYZ before going to sRGB). No auto-brighten: the only exposure
//! operation is normalizing by black/white level.

use std::io::Cursor;
use std::path::Path;

use dng::ifd::IfdPath;
use dng::tags::ifd;
use dng::DngReader;
use image::{DynamicImage, RgbImage};

use crate::error::RenderError;

/// XYZ(D50) -> linear sRGB(D65), Bradford-adapted (Bruce Lindbloom's
/// published constants). Used when a real `ColorMatrix1` is present.
const XYZ_D50_TO_LINEAR_SRGB: [[f64; 3]; 3] = [
    [3.1338561, -1.6168667, -0.4906146],
    [-0.9787684, 1.9161415, 0.0334540],
    [0.0719453, -0.2289914, 1.4052427],
];

fn decode_err(path: &Path, message: impl Into<String>) -> RenderError {
    RenderError::Decode {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

pub fn decode_raw(path: &Path) -> Result<DynamicImage, RenderError> {
    let bytes = std::fs::read(path).map_err(RenderError::Io)?;
    if bytes.len() < 8 || !matches!(&bytes[0..2], [0x49, 0x49] | [0x4D, 0x4D]) {
        return Err(decode_err(path, "not a TIFF/DNG container"));
    }

    let reader =
        DngReader::read(Cursor::new(bytes)).map_err(|e| decode_err(path, e.to_string()))?;
    let ifd_path = reader.main_image_data_ifd_path();

    let width = tag_u32(&reader, &ifd_path, ifd::ImageWidth)
        .ok_or_else(|| decode_err(path, "missing ImageWidth"))? as usize;
    let height = tag_u32(&reader, &ifd_path, ifd::ImageLength)
        .ok_or_else(|| decode_err(path, "missing ImageLength"))? as usize;
    let bits_per_sample = tag_u32(&reader, &ifd_path, ifd::BitsPerSample).unwrap_or(16);

    let cfa_pattern = tag_list_u32(&reader, &ifd_path, ifd::CFAPattern).unwrap_or(vec![0, 1, 1, 2]);
    let black_levels =
        tag_list_f64(&reader, &ifd_path, ifd::BlackLevel).unwrap_or_else(|| vec![0.0]);
    let white_level = tag_list_f64(&reader, &ifd_path, ifd::WhiteLevel)
        .and_then(|v| v.first().copied())
        .unwrap_or(((1u64 << bits_per_sample) - 1) as f64);
    let as_shot_neutral = tag_list_f64(&reader, &ifd_path, ifd::AsShotNeutral);
    let color_matrix1 = tag_list_f64(&reader, &ifd_path, ifd::ColorMatrix1);

    let strips = reader
        .main_image_data()
        .map_err(|e| decode_err(path, e.to_string()))?;
    let mut data = Vec::new();
    for strip in strips {
        data.extend(strip);
    }
    let samples = unpack_samples(&data, bits_per_sample, width * height)
        .ok_or_else(|| decode_err(path, format!("unsupported BitsPerSample {bits_per_sample}")))?;

    let cam_rgb = demosaic(&samples, width, height, &cfa_pattern, &black_levels, white_level);
    let wb_gain = white_balance_gains(as_shot_neutral.as_deref());
    let matrix = camera_to_srgb_matrix(color_matrix1.as_deref());

    let mut out = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) * 3;
            let cam = [
                cam_rgb[i] * wb_gain[0],
                cam_rgb[i + 1] * wb_gain[1],
                cam_rgb[i + 2] * wb_gain[2],
            ];
            let srgb = apply_matrix(&matrix, cam);
            out.put_pixel(
                x as u32,
                y as u32,
                image::Rgb([
                    encode_srgb_u8(srgb[0]),
                    encode_srgb_u8(srgb[1]),
                    encode_srgb_u8(srgb[2]),
                ]),
            );
        }
    }
    Ok(DynamicImage::ImageRgb8(out))
}

fn tag_u32(
    reader: &DngReader<Cursor<Vec<u8>>>,
    ifd_path: &IfdPath,
    tag: dng::tags::IfdFieldDescriptor,
) -> Option<u32> {
    reader
        .entry_by_path(&ifd_path.chain_tag(tag))
        .and_then(|e| e.value.as_u32())
}

fn tag_list_u32(
    reader: &DngReader<Cursor<Vec<u8>>>,
    ifd_path: &IfdPath,
    tag: dng::tags::IfdFieldDescriptor,
) -> Option<Vec<u32>> {
    reader
        .entry_by_path(&ifd_path.chain_tag(tag))
        .map(|e| e.value.as_list().filter_map(|v| v.as_u32()).collect())
}

fn tag_list_f64(
    reader: &DngReader<Cursor<Vec<u8>>>,
    ifd_path: &IfdPath,
    tag: dng::tags::IfdFieldDescriptor,
) -> Option<Vec<f64>> {
    reader
        .entry_by_path(&ifd_path.chain_tag(tag))
        .map(|e| e.value.as_list().filter_map(|v| v.as_f64()).collect())
}

/// Unpacks byte-aligned 8- or 16-bit samples (the common uncompressed
/// linear-DNG case). Vendor-specific bit-packed/compressed mosaics are not
/// decoded here.
fn unpack_samples(buf: &[u8], bits: u32, count: usize) -> Option<Vec<f64>> {
    match bits {
        8 => Some(buf.iter().take(count).map(|&b| b as f64).collect()),
        16 => Some(
            buf.chunks_exact(2)
                .take(count)
                .map(|c| u16::from_be_bytes([c[0], c[1]]) as f64)
                .collect(),
        ),
        _ => None,
    }
}

/// Which CFA color (0=R, 1=G, 2=B) sensor pixel `(x, y)` measures, from a
/// (typically 2x2) repeating pattern.
fn cfa_color(pattern: &[u32], x: usize, y: usize) -> u32 {
    let dim = (pattern.len() as f64).sqrt().round() as usize;
    let dim = dim.max(1);
    pattern[(y % dim) * dim + (x % dim)]
}

/// Bilinear demosaic: every output channel at every pixel is the average
/// of same-colored sensor values in the surrounding 3x3 neighborhood
/// (exact value when the pixel itself is that channel's sensor site).
fn demosaic(
    samples: &[f64],
    width: usize,
    height: usize,
    cfa_pattern: &[u32],
    black_levels: &[f64],
    white_level: f64,
) -> Vec<f64> {
    let black_at = |c: u32| black_levels[(c as usize) % black_levels.len()];
    let range = (white_level - black_at(0)).max(1.0);

    let normalized: Vec<f64> = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                let c = cfa_color(cfa_pattern, x, y);
                let raw = samples[y * width + x];
                ((raw - black_at(c)) / range).clamp(0.0, 1.0)
            })
        })
        .collect();

    let mut out = vec![0.0; width * height * 3];
    for y in 0..height {
        for x in 0..width {
            for channel in 0..3u32 {
                let mut sum = 0.0;
                let mut count = 0.0;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if cfa_color(cfa_pattern, nx, ny) == channel {
                            sum += normalized[ny * width + nx];
                            count += 1.0;
                        }
                    }
                }
                out[(y * width + x) * 3 + channel as usize] = if count > 0.0 { sum / count } else { 0.0 };
            }
        }
    }
    out
}

/// Per-channel gain that maps the camera's as-shot neutral point to gray.
/// `AsShotNeutral` is the camera-RGB value of a neutral gray; dividing by
/// it (gain = 1/neutral) is the camera white balance §4.4 requires.
fn white_balance_gains(as_shot_neutral: Option<&[f64]>) -> [f64; 3] {
    match as_shot_neutral {
        Some([r, g, b, ..]) if *r > 0.0 && *g > 0.0 && *b > 0.0 => [1.0 / r, 1.0 / g, 1.0 / b],
        _ => [1.0, 1.0, 1.0],
    }
}

/// Camera RGB -> linear sRGB matrix, built from the file's `ColorMatrix1`
/// (XYZ->camera; inverted here to camera->XYZ, then composed with the
/// fixed XYZ(D50)->sRGB(D65) matrix) or the identity if absent.
fn camera_to_srgb_matrix(color_matrix1: Option<&[f64]>) -> [[f64; 3]; 3] {
    let Some(m) = color_matrix1.filter(|m| m.len() == 9) else {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    };
    let xyz_to_camera = [
        [m[0], m[1], m[2]],
        [m[3], m[4], m[5]],
        [m[6], m[7], m[8]],
    ];
    let Some(camera_to_xyz) = invert3x3(&xyz_to_camera) else {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    };
    matmul(&XYZ_D50_TO_LINEAR_SRGB, &camera_to_xyz)
}

fn matmul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn invert3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

fn apply_matrix(m: &[[f64; 3]; 3], rgb: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2],
        m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2],
        m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2],
    ]
}

/// IEC 61966-2-1 sRGB transfer function, linear -> 8-bit encoded.
fn encode_srgb_u8(linear: f64) -> u8 {
    let linear = linear.clamp(0.0, 1.0);
    let encoded = if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (encoded.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use dng::ifd::{Ifd, IfdValue};
    use dng::tags::IfdType;
    use dng::{DngWriter, FileType};
    use std::sync::Arc;

    /// Writes a minimal uncompressed 16-bit RGGB DNG: a flat mid-gray
    /// scene so the demosaiced output should come out near-neutral.
    fn write_test_dng(path: &Path, width: u32, height: u32) {
        let mut samples = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let is_red_row = y % 2 == 0;
                let is_red_col = x % 2 == 0;
                let value: u16 = if is_red_row && is_red_col {
                    32000 // R
                } else if !is_red_row && !is_red_col {
                    32000 // B
                } else {
                    32768 // G
                };
                samples.push(value);
            }
        }
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            bytes.extend_from_slice(&s.to_be_bytes());
        }

        let mut ifd = Ifd::new(IfdType::Ifd);
        ifd.insert(ifd::NewSubfileType, 0u32);
        ifd.insert(ifd::ImageWidth, width);
        ifd.insert(ifd::ImageLength, height);
        ifd.insert(ifd::BitsPerSample, 16u16);
        ifd.insert(ifd::SamplesPerPixel, 1u16);
        ifd.insert(ifd::PhotometricInterpretation, 32803u16); // CFA
        ifd.insert(ifd::CFARepeatPatternDim, IfdValue::List(vec![
            IfdValue::Short(2), IfdValue::Short(2),
        ]));
        ifd.insert(ifd::CFAPattern, &[0u8, 1, 1, 2][..]);
        ifd.insert(ifd::StripByteCounts, bytes.len() as u32);
        ifd.insert(ifd::StripOffsets, IfdValue::Offsets(Arc::new(bytes)));
        ifd.insert(ifd::WhiteLevel, 65535u32);
        ifd.insert(ifd::BlackLevel, 0u32);

        let file = std::fs::File::create(path).unwrap();
        DngWriter::write_dng(file, false, FileType::Dng, vec![ifd]).unwrap();
    }

    #[test]
    fn test_decode_raw_produces_expected_dimensions_and_no_magenta_tint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.dng");
        write_test_dng(&path, 8, 6);

        let decoded = decode_raw(&path).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);

        let rgb = decoded.to_rgb8();
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            // A magenta tint means R and B run high while G lags; a flat
            // gray scene should keep channels close together instead.
            let spread = r.max(g).max(b) as i32 - r.min(g).min(b) as i32;
            assert!(spread < 40, "pixel {:?} has too much channel spread", pixel.0);
        }
    }

    #[test]
    fn test_decode_raw_rejects_non_dng_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_raw.dng");
        std::fs::write(&path, b"not a tiff file at all").unwrap();
        let err = decode_raw(&path).unwrap_err();
        assert!(matches!(err, RenderError::Decode { .. }));
    }

    #[test]
    fn test_white_balance_gains_defaults_to_unity_without_neutral() {
        assert_eq!(white_balance_gains(None), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_camera_to_srgb_matrix_defaults_to_identity_without_color_matrix() {
        assert_eq!(
            camera_to_srgb_matrix(None),
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_invert3x3_round_trips_identity() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(invert3x3(&identity).unwrap(), identity);
    }
}
