//! Pure-CPU signal phases (§5: "phases that are pure CPU" run with full
//! worker-pool parallelism, no GPU serialization): EXIF, perceptual
//! hashes, pixel statistics, dominant colors, border detection, and GPS
//! location acceptance. None of these call into a `backends::*` trait —
//! they're measured directly from pixels or file metadata.

use image::DynamicImage;

use crate::config::Config;
use crate::error::PhaseError;
use crate::math::rgb_to_hsv;
use crate::phase::{load_tier_image, Phase};
use crate::store::Store;
use crate::types::{BorderCrop, DominantColor, ImageAnalysis, ImageHash, ImageLocation};

/// §4.5 `exif`: re-extract EXIF into its own signal row (kept alongside
/// `Image.exif_blob`, which `register` already populated).
pub struct ExifPhase;

impl Phase for ExifPhase {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = store
            .get_image(image_id)?
            .ok_or_else(|| PhaseError::new(format!("image {image_id} not found")))?;
        let source_path = config.originals_dir().join(&image.source_path);
        let fields = crate::exif_data::extract(&source_path).unwrap_or_default();
        let row = serde_json::to_value(&fields).map_err(|e| PhaseError::new(e.to_string()))?;
        store.upsert_signal(self.table_name(), image_id, &[row])?;
        Ok(())
    }
}

/// §4.5 `hashes`: perceptual hashes + blur/sharpness/entropy, computed on
/// the `thumb` tier (cheap, stable across minor source re-encodes).
pub struct HashesPhase;

impl Phase for HashesPhase {
    fn name(&self) -> &'static str {
        "hashes"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let (phash, ahash, dhash, whash) = crate::hashing::perceptual_hashes(&image);
        let blur_score = crate::hashing::sharpness_score(&image);
        let row = ImageHash {
            image_id: image_id.to_string(),
            phash,
            ahash,
            dhash,
            whash,
            blur_score,
            sharpness: blur_score,
            entropy: crate::hashing::entropy(&image),
            analyzed_at: crate::store::now(),
        };
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

fn mean_and_channels(image: &DynamicImage) -> (f32, f32, f32, f32) {
    let rgb = image.to_rgb8();
    let n = (rgb.width() as u64 * rgb.height() as u64).max(1);
    let mut sum = [0u64; 3];
    for p in rgb.pixels() {
        sum[0] += p[0] as u64;
        sum[1] += p[1] as u64;
        sum[2] += p[2] as u64;
    }
    let (r, g, b) = ((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32);
    ((r + g + b) / 3.0, r, g, b)
}

/// §4.5 `pixel-analysis`: exposure/color-cast/noise statistics measured
/// directly on the `display` tier.
pub struct PixelAnalysisPhase;

impl Phase for PixelAnalysisPhase {
    fn name(&self) -> &'static str {
        "pixel-analysis"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let (mean_brightness, r, g, b) = mean_and_channels(&image);
        let (dominant_hue, mean_saturation, _) = rgb_to_hsv(r as u8, g as u8, b as u8);

        let gray = image.to_luma8();
        let (mut min, mut max) = (255u8, 0u8);
        let mut clip_low = 0u64;
        let mut clip_high = 0u64;
        let mut sum_sq_dev = 0f64;
        let n = gray.pixels().len().max(1) as f64;
        for p in gray.pixels() {
            let v = p[0];
            min = min.min(v);
            max = max.max(v);
            if v <= 5 {
                clip_low += 1;
            }
            if v >= 250 {
                clip_high += 1;
            }
            sum_sq_dev += (v as f64 - mean_brightness as f64).powi(2);
        }
        let contrast_ratio = (max as f32 + 1.0) / (min as f32 + 1.0);
        let noise_estimate = (sum_sq_dev / n).sqrt() as f32;

        let wb_shift_r = (r - (r + g + b) / 3.0) / 255.0;
        let wb_shift_b = (b - (r + g + b) / 3.0) / 255.0;
        let color_cast = if wb_shift_r.abs() < 0.02 && wb_shift_b.abs() < 0.02 {
            "neutral"
        } else if wb_shift_b > wb_shift_r {
            "cool"
        } else {
            "warm"
        };

        let row = ImageAnalysis {
            image_id: image_id.to_string(),
            mean_brightness,
            contrast_ratio,
            mean_r: r,
            mean_g: g,
            mean_b: b,
            wb_shift_r,
            wb_shift_b,
            noise_estimate,
            clip_low_pct: 100.0 * clip_low as f32 / n as f32,
            clip_high_pct: 100.0 * clip_high as f32 / n as f32,
            mean_saturation,
            dominant_hue,
            color_cast: color_cast.to_string(),
            low_key: mean_brightness < 85.0,
            high_key: mean_brightness > 170.0,
            analyzed_at: crate::store::now(),
        };
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

/// §4.5 `dominant-colors`: exactly 5 K-means clusters in L*a*b* space,
/// percentages summing to 100, sorted descending (`math::kmeans_lab`).
pub struct DominantColorsPhase;

impl Phase for DominantColorsPhase {
    fn name(&self) -> &'static str {
        "dominant-colors"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let rgb = image.to_rgb8();
        let samples: Vec<(f32, f32, f32)> = rgb
            .pixels()
            .map(|p| crate::math::rgb_to_lab(p[0], p[1], p[2]))
            .collect();
        let clusters = crate::math::kmeans_lab(&samples, 5, 6);

        let rows: Vec<serde_json::Value> = clusters
            .into_iter()
            .enumerate()
            .map(|(rank, (lab, pct))| {
                let (r, g, b) = crate::math::lab_to_rgb(lab.0, lab.1, lab.2);
                DominantColor {
                    image_id: image_id.to_string(),
                    rank: rank as u32,
                    percentage: pct,
                    hex: format!("#{r:02x}{g:02x}{b:02x}"),
                    r,
                    g,
                    b,
                    l: lab.0,
                    a: lab.1,
                    b_lab: lab.2,
                    css4_name: nearest_css4_name(r, g, b),
                }
            })
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();
        store.upsert_signal(self.table_name(), image_id, &rows)?;
        Ok(())
    }
}

const CSS4_SWATCHES: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("gray", (128, 128, 128)),
    ("brown", (165, 42, 42)),
    ("orange", (255, 165, 0)),
    ("navy", (0, 0, 128)),
    ("teal", (0, 128, 128)),
    ("beige", (245, 245, 220)),
];

fn nearest_css4_name(r: u8, g: u8, b: u8) -> String {
    CSS4_SWATCHES
        .iter()
        .min_by(|(_, a), (_, c)| {
            let da = (a.0 as i32 - r as i32).pow(2) + (a.1 as i32 - g as i32).pow(2) + (a.2 as i32 - b as i32).pow(2);
            let dc = (c.0 as i32 - r as i32).pow(2) + (c.1 as i32 - g as i32).pow(2) + (c.2 as i32 - b as i32).pow(2);
            da.cmp(&dc)
        })
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "gray".to_string())
}

/// §4.5 `borders`: flat-letterbox detection on each edge via row/column
/// luma variance, expressed as a percentage to crop per side.
pub struct BordersPhase;

impl Phase for BordersPhase {
    fn name(&self) -> &'static str {
        "borders"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let gray = image.to_luma8();
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Err(PhaseError::new(format!("empty image for {image_id}")));
        }

        let row_variance = |y: u32| -> f32 {
            let vals: Vec<f32> = (0..w).map(|x| gray.get_pixel(x, y)[0] as f32).collect();
            variance(&vals)
        };
        let col_variance = |x: u32| -> f32 {
            let vals: Vec<f32> = (0..h).map(|y| gray.get_pixel(x, y)[0] as f32).collect();
            variance(&vals)
        };

        const FLAT_THRESHOLD: f32 = 4.0;
        const MAX_BORDER_FRACTION: f32 = 0.15;

        let top = scan_border(h, (h as f32 * MAX_BORDER_FRACTION) as u32, |i| row_variance(i), FLAT_THRESHOLD);
        let bottom = scan_border(h, (h as f32 * MAX_BORDER_FRACTION) as u32, |i| row_variance(h - 1 - i), FLAT_THRESHOLD);
        let left = scan_border(w, (w as f32 * MAX_BORDER_FRACTION) as u32, |i| col_variance(i), FLAT_THRESHOLD);
        let right = scan_border(w, (w as f32 * MAX_BORDER_FRACTION) as u32, |i| col_variance(w - 1 - i), FLAT_THRESHOLD);

        let row = BorderCrop {
            image_id: image_id.to_string(),
            top_pct: 100.0 * top as f32 / h as f32,
            bottom_pct: 100.0 * bottom as f32 / h as f32,
            left_pct: 100.0 * left as f32 / w as f32,
            right_pct: 100.0 * right as f32 / w as f32,
        };
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

fn variance(vals: &[f32]) -> f32 {
    if vals.is_empty() {
        return 0.0;
    }
    let mean = vals.iter().sum::<f32>() / vals.len() as f32;
    vals.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / vals.len() as f32
}

fn scan_border(total: u32, max_scan: u32, variance_at: impl Fn(u32) -> f32, threshold: f32) -> u32 {
    let mut count = 0u32;
    for i in 0..max_scan.min(total) {
        if variance_at(i) < threshold {
            count += 1;
        } else {
            break;
        }
    }
    count
}

/// §4.5 `locations`: lift GPS coordinates out of EXIF, accepting only
/// fixes inside the valid lat/lon range.
pub struct LocationsPhase;

impl Phase for LocationsPhase {
    fn name(&self) -> &'static str {
        "locations"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["exif"]
    }

    fn process_one(&self, _config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let rows = store.signal_rows("exif", image_id)?;
        let exif: crate::exif_data::ExifFields = rows
            .first()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let row = match (exif.gps_latitude, exif.gps_longitude) {
            (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
                ImageLocation {
                    image_id: image_id.to_string(),
                    lat,
                    lon,
                    source: "exif".to_string(),
                    confidence: 1.0,
                    accepted: true,
                }
            }
            _ => ImageLocation {
                image_id: image_id.to_string(),
                lat: 0.0,
                lon: 0.0,
                source: "none".to_string(),
                confidence: 0.0,
                accepted: false,
            },
        };
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Image;
    use image::RgbImage;
    use std::sync::atomic::AtomicBool;

    fn setup(id: &str) -> (tempfile::TempDir, Config, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        let tier_dir = config.rendered_dir().join("thumb").join("jpeg");
        std::fs::create_dir_all(&tier_dir).unwrap();
        let tier_dir2 = config.rendered_dir().join("display").join("jpeg");
        std::fs::create_dir_all(&tier_dir2).unwrap();

        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([((x * 4) % 256) as u8, ((y * 4) % 256) as u8, 120])
        }));
        image.save(tier_dir.join(format!("{id}.jpg"))).unwrap();
        image.save(tier_dir2.join(format!("{id}.jpg"))).unwrap();

        let store = Store::open_in_memory().unwrap();
        store
            .upsert_image(&Image {
                id: id.to_string(),
                source_path: format!("{id}.jpg"),
                file_name: "a.jpg".to_string(),
                category: "Test".to_string(),
                subcategory: "Mini".to_string(),
                source_format: "jpg".to_string(),
                width: 64,
                height: 64,
                aspect_ratio: 1.0,
                orientation: crate::types::Orientation::Square,
                source_bytes: 10,
                exif_blob: None,
                camera_body: None,
                medium: crate::types::Medium::Digital,
                film_stock: None,
                monochrome: false,
                curation_status: crate::types::CurationStatus::Pending,
                content_hash: "x".to_string(),
                created_at: "now".to_string(),
                updated_at: "now".to_string(),
            })
            .unwrap();
        (dir, config, store)
    }

    #[test]
    fn test_hashes_phase_writes_row() {
        let (_dir, config, store) = setup("id-1");
        let interrupted = AtomicBool::new(false);
        let report = crate::phase::run_phase(&HashesPhase, &config, &store, Default::default(), &interrupted).unwrap();
        assert_eq!(report.processed, 1);
        assert!(store.has_signal("hashes", "id-1").unwrap());
    }

    #[test]
    fn test_dominant_colors_percentages_sum_to_100() {
        let (_dir, config, store) = setup("id-1");
        DominantColorsPhase.process_one(&config, &store, "id-1").unwrap();
        let rows = store.signal_rows("dominant-colors", "id-1").unwrap();
        let sum: f32 = rows
            .iter()
            .map(|r| r.get("percentage").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32)
            .sum();
        assert!((sum - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_pixel_analysis_writes_row() {
        let (_dir, config, store) = setup("id-1");
        PixelAnalysisPhase.process_one(&config, &store, "id-1").unwrap();
        assert!(store.has_signal("pixel-analysis", "id-1").unwrap());
    }

    #[test]
    fn test_borders_percentages_within_bounds() {
        let (_dir, config, store) = setup("id-1");
        BordersPhase.process_one(&config, &store, "id-1").unwrap();
        let rows = store.signal_rows("borders", "id-1").unwrap();
        let top = rows[0].get("top_pct").and_then(|v| v.as_f64()).unwrap();
        assert!((0.0..=100.0).contains(&top));
    }

    #[test]
    fn test_locations_defaults_unaccepted_without_gps() {
        let (_dir, config, store) = setup("id-1");
        ExifPhase.process_one(&config, &store, "id-1").unwrap();
        LocationsPhase.process_one(&config, &store, "id-1").unwrap();
        let rows = store.signal_rows("locations", "id-1").unwrap();
        assert_eq!(rows[0].get("accepted").and_then(|v| v.as_bool()), Some(false));
    }
}
