//! Enhancer (C7): executes an `EnhancementPlan`'s six steps against the
//! display-tier pixel buffer and writes the result to `enhanced/jpeg/<id>.jpg`
//! (§4.7).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, RgbImage};

use crate::config::Config;
use crate::error::PhaseError;
use crate::math::{rgb_to_hsv, hsv_to_rgb};
use crate::phase::{load_tier_image, RunReport};
use crate::render::{encode_tier, unsharp_mask};
use crate::store::Store;
use crate::types::{EnhancementPlan, PlanStatus};

const ENHANCED_VERSION: u8 = 1;

pub fn enhance(config: &Config, store: &Store, force: bool, interrupted: &AtomicBool) -> Result<RunReport, PhaseError> {
    let ids = store.all_image_ids()?;
    let mut processed = 0u64;
    let mut failed = 0u64;

    for id in &ids {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let Some(plan) = store.load_plan(id, ENHANCED_VERSION)? else {
            continue;
        };
        if !force && matches!(plan.status, PlanStatus::Enhanced | PlanStatus::Accepted) {
            continue;
        }

        match enhance_one(config, id, &plan) {
            Ok((path, post)) => {
                let post_json = serde_json::to_string(&post).map_err(|e| PhaseError::new(e.to_string()))?;
                store.update_plan_status(id, ENHANCED_VERSION, "enhanced", Some(&path), Some(&post_json), None)?;
                processed += 1;
            }
            Err(e) => {
                store.update_plan_status(id, ENHANCED_VERSION, "failed", None, None, Some(&e.to_string()))?;
                failed += 1;
                tracing::warn!(image_id = %id, error = %e, "enhance failed");
            }
        }
    }

    Ok(RunReport { processed, failed })
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PostMetrics {
    post_brightness: f32,
    post_wb_shift_r: f32,
    post_contrast: f32,
}

fn enhance_one(config: &Config, image_id: &str, plan: &EnhancementPlan) -> Result<(String, PostMetrics), PhaseError> {
    let image = load_tier_image(config, image_id, "display")?;
    let mut buf = image.to_rgb8();

    apply_white_balance(&mut buf, plan);
    apply_exposure(&mut buf, plan);
    apply_shadow_highlight(&mut buf, plan);
    apply_contrast(&mut buf, plan);
    apply_saturation(&mut buf, plan);
    let buf = apply_sharpening(buf, plan);

    let post = post_metrics(&buf);

    let dynamic = DynamicImage::ImageRgb8(buf);
    let bytes = encode_tier(&dynamic, "jpeg", 92, false).map_err(|e| PhaseError::new(e.to_string()))?;

    let dir = config.rendered_dir().join("enhanced").join("jpeg");
    std::fs::create_dir_all(&dir).map_err(|e| PhaseError::new(e.to_string()))?;
    let final_path: PathBuf = dir.join(format!("{image_id}.jpg"));
    let tmp_path = final_path.with_file_name(format!(".{image_id}.jpg.tmp"));
    std::fs::write(&tmp_path, &bytes).map_err(|e| PhaseError::new(e.to_string()))?;
    std::fs::rename(&tmp_path, &final_path).map_err(|e| PhaseError::new(e.to_string()))?;

    Ok((final_path.to_string_lossy().to_string(), post))
}

fn apply_white_balance(buf: &mut RgbImage, plan: &EnhancementPlan) {
    if plan.white_balance.skipped {
        return;
    }
    let r_gain = *plan.white_balance.params.get("r_gain").unwrap_or(&1.0) as f32;
    let b_gain = *plan.white_balance.params.get("b_gain").unwrap_or(&1.0) as f32;
    for px in buf.pixels_mut() {
        px[0] = (px[0] as f32 * r_gain).clamp(0.0, 255.0) as u8;
        px[2] = (px[2] as f32 * b_gain).clamp(0.0, 255.0) as u8;
    }
}

fn apply_exposure(buf: &mut RgbImage, plan: &EnhancementPlan) {
    if plan.exposure.skipped {
        return;
    }
    let gamma = *plan.exposure.params.get("gamma").unwrap_or(&1.0) as f32;
    for px in buf.pixels_mut() {
        for c in 0..3 {
            let v = (px[c] as f32 / 255.0).powf(gamma) * 255.0;
            px[c] = v.clamp(0.0, 255.0) as u8;
        }
    }
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn apply_shadow_highlight(buf: &mut RgbImage, plan: &EnhancementPlan) {
    if plan.shadow_highlight.skipped {
        return;
    }
    let lift = *plan.shadow_highlight.params.get("shadow_lift").unwrap_or(&0.0) as f32;
    let pull = *plan.shadow_highlight.params.get("highlight_pull").unwrap_or(&0.0) as f32;
    for px in buf.pixels_mut() {
        let y = luma(px[0], px[1], px[2]);
        if y < 64.0 && lift > 0.0 {
            let factor = lift * (64.0 - y) / 64.0;
            for c in 0..3 {
                px[c] = (px[c] as f32 * (1.0 + factor)).clamp(0.0, 255.0) as u8;
            }
        } else if y > 220.0 && pull > 0.0 {
            let factor = pull * (y - 220.0) / 35.0;
            for c in 0..3 {
                px[c] = (px[c] as f32 * (1.0 - factor)).clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn apply_contrast(buf: &mut RgbImage, plan: &EnhancementPlan) {
    if plan.contrast.skipped {
        return;
    }
    let strength = *plan.contrast.params.get("strength").unwrap_or(&0.0) as f32;
    for px in buf.pixels_mut() {
        let y = luma(px[0], px[1], px[2]).max(1.0);
        let y_prime = y + strength * 0.15 * (std::f32::consts::PI * y / 255.0 * 2.0).sin() / (2.0 * std::f32::consts::PI);
        let ratio = (y_prime / y).clamp(0.5, 2.0);
        for c in 0..3 {
            px[c] = (px[c] as f32 * ratio).clamp(0.0, 255.0) as u8;
        }
    }
}

fn apply_saturation(buf: &mut RgbImage, plan: &EnhancementPlan) {
    if plan.saturation.skipped {
        return;
    }
    let scale = *plan.saturation.params.get("scale").unwrap_or(&1.0) as f32;
    for px in buf.pixels_mut() {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let (r, g, b) = hsv_to_rgb(h, (s * scale).clamp(0.0, 1.0), v);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

fn apply_sharpening(buf: RgbImage, plan: &EnhancementPlan) -> RgbImage {
    if plan.sharpening.skipped {
        return buf;
    }
    let amount = *plan.sharpening.params.get("amount").unwrap_or(&40.0) as f32;
    let radius = *plan.sharpening.params.get("radius").unwrap_or(&0.6) as f32;
    let dynamic = DynamicImage::ImageRgb8(buf);
    let sharpened = unsharp_mask(&dynamic, radius, amount, 0);
    sharpened.to_rgb8()
}

fn post_metrics(buf: &RgbImage) -> PostMetrics {
    let (w, h) = buf.dimensions();
    let n = (w * h).max(1) as f32;
    let mut sum_y = 0f32;
    let mut sum_r = 0f32;
    for px in buf.pixels() {
        sum_y += luma(px[0], px[1], px[2]);
        sum_r += px[0] as f32;
    }
    let mean_brightness = sum_y / n;
    let mean_r = sum_r / n;

    let mut variance = 0f32;
    for px in buf.pixels() {
        let y = luma(px[0], px[1], px[2]);
        variance += (y - mean_brightness).powi(2);
    }
    let std_dev = (variance / n).sqrt();

    PostMetrics {
        post_brightness: mean_brightness,
        post_wb_shift_r: (mean_r - mean_brightness) / 255.0,
        post_contrast: std_dev / 255.0 * 10.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Image, RecipeStep};
    use std::collections::BTreeMap;

    fn image_row(id: &str) -> Image {
        Image {
            id: id.to_string(),
            source_path: format!("{id}.jpg"),
            file_name: "a.jpg".to_string(),
            category: "Test".to_string(),
            subcategory: "Mini".to_string(),
            source_format: "jpg".to_string(),
            width: 8,
            height: 8,
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
        }
    }

    fn plan(id: &str) -> EnhancementPlan {
        let mut wb_params = BTreeMap::new();
        wb_params.insert("r_gain".to_string(), 0.9);
        wb_params.insert("b_gain".to_string(), 1.1);
        EnhancementPlan {
            image_id: id.to_string(),
            version: ENHANCED_VERSION,
            pre_metrics_json: "{}".to_string(),
            white_balance: RecipeStep { skipped: false, params: wb_params, reason: "cool".to_string() },
            exposure: RecipeStep::default(),
            shadow_highlight: RecipeStep::default(),
            contrast: RecipeStep::default(),
            saturation: RecipeStep::default(),
            sharpening: RecipeStep::default(),
            output_path: None,
            post_metrics_json: None,
            status: PlanStatus::Planned,
            error: None,
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    fn setup(id: &str) -> (tempfile::TempDir, Config, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        let display_dir = config.rendered_dir().join("display").join("jpeg");
        std::fs::create_dir_all(&display_dir).unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 20) as u8, (y * 20) as u8, 100])));
        img.save(display_dir.join(format!("{id}.jpg"))).unwrap();

        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&image_row(id)).unwrap();
        (dir, config, store)
    }

    #[test]
    fn test_enhance_writes_output_and_updates_status() {
        let (_dir, config, store) = setup("id-1");
        store
            .upsert_plan_raw(
                "id-1",
                ENHANCED_VERSION,
                "{}",
                ["{\"skipped\":false,\"params\":{\"r_gain\":0.9,\"b_gain\":1.1},\"reason\":\"cool\"}",
                 "{\"skipped\":true,\"params\":{},\"reason\":\"\"}",
                 "{\"skipped\":true,\"params\":{},\"reason\":\"\"}",
                 "{\"skipped\":true,\"params\":{},\"reason\":\"\"}",
                 "{\"skipped\":true,\"params\":{},\"reason\":\"\"}",
                 "{\"skipped\":true,\"params\":{},\"reason\":\"\"}"],
                "planned",
            )
            .unwrap();

        let interrupted = AtomicBool::new(false);
        let report = enhance(&config, &store, false, &interrupted).unwrap();
        assert_eq!(report.processed, 1);

        let loaded = store.load_plan("id-1", ENHANCED_VERSION).unwrap().unwrap();
        assert!(matches!(loaded.status, PlanStatus::Enhanced));
        assert!(loaded.output_path.is_some());
        assert!(std::path::Path::new(loaded.output_path.as_ref().unwrap()).exists());
    }

    #[test]
    fn test_enhance_one_applies_white_balance() {
        let (_dir, config, _store) = setup("id-2");
        let p = plan("id-2");
        let (path, _post) = enhance_one(&config, "id-2", &p).unwrap();
        assert!(std::path::Path::new(&path).exists());
    }
}
