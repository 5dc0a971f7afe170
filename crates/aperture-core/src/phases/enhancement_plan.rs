//! §4.6 Enhancement Planner (C6): turns measured `pixel-analysis` metrics
//! plus a camera profile into a six-step recipe. Plans live in their own
//! `enhancement_plans` table (not the generic signal framework) since
//! they carry a status lifecycle (`planned` -> `enhanced`/`failed` ->
//! `accepted`) that `run_phase` doesn't model.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::PhaseError;
use crate::phase::RunReport;
use crate::store::Store;
use crate::types::{ImageAnalysis, PlanStatus, RecipeStep};

const PLAN_VERSION: u8 = 1;

pub fn plan_enhancement(config: &Config, store: &Store, force: bool, interrupted: &AtomicBool) -> Result<RunReport, PhaseError> {
    let ids = store.all_image_ids()?;
    let mut processed = 0u64;
    let mut failed = 0u64;

    for id in &ids {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        if !force && store.plan_status(id, PLAN_VERSION)?.is_some() {
            continue;
        }
        match plan_one(config, store, id) {
            Ok(()) => processed += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(image_id = %id, error = %e, "enhancement plan failed");
            }
        }
    }

    Ok(RunReport { processed, failed })
}

fn plan_one(config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
    let image = store
        .get_image(image_id)?
        .ok_or_else(|| PhaseError::new(format!("image {image_id} not found")))?;
    let metrics_rows = store.signal_rows("pixel-analysis", image_id)?;
    let metrics: ImageAnalysis = metrics_rows
        .first()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .ok_or_else(|| PhaseError::new(format!("no pixel-analysis row for {image_id}")))?;

    let profile = config.camera_profiles.get(image.camera_body.as_deref().unwrap_or("default"));
    let steps = compute_steps(&metrics, &profile, image.monochrome);

    let pre_metrics_json = serde_json::to_string(&metrics).map_err(|e| PhaseError::new(e.to_string()))?;
    let steps_json = [
        serde_json::to_string(&steps[0]).map_err(|e| PhaseError::new(e.to_string()))?,
        serde_json::to_string(&steps[1]).map_err(|e| PhaseError::new(e.to_string()))?,
        serde_json::to_string(&steps[2]).map_err(|e| PhaseError::new(e.to_string()))?,
        serde_json::to_string(&steps[3]).map_err(|e| PhaseError::new(e.to_string()))?,
        serde_json::to_string(&steps[4]).map_err(|e| PhaseError::new(e.to_string()))?,
        serde_json::to_string(&steps[5]).map_err(|e| PhaseError::new(e.to_string()))?,
    ];

    store.upsert_plan_raw(
        image_id,
        PLAN_VERSION,
        &pre_metrics_json,
        [&steps_json[0], &steps_json[1], &steps_json[2], &steps_json[3], &steps_json[4], &steps_json[5]],
        plan_status_str(PlanStatus::Planned),
    )?;
    Ok(())
}

/// Computes the six §4.6 recipe steps from measured metrics and a camera
/// profile. Pure function: no store/config I/O, so it's directly testable
/// against the documented bucket/threshold tables.
fn compute_steps(metrics: &ImageAnalysis, profile: &crate::config::CameraProfile, monochrome: bool) -> [RecipeStep; 6] {
    let is_mono = profile.is_mono || monochrome;

    let white_balance = if is_mono || (metrics.wb_shift_r.abs() < 0.02 && metrics.wb_shift_b.abs() < 0.02) {
        RecipeStep {
            skipped: true,
            params: Default::default(),
            reason: if is_mono {
                "monochrome camera profile".to_string()
            } else {
                "negligible white-balance shift".to_string()
            },
        }
    } else {
        let strength = profile.wb_strength as f64;
        let mut params = std::collections::BTreeMap::new();
        let r_gain = (1.0 - metrics.wb_shift_r as f64 * strength).clamp(0.80, 1.25);
        let b_gain = (1.0 - metrics.wb_shift_b as f64 * strength).clamp(0.80, 1.25);
        params.insert("r_gain".to_string(), r_gain);
        params.insert("b_gain".to_string(), b_gain);
        RecipeStep {
            skipped: false,
            params,
            reason: format!("{} color cast corrected", metrics.color_cast),
        }
    };

    const TARGET_BRIGHTNESS: f32 = 110.0;
    let exposure = if metrics.low_key || metrics.high_key {
        RecipeStep {
            skipped: true,
            params: Default::default(),
            reason: if metrics.low_key { "intentional low-key".to_string() } else { "intentional high-key".to_string() },
        }
    } else {
        let exposure_delta = (TARGET_BRIGHTNESS - metrics.mean_brightness) / TARGET_BRIGHTNESS;
        let mut params = std::collections::BTreeMap::new();
        let gamma = (1.0 + exposure_delta as f64 * profile.exp_strength as f64).clamp(0.70, 1.30);
        params.insert("gamma".to_string(), gamma);
        RecipeStep {
            skipped: false,
            params,
            reason: if exposure_delta > 0.0 {
                format!("underexposed ({:.0})", metrics.mean_brightness)
            } else {
                format!("overexposed ({:.0})", metrics.mean_brightness)
            },
        }
    };

    let shadow_excess = (metrics.clip_low_pct - profile.shadow_thr).max(0.0);
    let highlight_excess = (metrics.clip_high_pct - profile.highlight_thr).max(0.0);
    let shadow_highlight = if shadow_excess <= 0.0 && highlight_excess <= 0.0 {
        RecipeStep {
            skipped: true,
            params: Default::default(),
            reason: "clipping within tolerance".to_string(),
        }
    } else {
        let mut params = std::collections::BTreeMap::new();
        let shadow_lift = (shadow_excess as f64 * 0.03).min(0.45);
        let highlight_pull = (highlight_excess as f64 * 0.02).min(0.35);
        params.insert("shadow_lift".to_string(), shadow_lift);
        params.insert("highlight_pull".to_string(), highlight_pull);
        let mut reason = String::new();
        if shadow_excess > 0.0 {
            reason.push_str(&format!("shadow clip {:.1}%", metrics.clip_low_pct));
        }
        if highlight_excess > 0.0 {
            if !reason.is_empty() {
                reason.push_str("; ");
            }
            reason.push_str(&format!("highlight clip {:.1}%", metrics.clip_high_pct));
        }
        RecipeStep { skipped: false, params, reason }
    };

    let contrast_base: f64 = if metrics.contrast_ratio < 0.55 {
        0.6
    } else if metrics.contrast_ratio < 0.75 {
        0.4
    } else if metrics.contrast_ratio < 0.92 {
        0.15
    } else {
        0.0
    };
    let contrast_strength = contrast_base.clamp(0.0, 0.8);
    let contrast = if contrast_strength <= 0.02 {
        RecipeStep {
            skipped: true,
            params: Default::default(),
            reason: format!("contrast adequate ({:.2})", metrics.contrast_ratio),
        }
    } else {
        let mut params = std::collections::BTreeMap::new();
        params.insert("strength".to_string(), contrast_strength);
        RecipeStep {
            skipped: false,
            params,
            reason: format!("flat tonal range ({:.2})", metrics.contrast_ratio),
        }
    };

    let saturation = if is_mono {
        RecipeStep {
            skipped: true,
            params: Default::default(),
            reason: "monochrome camera profile".to_string(),
        }
    } else {
        let sat_cap = profile.sat_cap as f64;
        let base_sat: f64 = if metrics.mean_saturation < 0.15 {
            sat_cap.min(1.15)
        } else if metrics.mean_saturation > 0.50 {
            0.95
        } else if metrics.mean_saturation < 0.25 {
            sat_cap.min(1.08)
        } else {
            1.0
        };
        let scale = base_sat.clamp(0.85, 1.30);
        if (scale - 1.0).abs() < 0.02 {
            RecipeStep {
                skipped: true,
                params: Default::default(),
                reason: format!("saturation OK ({:.2})", metrics.mean_saturation),
            }
        } else {
            let mut params = std::collections::BTreeMap::new();
            params.insert("scale".to_string(), scale);
            RecipeStep {
                skipped: false,
                params,
                reason: format!("saturation boosted toward target ({:.2})", metrics.mean_saturation),
            }
        }
    };

    let (radius, percent, threshold, sharpen_reason): (f64, f64, f64, &str) = if profile.preserve_grain {
        (0.8, 40.0, 5.0, "film grain")
    } else if is_mono {
        (1.3, 70.0, 2.0, "monochrome crisp")
    } else if metrics.noise_estimate < 2.0 {
        (1.5, 80.0, 2.0, "clean digital")
    } else if metrics.noise_estimate < 3.0 {
        (1.2, 60.0, 3.0, "noisy")
    } else {
        (0.8, 40.0, 5.0, "high noise")
    };
    let sharpening = {
        let mut params = std::collections::BTreeMap::new();
        params.insert("radius".to_string(), radius);
        params.insert("percent".to_string(), percent.clamp(20.0, 150.0));
        params.insert("threshold".to_string(), threshold);
        RecipeStep {
            skipped: false,
            params,
            reason: format!("{sharpen_reason} (noise={:.1})", metrics.noise_estimate),
        }
    };

    [white_balance, exposure, shadow_highlight, contrast, saturation, sharpening]
}

fn plan_status_str(status: PlanStatus) -> &'static str {
    match status {
        PlanStatus::Planned => "planned",
        PlanStatus::Enhanced => "enhanced",
        PlanStatus::Accepted => "accepted",
        PlanStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraProfile;
    use crate::types::Image;
    use std::sync::atomic::AtomicBool;

    fn image(id: &str) -> Image {
        Image {
            id: id.to_string(),
            source_path: format!("{id}.jpg"),
            file_name: "a.jpg".to_string(),
            category: "Test".to_string(),
            subcategory: "Mini".to_string(),
            source_format: "jpg".to_string(),
            width: 100,
            height: 100,
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

    fn metrics_row(id: &str) -> serde_json::Value {
        serde_json::to_value(ImageAnalysis {
            image_id: id.to_string(),
            mean_brightness: 60.0,
            contrast_ratio: 5.0,
            mean_r: 50.0,
            mean_g: 55.0,
            mean_b: 90.0,
            wb_shift_r: -0.05,
            wb_shift_b: 0.08,
            noise_estimate: 2.0,
            clip_low_pct: 1.0,
            clip_high_pct: 0.5,
            mean_saturation: 0.3,
            dominant_hue: 200.0,
            color_cast: "cool".to_string(),
            low_key: true,
            high_key: false,
            analyzed_at: "now".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_plan_is_idempotent_without_force() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&image("id-1")).unwrap();
        store.upsert_signal("pixel-analysis", "id-1", &[metrics_row("id-1")]).unwrap();
        let config = Config::default();
        let interrupted = AtomicBool::new(false);

        let r1 = plan_enhancement(&config, &store, false, &interrupted).unwrap();
        assert_eq!(r1.processed, 1);
        let r2 = plan_enhancement(&config, &store, false, &interrupted).unwrap();
        assert_eq!(r2.processed, 0);

        assert_eq!(store.plan_status("id-1", PLAN_VERSION).unwrap().as_deref(), Some("planned"));
    }

    #[test]
    fn test_plan_corrects_cool_cast() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&image("id-1")).unwrap();
        store.upsert_signal("pixel-analysis", "id-1", &[metrics_row("id-1")]).unwrap();
        let config = Config::default();
        plan_one(&config, &store, "id-1").unwrap();
    }

    fn metrics(mutate: impl FnOnce(&mut ImageAnalysis)) -> ImageAnalysis {
        let mut m = ImageAnalysis {
            image_id: "id".to_string(),
            mean_brightness: 110.0,
            contrast_ratio: 0.92,
            mean_r: 100.0,
            mean_g: 100.0,
            mean_b: 100.0,
            wb_shift_r: 0.0,
            wb_shift_b: 0.0,
            noise_estimate: 1.0,
            clip_low_pct: 0.0,
            clip_high_pct: 0.0,
            mean_saturation: 0.3,
            dominant_hue: 0.0,
            color_cast: "neutral".to_string(),
            low_key: false,
            high_key: false,
            analyzed_at: "now".to_string(),
        };
        mutate(&mut m);
        m
    }

    #[test]
    fn test_white_balance_skips_on_negligible_shift_even_with_non_neutral_label() {
        let metrics = metrics(|m| {
            m.wb_shift_r = 0.01;
            m.wb_shift_b = -0.01;
            m.color_cast = "cool".to_string();
        });
        let steps = compute_steps(&metrics, &CameraProfile::default(), false);
        assert!(steps[0].skipped);
    }

    #[test]
    fn test_white_balance_skips_for_monochrome_image_regardless_of_color_cast() {
        let metrics = metrics(|m| {
            m.wb_shift_r = 0.2;
            m.wb_shift_b = -0.2;
            m.color_cast = "warm".to_string();
        });
        let steps = compute_steps(&metrics, &CameraProfile::default(), true);
        assert!(steps[0].skipped);
    }

    #[test]
    fn test_white_balance_gain_is_clamped_to_valid_range() {
        let metrics = metrics(|m| {
            m.wb_shift_r = -5.0;
            m.wb_shift_b = 5.0;
            m.color_cast = "cool".to_string();
        });
        let steps = compute_steps(&metrics, &CameraProfile::default(), false);
        assert!(!steps[0].skipped);
        assert_eq!(steps[0].params["r_gain"], 1.25);
        assert_eq!(steps[0].params["b_gain"], 0.80);
    }

    #[test]
    fn test_exposure_skips_on_low_key() {
        let metrics = metrics(|m| {
            m.mean_brightness = 20.0;
            m.low_key = true;
        });
        let steps = compute_steps(&metrics, &CameraProfile::default(), false);
        assert!(steps[1].skipped);
    }

    #[test]
    fn test_exposure_gamma_clamped_to_documented_range() {
        let metrics = metrics(|m| m.mean_brightness = 0.0);
        let steps = compute_steps(&metrics, &CameraProfile::default(), false);
        assert!(!steps[1].skipped);
        assert_eq!(steps[1].params["gamma"], 1.30);
    }

    #[test]
    fn test_shadow_highlight_uses_excess_over_threshold() {
        let profile = CameraProfile {
            shadow_thr: 8.0,
            highlight_thr: 3.0,
            ..CameraProfile::default()
        };
        let metrics = metrics(|m| m.clip_low_pct = 18.0);
        let steps = compute_steps(&metrics, &profile, false);
        assert!(!steps[2].skipped);
        assert_eq!(steps[2].params["shadow_lift"], (10.0f64 * 0.03).min(0.45));
    }

    #[test]
    fn test_contrast_bucket_table() {
        let low = metrics(|m| m.contrast_ratio = 0.5);
        let steps = compute_steps(&low, &CameraProfile::default(), false);
        assert_eq!(steps[3].params["strength"], 0.6);

        let adequate = metrics(|m| m.contrast_ratio = 0.95);
        let steps = compute_steps(&adequate, &CameraProfile::default(), false);
        assert!(steps[3].skipped);
    }

    #[test]
    fn test_saturation_clamp_floor_is_085() {
        let profile = CameraProfile { sat_cap: 1.15, ..CameraProfile::default() };
        let metrics = metrics(|m| m.mean_saturation = 0.7);
        let steps = compute_steps(&metrics, &profile, false);
        assert!(!steps[4].skipped);
        assert_eq!(steps[4].params["scale"], 0.95);
    }

    #[test]
    fn test_sharpening_picks_noise_bucket_tuple() {
        let metrics = metrics(|m| m.noise_estimate = 2.5);
        let steps = compute_steps(&metrics, &CameraProfile::default(), false);
        assert_eq!(steps[5].params["radius"], 1.2);
        assert_eq!(steps[5].params["percent"], 60.0);
        assert_eq!(steps[5].params["threshold"], 3.0);
    }

    #[test]
    fn test_sharpening_picks_film_grain_tuple_when_preserve_grain() {
        let profile = CameraProfile { preserve_grain: true, ..CameraProfile::default() };
        let metrics = metrics(|m| m.noise_estimate = 1.0);
        let steps = compute_steps(&metrics, &profile, false);
        assert_eq!(steps[5].params["radius"], 0.8);
        assert_eq!(steps[5].params["percent"], 40.0);
    }
}
