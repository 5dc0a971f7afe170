//! Bootstrap steps (§4.3 Scanner, §4.4 Tier Renderer) that populate the
//! `images`/`tiers` tables the rest of the phase framework discovers work
//! from. These run before any signal phase and don't fit
//! `Store::discover_missing` (there is no prerequisite signal to gate on).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::{PhaseError, RenderError, ScannerError};
use crate::exif_data;
use crate::hashing;
use crate::identity::identify;
use crate::phase::RunReport;
use crate::render::{decode_source, render_tiers};
use crate::scanner::scan;
use crate::store::Store;
use crate::types::{CurationStatus, Image, Medium, Orientation, SourceKind, Tier};

impl From<ScannerError> for PhaseError {
    fn from(e: ScannerError) -> Self {
        PhaseError::new(e.to_string())
    }
}

/// Scan the originals root and upsert one `Image` row per source file
/// (§4.1/§4.3). Idempotent: re-running only touches files not already
/// registered, unless `force`.
pub fn register(config: &Config, store: &Store, force: bool, interrupted: &AtomicBool) -> Result<RunReport, PhaseError> {
    let items = scan(&config.originals_dir())?;
    let mut processed = 0u64;
    let mut failed = 0u64;

    for item in &items {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let id = identify(&item.relative_path);
        if !force && store.image_exists(&id)? {
            continue;
        }

        match register_one(config, &id, item) {
            Ok(image) => {
                store.upsert_image(&image)?;
                processed += 1;
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(image_id = %id, path = %item.relative_path, error = %e, "register failed");
            }
        }
    }

    Ok(RunReport { processed, failed })
}

fn register_one(_config: &Config, id: &str, item: &crate::scanner::ScannedItem) -> Result<Image, PhaseError> {
    let bytes = std::fs::metadata(&item.absolute_path).map(|m| m.len()).unwrap_or(0);
    let content_hash = hashing::content_hash(&item.absolute_path).map_err(|e| PhaseError::new(e.to_string()))?;

    let decoded = decode_source(&item.absolute_path, item.kind)?;
    let (width, height) = (decoded.image.width(), decoded.image.height());

    let exif = exif_data::extract(&item.absolute_path);
    let exif_blob = exif.as_ref().and_then(|e| serde_json::to_string(e).ok());
    let camera_body = exif.as_ref().and_then(|e| e.camera_model.clone());

    let medium = match item.kind {
        SourceKind::Raw => Medium::Analog,
        SourceKind::Encoded => Medium::Digital,
    };

    let now = crate::store::now();
    Ok(Image {
        id: id.to_string(),
        source_path: item.relative_path.clone(),
        file_name: item
            .absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        category: item.category.clone(),
        subcategory: item.subcategory.clone(),
        source_format: item
            .absolute_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
        width,
        height,
        aspect_ratio: width as f64 / height.max(1) as f64,
        orientation: Orientation::from_dimensions(width, height),
        source_bytes: bytes,
        exif_blob,
        camera_body,
        medium,
        film_stock: None,
        monochrome: false,
        curation_status: CurationStatus::Pending,
        content_hash,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Render every configured tier for every registered image (§4.4).
/// Idempotent by construction: `render_tiers` skips existing files unless
/// `force`, and this loop skips images whose tiers already exist in the
/// store unless `force`.
pub fn render(config: &Config, store: &Store, force: bool, interrupted: &AtomicBool) -> Result<RunReport, PhaseError> {
    let ids = store.all_image_ids()?;
    let mut processed = 0u64;
    let mut failed = 0u64;

    for id in &ids {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        if !force && !store.tiers_for_image(id)?.is_empty() {
            continue;
        }
        match render_one(config, store, id, force) {
            Ok(()) => processed += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(image_id = %id, error = %e, "render failed");
            }
        }
    }

    Ok(RunReport { processed, failed })
}

fn render_one(config: &Config, store: &Store, id: &str, force: bool) -> Result<(), PhaseError> {
    let image = store
        .get_image(id)?
        .ok_or_else(|| PhaseError::new(format!("image {id} not registered")))?;
    let source_path = config.originals_dir().join(&image.source_path);
    let kind = if matches!(image.medium, Medium::Analog) {
        SourceKind::Raw
    } else {
        SourceKind::Encoded
    };
    let decoded = decode_source(&source_path, kind)?;

    let tiers = render_tiers(config, id, &decoded.image, &config.tiers.originals, force)
        .map_err(|e: RenderError| PhaseError::new(e.to_string()))?;

    for t in tiers {
        store.upsert_tier(&Tier {
            image_id: id.to_string(),
            variant_id: None,
            tier_name: t.tier_name,
            format: t.format,
            local_path: t.path.to_string_lossy().to_string(),
            remote_url: None,
            public_url: None,
            width: t.width,
            height: t.height,
            bytes: t.bytes,
            uploaded_at: None,
        })?;
    }
    Ok(())
}

/// `core fix-blobs` (§8 scenario 6, §9 "Binary corruption bug"): a one-time
/// migration over the `quality` signal table, not a discover/process phase
/// — every row is a candidate regardless of prior runs, so `force` and
/// `interrupted` are accepted only to match the orchestrator's step shape.
pub fn fix_blobs(_config: &Config, store: &Store, _force: bool, _interrupted: &AtomicBool) -> Result<RunReport, PhaseError> {
    let (scanned, repaired) = store.fix_blobs()?;
    tracing::info!(scanned, repaired, "fix-blobs migration complete");
    Ok(RunReport { processed: scanned, failed: 0 })
}
