//! Signal Phase Framework (C5): the common discover/process/commit/report
//! contract every enrichment phase shares.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::Config;
use crate::error::PhaseError;
use crate::store::Store;
use crate::types::RunStatus;

/// Sharding + scope parameters shared by every phase invocation (§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub shard: Option<(u64, u64)>,
    pub limit: Option<usize>,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    pub processed: u64,
    pub failed: u64,
}

/// A named unit of enrichment work (§4.5).
///
/// Implementors supply only the per-image step; `run_phase` supplies
/// discovery, sharding, progress reporting, and Store commits.
pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    /// Signal table this phase reads/writes; defaults to `name()`.
    fn table_name(&self) -> &'static str {
        self.name()
    }

    /// Prerequisite signal tables that must already have a row for an
    /// image before this phase will discover it.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Emit a progress line every this-many items (50-500, §4.5).
    fn progress_interval(&self) -> usize {
        100
    }

    /// Process one image, writing its row(s) to the store before
    /// returning. Errors are per-item and never abort the phase.
    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError>;
}

/// Run `phase` to completion (or until `interrupted` flips), honoring
/// sharding/limit/force, and logging progress + a final `PhaseRun` row.
pub fn run_phase(
    phase: &dyn Phase,
    config: &Config,
    store: &Store,
    opts: RunOptions,
    interrupted: &AtomicBool,
) -> Result<RunReport, PhaseError> {
    let ids = store.discover_missing(phase.table_name(), phase.requires(), opts.shard, opts.limit, opts.force)?;
    let total = ids.len();
    let run_id = store.start_run(phase.name(), None)?;

    let mut processed = 0u64;
    let mut failed = 0u64;
    let start = Instant::now();

    for (i, id) in ids.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        match phase.process_one(config, store, id) {
            Ok(()) => processed += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(phase = phase.name(), image_id = %id, error = %e, "phase item failed");
            }
        }

        let done = i + 1;
        if done % phase.progress_interval() == 0 || done == total {
            let elapsed = start.elapsed().as_secs_f64().max(0.001);
            let rate = done as f64 / elapsed;
            let remaining = total.saturating_sub(done);
            let eta = if rate > 0.0 { remaining as f64 / rate } else { 0.0 };
            tracing::info!(
                phase = phase.name(),
                "{done}/{total} ({rate:.1}/s, ~{eta:.0}s)"
            );
        }
    }

    let status = if interrupted.load(Ordering::SeqCst) && processed + failed < total as u64 {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    store.finish_run(run_id, processed, failed, status, None)?;

    Ok(RunReport { processed, failed })
}

/// Load a rendered tier image for an image id (§6 filesystem layout:
/// `<root>/rendered/<tier>/jpeg/<id>.jpg`).
pub fn load_tier_image(config: &Config, image_id: &str, tier: &str) -> Result<image::DynamicImage, PhaseError> {
    let path = config.rendered_dir().join(tier).join("jpeg").join(format!("{image_id}.jpg"));
    image::open(&path).map_err(|e| PhaseError {
        reason: format!("failed to load {tier} tier for {image_id}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Image;
    use std::sync::atomic::AtomicBool;

    struct CountingPhase;
    impl Phase for CountingPhase {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn process_one(&self, _config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
            store.upsert_signal("counting", image_id, &[serde_json::json!({"ok": true})])?;
            Ok(())
        }
    }

    fn image(id: &str) -> Image {
        crate::types::Image {
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

    #[test]
    fn test_run_phase_processes_all_and_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store.upsert_image(&image(&format!("id-{i}"))).unwrap();
        }
        let config = Config::default();
        let interrupted = AtomicBool::new(false);
        let report = run_phase(&CountingPhase, &config, &store, RunOptions::default(), &interrupted).unwrap();
        assert_eq!(report.processed, 5);
        assert_eq!(report.failed, 0);

        let report2 = run_phase(&CountingPhase, &config, &store, RunOptions::default(), &interrupted).unwrap();
        assert_eq!(report2.processed, 0);
    }
}
