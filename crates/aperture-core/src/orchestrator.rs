//! Orchestrator (C9): sequences every phase in the `run-all` order of §6,
//! holding the process-wide advisory lock (`fs2`) for the duration and
//! installing a two-stage graceful-interrupt handler (§5 Cancellation).
//! Exit status is the count of phases that reported at least one failure.

use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;

use crate::config::Config;
use crate::error::PhaseError;
use crate::phase::{run_phase, Phase, RunOptions, RunReport};
use crate::phases;
use crate::store::Store;
use crate::{enhancer, exporter};

/// One entry of the `run-all` sequence (§6): either a bootstrap step with
/// its own `(force, interrupted)` signature, a generic `Phase`, or the
/// (non-phase) planner/enhancer/exporter steps.
enum Step {
    Bootstrap(&'static str, fn(&Config, &Store, bool, &AtomicBool) -> Result<RunReport, PhaseError>),
    Signal(Box<dyn Phase>),
    Plan(&'static str),
    Enhance(&'static str),
    Export(&'static str),
}

fn steps() -> Vec<Step> {
    vec![
        Step::Bootstrap("register", phases::register),
        Step::Bootstrap("render", phases::render),
        Step::Signal(Box::new(phases::ExifPhase)),
        Step::Signal(Box::new(phases::PixelAnalysisPhase)),
        Step::Signal(Box::new(phases::DominantColorsPhase)),
        Step::Signal(Box::new(phases::HashesPhase)),
        Step::Signal(Box::new(phases::VectorsPhase::default())),
        Step::Signal(Box::new(phases::GeminiPhase::default())),
        Step::Signal(Box::new(phases::AestheticPhase::default())),
        Step::Signal(Box::new(phases::DepthPhase::default())),
        Step::Signal(Box::new(phases::ScenePhase::default())),
        Step::Signal(Box::new(phases::StylePhase::default())),
        Step::Signal(Box::new(phases::OcrPhase::default())),
        Step::Signal(Box::new(phases::CaptionPhase::default())),
        Step::Signal(Box::new(phases::FacesPhase::default())),
        Step::Signal(Box::new(phases::FaceIdentityPhase::default())),
        Step::Signal(Box::new(phases::EmotionsPhase::default())),
        Step::Signal(Box::new(phases::ObjectsPhase::default())),
        Step::Signal(Box::new(phases::OpenDetectionsPhase::default())),
        Step::Signal(Box::new(phases::SegmentsPhase::default())),
        Step::Signal(Box::new(phases::ForegroundPhase::default())),
        Step::Signal(Box::new(phases::PosesPhase::default())),
        Step::Signal(Box::new(phases::SaliencyPhase::default())),
        Step::Signal(Box::new(phases::BordersPhase)),
        Step::Signal(Box::new(phases::LocationsPhase)),
        Step::Signal(Box::new(phases::TagsPhase::default())),
        Step::Plan("enhancement-plan"),
        Step::Enhance("enhancement-execute"),
        Step::Export("export"),
    ]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseOutcome {
    pub name: &'static str,
    pub report: RunReport,
}

#[derive(Debug, Default)]
pub struct OrchestratorReport {
    pub outcomes: Vec<PhaseOutcome>,
}

impl OrchestratorReport {
    /// Exit status per §4.9: the count of phases that failed at least one
    /// item.
    pub fn failed_phase_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.report.failed > 0).count()
    }
}

/// Acquire the process-wide advisory lock under `<root>/.aperture.lock`,
/// held for the duration of the orchestrator run (§5 Suspension points).
fn acquire_lock(config: &Config) -> Result<File, PhaseError> {
    let path = config.root().join(".aperture.lock");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PhaseError::new(e.to_string()))?;
    }
    let file = File::create(&path).map_err(|e| PhaseError::new(e.to_string()))?;
    file.lock_exclusive().map_err(|e| PhaseError::new(format!("another run holds the lock: {e}")))?;
    Ok(file)
}

/// Install a two-stage SIGINT handler (§5 Cancellation): first signal
/// flips `interrupted` so in-flight work finishes and commits; second
/// signal exits the process immediately.
fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let first = interrupted.clone();
    let signalled_once = Arc::new(AtomicBool::new(false));
    let _ = ctrlc::set_handler(move || {
        if signalled_once.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        first.store(true, Ordering::SeqCst);
    });
    interrupted
}

/// Run every phase in the §6 `run-all` order, stopping dispatch (but not
/// the current phase's graceful drain) on interrupt.
pub fn run_all(config: &Config, store: &Store, opts: RunOptions) -> Result<OrchestratorReport, PhaseError> {
    let _lock = acquire_lock(config)?;
    let interrupted = install_interrupt_handler();

    let mut report = OrchestratorReport::default();
    for step in steps() {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let (name, result) = match step {
            Step::Bootstrap(name, f) => (name, f(config, store, opts.force, &interrupted)),
            Step::Signal(phase) => {
                let name = phase.name();
                (name, run_phase(phase.as_ref(), config, store, opts, &interrupted))
            }
            Step::Plan(name) => (name, phases::plan_enhancement(config, store, opts.force, &interrupted)),
            Step::Enhance(name) => (name, enhancer::enhance(config, store, opts.force, &interrupted)),
            Step::Export(name) => {
                let r = exporter::export(config, store).map(|()| RunReport { processed: 1, failed: 0 });
                (name, r)
            }
        };

        match result {
            Ok(r) => report.outcomes.push(PhaseOutcome { name, report: r }),
            Err(e) => {
                tracing::warn!(phase = name, error = %e, "phase errored");
                report.outcomes.push(PhaseOutcome { name, report: RunReport { processed: 0, failed: 1 } });
            }
        }
    }

    Ok(report)
}

/// `core fix-blobs` (§8 scenario 6): a standalone migration, not part of
/// the `run-all` sequence — it targets a historical corruption bug rather
/// than discovering new work, so it is invoked only explicitly.
pub fn fix_blobs(config: &Config, store: &Store) -> Result<RunReport, PhaseError> {
    let interrupted = AtomicBool::new(false);
    phases::fix_blobs(config, store, false, &interrupted)
}

/// Run a single named phase by the §6 CLI phase name, honoring the same
/// sharding/limit/force options `run-all` uses.
pub fn run_one(config: &Config, store: &Store, phase_name: &str, opts: RunOptions) -> Result<RunReport, PhaseError> {
    let interrupted = install_interrupt_handler();
    for step in steps() {
        let matches = match &step {
            Step::Bootstrap(name, _) => *name == phase_name,
            Step::Signal(p) => p.name() == phase_name,
            Step::Plan(name) => *name == phase_name,
            Step::Enhance(name) => *name == phase_name,
            Step::Export(name) => *name == phase_name,
        };
        if !matches {
            continue;
        }
        return match step {
            Step::Bootstrap(_, f) => f(config, store, opts.force, &interrupted),
            Step::Signal(phase) => run_phase(phase.as_ref(), config, store, opts, &interrupted),
            Step::Plan(_) => phases::plan_enhancement(config, store, opts.force, &interrupted),
            Step::Enhance(_) => enhancer::enhance(config, store, opts.force, &interrupted),
            Step::Export(_) => exporter::export(config, store).map(|()| RunReport { processed: 1, failed: 0 }),
        };
    }
    Err(PhaseError::new(format!("unknown phase: {phase_name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurationStatus, Image, Medium, Orientation};

    fn image_row(id: &str) -> Image {
        Image {
            id: id.to_string(),
            source_path: format!("{id}.jpg"),
            file_name: "a.jpg".to_string(),
            category: "Test".to_string(),
            subcategory: "Mini".to_string(),
            source_format: "jpg".to_string(),
            width: 4,
            height: 4,
            aspect_ratio: 1.0,
            orientation: Orientation::Square,
            source_bytes: 1,
            exif_blob: None,
            camera_body: None,
            medium: Medium::Digital,
            film_stock: None,
            monochrome: false,
            curation_status: CurationStatus::Pending,
            content_hash: "x".to_string(),
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    #[test]
    fn test_run_one_unknown_phase_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        let store = Store::open_in_memory().unwrap();
        let err = run_one(&config, &store, "not-a-phase", RunOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unknown phase"));
    }

    #[test]
    fn test_run_one_export_runs_even_with_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        config.export.out_dir = dir.path().join("export");
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&image_row("id-1")).unwrap();
        let report = run_one(&config, &store, "export", RunOptions::default()).unwrap();
        assert_eq!(report.processed, 1);
        assert!(config.export_dir().join("export.json").exists());
    }

    #[test]
    fn test_failed_phase_count_counts_phases_not_items() {
        let mut report = OrchestratorReport::default();
        report.outcomes.push(PhaseOutcome { name: "a", report: RunReport { processed: 5, failed: 2 } });
        report.outcomes.push(PhaseOutcome { name: "b", report: RunReport { processed: 5, failed: 0 } });
        assert_eq!(report.failed_phase_count(), 1);
    }
}
