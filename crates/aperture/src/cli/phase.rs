//! Phase subcommands (§6 CLI shape): one subcommand per phase name plus
//! `run-all` and `fix-blobs`, generalizing the teacher's single `Process`
//! command to the phase catalogue of `aperture_core::orchestrator`.

use std::path::PathBuf;

use aperture_core::phase::RunOptions;
use aperture_core::{orchestrator, Config, Store};
use clap::{Args, Subcommand};

/// Sharding/scope flags shared by every phase subcommand (§6), attached
/// via `#[command(flatten)]` the way the teacher flattens shared option
/// groups into `ProcessArgs`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct PhaseArgs {
    /// Process only shard N of M (e.g. "0/2"); omit to process everything
    #[arg(long, value_parser = parse_shard)]
    pub shard: Option<(u64, u64)>,

    /// Stop after this many images
    #[arg(long)]
    pub limit: Option<usize>,

    /// Reprocess images that already have this phase's signal
    #[arg(long)]
    pub force: bool,

    /// Worker count hint; the engine currently runs each phase on a
    /// single thread per process, so this is accepted for interface
    /// parity with sharded multi-process fan-out and otherwise unused
    #[arg(long, default_value_t = 1)]
    pub workers: usize,
}

fn parse_shard(s: &str) -> Result<(u64, u64), String> {
    let (n, m) = s
        .split_once('/')
        .ok_or_else(|| format!("expected N/M, got {s:?}"))?;
    let n: u64 = n.parse().map_err(|_| format!("invalid shard index: {n:?}"))?;
    let m: u64 = m.parse().map_err(|_| format!("invalid shard count: {m:?}"))?;
    if m == 0 || n >= m {
        return Err(format!("shard {n}/{m} out of range"));
    }
    Ok((n, m))
}

impl From<PhaseArgs> for RunOptions {
    fn from(args: PhaseArgs) -> Self {
        RunOptions {
            shard: args.shard,
            limit: args.limit,
            force: args.force,
        }
    }
}

macro_rules! phase_commands {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Top-level commands (§6): one per phase name, plus `run-all`,
        /// `fix-blobs`, `config`, `stats`, `models`.
        #[derive(Subcommand, Debug)]
        pub enum Commands {
            $(
                #[doc = $name]
                $variant(PhaseArgs),
            )+
            /// Run every phase in the canonical §6 order
            RunAll(PhaseArgs),
            /// One-time migration for the binary-corruption bug (§8 scenario 6, §9)
            FixBlobs,
            /// Inspect Store-wide counts (§4.2 `Store::stats`)
            Stats,
            /// Inspect the model directory
            Models(crate::cli::models::ModelsArgs),
            /// View and manage configuration
            Config(crate::cli::config::ConfigArgs),
        }

        fn single_phase_name(command: &Commands) -> Option<(&'static str, PhaseArgs)> {
            match *command {
                $(Commands::$variant(args) => Some(($name, args)),)+
                _ => None,
            }
        }
    };
}

phase_commands! {
    Register => "register",
    Render => "render",
    Exif => "exif",
    PixelAnalysis => "pixel-analysis",
    DominantColors => "dominant-colors",
    Hashes => "hashes",
    Vectors => "vectors",
    Gemini => "gemini",
    Aesthetic => "aesthetic",
    Depth => "depth",
    Scene => "scene",
    Style => "style",
    Ocr => "ocr",
    Captions => "captions",
    Faces => "faces",
    FaceIdentity => "face-identity",
    Emotions => "emotions",
    Objects => "objects",
    OpenDetections => "open-detections",
    Segments => "segments",
    Foreground => "foreground",
    Poses => "poses",
    Saliency => "saliency",
    Borders => "borders",
    Locations => "locations",
    Tags => "tags",
    EnhancementPlan => "enhancement-plan",
    EnhancementExecute => "enhancement-execute",
    Export => "export",
}

/// Indeterminate spinner for `run-all` (teacher's `create_progress_bar`
/// idiom); the orchestrator doesn't stream per-phase events out, so this
/// covers the whole run rather than ticking per item.
fn run_all_spinner() -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] running every phase... {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    let path: PathBuf = config.store_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Store::open(&path, config.store.busy_timeout_ms, config.store.busy_retries)?)
}

/// Dispatch a parsed `Commands` value that names a phase, `run-all`, or
/// `fix-blobs`, running it to completion. Returns the command back,
/// unconsumed, when it's `Config`/`Stats`/`Models` for the caller to hand
/// to its own module.
pub async fn execute(config: &Config, command: Commands) -> anyhow::Result<Option<Commands>> {
    if let Commands::RunAll(args) = command {
        let store = open_store(config)?;
        let spinner = run_all_spinner();
        let report = orchestrator::run_all(config, &store, args.into())?;
        spinner.finish_with_message("run-all complete");
        for outcome in &report.outcomes {
            tracing::info!(
                phase = outcome.name,
                processed = outcome.report.processed,
                failed = outcome.report.failed,
                "phase complete"
            );
        }
        let failed = report.failed_phase_count();
        if failed > 0 {
            std::process::exit(failed.min(255) as i32);
        }
        return Ok(None);
    }

    if matches!(command, Commands::FixBlobs) {
        let store = open_store(config)?;
        let report = orchestrator::fix_blobs(config, &store)?;
        println!("fix-blobs: scanned {} quality row(s)", report.processed);
        return Ok(None);
    }

    if let Some((name, args)) = single_phase_name(&command) {
        let store = open_store(config)?;
        let report = orchestrator::run_one(config, &store, name, args.into())?;
        println!("{name}: processed {}, failed {}", report.processed, report.failed);
        if report.failed > 0 {
            std::process::exit(1);
        }
        return Ok(None);
    }

    Ok(Some(command))
}
