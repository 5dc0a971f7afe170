//! The `aperture models` command for inspecting the model directory.
//!
//! The vectors/gemini/aesthetic/depth/scene/style/ocr/caption phases each
//! load a heavy resource once per run through a narrow backend trait
//! (`EmbeddingBackend`, `VisionBackend`, `GeminiBackend`); this command is
//! the ambient tooling around that load, not a downloader — model weights
//! are out of scope (§1 Non-goals).

use clap::{Args, Subcommand};
use aperture_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model directory inspection.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List installed models under the configured model directory
    List,

    /// Show the configured model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs) -> anyhow::Result<()> {
    let config = Config::load()?;

    match args.command {
        ModelsCommand::List => {
            let model_dir = config.model_dir();

            if !model_dir.exists() {
                println!("No models installed.");
                println!("Directory: {}", model_dir.display());
                return Ok(());
            }

            println!("Installed models:");
            println!("  Directory: {}", model_dir.display());

            if let Ok(entries) = std::fs::read_dir(&model_dir) {
                let mut found_any = false;
                for entry in entries.flatten() {
                    if entry.path().is_dir() {
                        println!("  - {}", entry.file_name().to_string_lossy());
                        found_any = true;
                    }
                }
                if !found_any {
                    println!("  (no models found)");
                }
            }
        }

        ModelsCommand::Path => {
            let model_dir = config.model_dir();
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}
