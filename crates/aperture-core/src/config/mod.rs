//! Configuration management for aperture.
//!
//! Configuration is loaded from `~/.aperture/config.toml` with sensible
//! defaults. All config structs implement `Default` with values from the
//! tier/camera-profile tables (§4.4, §4.6).

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for aperture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub store: StoreConfig,
    pub tiers: TiersConfig,
    pub camera_profiles: CameraProfilesConfig,
    pub limits: LimitsConfig,
    pub llm: LlmConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from the default location (~/.aperture/config.toml).
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// `~/.aperture/config.toml` if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "aperture", "aperture")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".aperture").join("config.toml")
            })
    }

    /// Resolved corpus root (with `~` expansion).
    pub fn root(&self) -> PathBuf {
        expand(&self.general.root)
    }

    /// Resolved model directory path (with `~` expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.general.model_dir)
    }

    pub fn originals_dir(&self) -> PathBuf {
        self.root().join("originals")
    }

    pub fn rendered_dir(&self) -> PathBuf {
        self.root().join("rendered")
    }

    pub fn store_path(&self) -> PathBuf {
        self.root().join("store.db")
    }

    pub fn vector_index_path(&self, engine: &str) -> PathBuf {
        self.root().join(format!("vectors.{engine}"))
    }

    pub fn export_dir(&self) -> PathBuf {
        expand(&self.export.out_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.busy_retries, 10);
        assert_eq!(config.limits.max_image_dimension, 20000);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[store]"));
    }

    #[test]
    fn test_tier_table_has_six_originals_tiers() {
        let config = Config::default();
        assert_eq!(config.tiers.originals.len(), 6);
        assert_eq!(config.tiers.originals["full"].long_edge, 3840);
        assert_eq!(config.tiers.originals["gemini"].webp_quality, None);
    }

    #[test]
    fn test_camera_profile_fallback() {
        let config = Config::default();
        let mono = config.camera_profiles.get("Leica Monochrom");
        assert!(mono.is_mono);
        let unknown = config.camera_profiles.get("Nonexistent Body");
        assert_eq!(unknown.wb_strength, 0.5);
    }
}
