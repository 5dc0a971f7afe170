//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.store.busy_retries == 0 {
            return Err(ConfigError::ValidationError(
                "store.busy_retries must be > 0".into(),
            ));
        }
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "store.busy_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.model_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.model_timeout_ms must be > 0".into(),
            ));
        }
        for (name, tier) in self.tiers.originals.iter().chain(self.tiers.variants.iter()) {
            if tier.long_edge == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "tiers.{name}.long_edge must be > 0"
                )));
            }
        }
        if !["cpu", "mps", "cuda"].contains(&self.device.device.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "device.device must be one of cpu/mps/cuda, got {}",
                self.device.device
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_busy_retries() {
        let mut config = Config::default();
        config.store.busy_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("busy_retries"));
    }

    #[test]
    fn test_validate_rejects_zero_max_dimension() {
        let mut config = Config::default();
        config.limits.max_image_dimension = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_image_dimension"));
    }

    #[test]
    fn test_validate_rejects_bad_device() {
        let mut config = Config::default();
        config.device.device = "tpu".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("device.device"));
    }
}
