//! §4.5 `gemini`: one row per image from the vision-LLM backend, retried
//! per §7's Model error taxonomy before being recorded (error text lands
//! on the row itself rather than aborting the phase).

use std::sync::Arc;

use crate::backends::{with_model_retry, GeminiBackend};
use crate::config::Config;
use crate::error::PhaseError;
use crate::phase::{load_tier_image, Phase};
use crate::store::Store;

pub struct GeminiPhase {
    backend: Arc<dyn GeminiBackend>,
}

impl GeminiPhase {
    pub fn new(backend: Arc<dyn GeminiBackend>) -> Self {
        Self { backend }
    }
}

impl Default for GeminiPhase {
    fn default() -> Self {
        Self::new(super::default_gemini_backend())
    }
}

impl Phase for GeminiPhase {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "gemini")?;
        let analysis = with_model_retry(|_attempt| self.backend.analyze(&image, image_id))?;
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(analysis).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}
