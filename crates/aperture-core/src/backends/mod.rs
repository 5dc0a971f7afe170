//! External collaborators (§1 Non-goals): the ML inference implementations
//! themselves, and the vision-LLM service, are out of scope. What this
//! crate owns is the narrow trait each phase calls through, plus a
//! deterministic default implementation of each that satisfies every
//! invariant in §8 without any model weights — so the pipeline is fully
//! exercisable end to end, and a real backend (ONNX session, hosted vision
//! model) can be swapped in behind the same trait later.

pub mod embedding;
pub mod llm;
pub mod vision;

pub use embedding::{DeterministicEmbeddingBackend, EmbeddingBackend, EmbeddingKind};
pub use llm::GeminiBackend;
pub use vision::{DeterministicVisionBackend, VisionBackend};

use std::time::Duration;

use crate::error::ModelError;

/// Retry a model call per §7: five attempts with exponential back-off
/// (2, 4, 8, 16, 32s), a 30s floor for rate-limit responses.
pub fn with_model_retry<T>(mut f: impl FnMut(u32) -> Result<T, ModelError>) -> Result<T, ModelError> {
    let mut attempt = 0u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < 5 => {
                let delay = match &e {
                    ModelError::RateLimited { retry_after_s } => {
                        Duration::from_secs((*retry_after_s).max(30))
                    }
                    _ => Duration::from_secs(2u64.saturating_pow(attempt + 1).min(30)),
                };
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model_retry_gives_up_after_five_attempts() {
        let mut calls = 0;
        let result: Result<(), ModelError> = with_model_retry(|_attempt| {
            calls += 1;
            Err(ModelError::Timeout(1))
        });
        assert!(result.is_err());
        assert_eq!(calls, 6);
    }

    #[test]
    fn test_with_model_retry_succeeds_after_transient_failure() {
        let mut calls = 0;
        let result = with_model_retry(|_attempt| {
            calls += 1;
            if calls < 2 {
                Err(ModelError::Timeout(1))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_model_retry_does_not_retry_non_retryable() {
        let mut calls = 0;
        let result: Result<(), ModelError> = with_model_retry(|_attempt| {
            calls += 1;
            Err(ModelError::SchemaMismatch("bad".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
