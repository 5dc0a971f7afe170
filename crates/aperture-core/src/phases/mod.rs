//! Concrete enrichment phases (§4.5): bootstrap steps that populate the
//! `images`/`tiers` tables outside the generic signal framework, plus one
//! `Phase` implementation per signal family built on top of
//! `phase::run_phase`.

mod bootstrap;
mod cpu_signals;
mod enhancement_plan;
mod vectors;
mod vision_llm;
mod vision_signals;

pub use bootstrap::{fix_blobs, register, render};
pub use cpu_signals::{BordersPhase, DominantColorsPhase, ExifPhase, HashesPhase, LocationsPhase, PixelAnalysisPhase};
pub use enhancement_plan::plan_enhancement;
pub use vectors::VectorsPhase;
pub use vision_llm::GeminiPhase;
pub use vision_signals::{
    AestheticPhase, AestheticV2Phase, CaptionPhase, DepthPhase, EmotionsPhase, FaceIdentityPhase,
    FacesPhase, FlorenceCaptionPhase, ForegroundPhase, ObjectsPhase, OcrPhase, OpenDetectionsPhase,
    PosesPhase, SaliencyPhase, ScenePhase, SegmentsPhase, StylePhase, TagsPhase,
};

use std::sync::Arc;

use crate::backends::{DeterministicEmbeddingBackend, DeterministicVisionBackend, EmbeddingBackend, GeminiBackend, VisionBackend};
use crate::backends::llm::DeterministicGeminiBackend;

/// The deterministic default backend set (§1 Non-goals), wired into every
/// phase constructor below. A real deployment swaps these `Arc`s for
/// model-backed implementations of the same traits.
pub fn default_vision_backend() -> Arc<dyn VisionBackend> {
    Arc::new(DeterministicVisionBackend)
}

pub fn default_embedding_backend() -> Arc<dyn EmbeddingBackend> {
    Arc::new(DeterministicEmbeddingBackend)
}

pub fn default_gemini_backend() -> Arc<dyn GeminiBackend> {
    Arc::new(DeterministicGeminiBackend)
}
