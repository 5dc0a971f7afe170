//! §4.5 `vectors`: DINOv2/SigLIP/CLIP embeddings for one image, stored as
//! a single JSON row keyed by engine name (§8: each vector is unit-norm).

use std::sync::Arc;

use crate::backends::{EmbeddingBackend, EmbeddingKind};
use crate::config::Config;
use crate::error::PhaseError;
use crate::phase::{load_tier_image, Phase};
use crate::store::Store;

pub struct VectorsPhase {
    backend: Arc<dyn EmbeddingBackend>,
}

impl VectorsPhase {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }
}

impl Default for VectorsPhase {
    fn default() -> Self {
        Self::new(super::default_embedding_backend())
    }
}

impl Phase for VectorsPhase {
    fn name(&self) -> &'static str {
        "vectors"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "gemini")?;
        let dinov2 = self.backend.embed(&image, EmbeddingKind::DinoV2)?;
        let siglip = self.backend.embed(&image, EmbeddingKind::SigLip)?;
        let clip = self.backend.embed(&image, EmbeddingKind::Clip)?;

        let row = serde_json::json!({
            "image_id": image_id,
            "dinov2": dinov2,
            "siglip": siglip,
            "clip": clip,
            "analyzed_at": crate::store::now(),
        });
        store.upsert_signal(self.table_name(), image_id, &[row])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{run_phase, RunOptions};
    use crate::types::Image;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_vectors_phase_writes_unit_norm_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        let tier_dir = config.rendered_dir().join("gemini").join("jpeg");
        std::fs::create_dir_all(&tier_dir).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8, y as u8, 50])));
        image.save(tier_dir.join("id-1.jpg")).unwrap();

        let store = Store::open_in_memory().unwrap();
        store
            .upsert_image(&Image {
                id: "id-1".to_string(),
                source_path: "id-1.jpg".to_string(),
                file_name: "a.jpg".to_string(),
                category: "Test".to_string(),
                subcategory: "Mini".to_string(),
                source_format: "jpg".to_string(),
                width: 32,
                height: 32,
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
            })
            .unwrap();

        let interrupted = AtomicBool::new(false);
        let phase = VectorsPhase::default();
        let report = run_phase(&phase, &config, &store, RunOptions::default(), &interrupted).unwrap();
        assert_eq!(report.processed, 1);

        let rows = store.signal_rows("vectors", "id-1").unwrap();
        let dinov2 = rows[0].get("dinov2").unwrap().as_array().unwrap();
        assert_eq!(dinov2.len(), 768);
    }
}
