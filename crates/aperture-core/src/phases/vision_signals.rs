//! One `Phase` per `VisionBackend` method (§4.5: depth, scene, style,
//! aesthetic, aesthetic_v2, captions, OCR, faces, face-identity, objects,
//! open-detections, poses, emotions, tags).

use std::sync::Arc;

use crate::backends::VisionBackend;
use crate::config::Config;
use crate::error::PhaseError;
use crate::phase::{load_tier_image, Phase};
use crate::store::Store;
use crate::types::FaceDetection;

macro_rules! simple_vision_phase {
    ($struct_name:ident, $phase_name:literal, $tier:literal, $method:ident) => {
        pub struct $struct_name {
            backend: Arc<dyn VisionBackend>,
        }

        impl $struct_name {
            pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
                Self { backend }
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self::new(super::default_vision_backend())
            }
        }

        impl Phase for $struct_name {
            fn name(&self) -> &'static str {
                $phase_name
            }

            fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
                let image = load_tier_image(config, image_id, $tier)?;
                let row = self.backend.$method(&image, image_id)?;
                store.upsert_signal(
                    self.table_name(),
                    image_id,
                    &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
                )?;
                Ok(())
            }
        }
    };
}

macro_rules! multi_row_vision_phase {
    ($struct_name:ident, $phase_name:literal, $tier:literal, $method:ident) => {
        pub struct $struct_name {
            backend: Arc<dyn VisionBackend>,
        }

        impl $struct_name {
            pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
                Self { backend }
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self::new(super::default_vision_backend())
            }
        }

        impl Phase for $struct_name {
            fn name(&self) -> &'static str {
                $phase_name
            }

            fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
                let image = load_tier_image(config, image_id, $tier)?;
                let rows = self.backend.$method(&image, image_id)?;
                let json_rows: Vec<serde_json::Value> = rows
                    .into_iter()
                    .map(|r| serde_json::to_value(r).unwrap())
                    .collect();
                store.upsert_signal(self.table_name(), image_id, &json_rows)?;
                Ok(())
            }
        }
    };
}

simple_vision_phase!(DepthPhase, "depth", "display", depth);
simple_vision_phase!(AestheticPhase, "aesthetic", "display", aesthetic);
simple_vision_phase!(AestheticV2Phase, "aesthetic-v2", "display", aesthetic_v2);
simple_vision_phase!(CaptionPhase, "captions", "display", caption);
simple_vision_phase!(FlorenceCaptionPhase, "florence-captions", "display", florence_caption);
multi_row_vision_phase!(OcrPhase, "ocr", "display", ocr);
multi_row_vision_phase!(ObjectsPhase, "objects", "display", objects);
multi_row_vision_phase!(OpenDetectionsPhase, "open-detections", "display", open_detections);
multi_row_vision_phase!(TagsPhase, "tags", "display", tags);
simple_vision_phase!(SegmentsPhase, "segments", "display", segments);
simple_vision_phase!(ForegroundPhase, "foreground", "display", foreground);
simple_vision_phase!(SaliencyPhase, "saliency", "display", saliency);

/// `scene` is its own phase (no tier-only helper since it's a straight
/// image->label call, same shape as the other simple phases above).
pub struct ScenePhase {
    backend: Arc<dyn VisionBackend>,
}

impl ScenePhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for ScenePhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for ScenePhase {
    fn name(&self) -> &'static str {
        "scene"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let row = self.backend.scene(&image, image_id)?;
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

/// §4.5 `style`: derived from `scene`'s output rather than raw pixels.
pub struct StylePhase {
    backend: Arc<dyn VisionBackend>,
}

impl StylePhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for StylePhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for StylePhase {
    fn name(&self) -> &'static str {
        "style"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["scene"]
    }

    fn process_one(&self, _config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let scene_rows = store.signal_rows("scene", image_id)?;
        let scene: crate::types::SceneClassification = scene_rows
            .first()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| PhaseError::new(format!("no scene row for {image_id}")))?;
        let row = self.backend.style(&scene, image_id)?;
        store.upsert_signal(
            self.table_name(),
            image_id,
            &[serde_json::to_value(row).map_err(|e| PhaseError::new(e.to_string()))?],
        )?;
        Ok(())
    }
}

/// §4.5 `faces`: the only detector phase that writes a variable number of
/// rows directly from the image (rather than deriving from another
/// signal table, as `face-identity`/`emotions` do below).
pub struct FacesPhase {
    backend: Arc<dyn VisionBackend>,
}

impl FacesPhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for FacesPhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for FacesPhase {
    fn name(&self) -> &'static str {
        "faces"
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let rows = self.backend.faces(&image, image_id)?;
        let json_rows: Vec<serde_json::Value> = rows.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
        store.upsert_signal(self.table_name(), image_id, &json_rows)?;
        Ok(())
    }
}

fn load_faces(store: &Store, image_id: &str) -> Result<Vec<FaceDetection>, PhaseError> {
    store
        .signal_rows("faces", image_id)?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| PhaseError::new(e.to_string())))
        .collect()
}

/// §4.5 `face-identity`: per-face embeddings clustered to a stable
/// identity, gated on `faces`.
pub struct FaceIdentityPhase {
    backend: Arc<dyn VisionBackend>,
}

impl FaceIdentityPhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for FaceIdentityPhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for FaceIdentityPhase {
    fn name(&self) -> &'static str {
        "face-identity"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["faces"]
    }

    fn process_one(&self, _config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let faces = load_faces(store, image_id)?;
        let rows = self.backend.face_identity(&faces, image_id)?;
        let json_rows: Vec<serde_json::Value> = rows.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
        store.upsert_signal(self.table_name(), image_id, &json_rows)?;
        Ok(())
    }
}

/// §4.5 `emotions`: per-face dominant emotion, gated on `faces`.
pub struct EmotionsPhase {
    backend: Arc<dyn VisionBackend>,
}

impl EmotionsPhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for EmotionsPhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for EmotionsPhase {
    fn name(&self) -> &'static str {
        "emotions"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["faces"]
    }

    fn process_one(&self, _config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let faces = load_faces(store, image_id)?;
        let rows = self.backend.emotions(&faces, image_id)?;
        let json_rows: Vec<serde_json::Value> = rows.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
        store.upsert_signal(self.table_name(), image_id, &json_rows)?;
        Ok(())
    }
}

/// §4.5 `poses`: gated on `objects`, run only over person-labeled boxes.
pub struct PosesPhase {
    backend: Arc<dyn VisionBackend>,
}

impl PosesPhase {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }
}

impl Default for PosesPhase {
    fn default() -> Self {
        Self::new(super::default_vision_backend())
    }
}

impl Phase for PosesPhase {
    fn name(&self) -> &'static str {
        "poses"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["objects"]
    }

    fn process_one(&self, config: &Config, store: &Store, image_id: &str) -> Result<(), PhaseError> {
        let image = load_tier_image(config, image_id, "display")?;
        let objects: Vec<crate::types::ObjectDetection> = store
            .signal_rows("objects", image_id)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| PhaseError::new(e.to_string())))
            .collect::<Result<_, _>>()?;
        let person_boxes: Vec<[f32; 4]> = objects
            .into_iter()
            .filter(|o| o.label == "person")
            .map(|o| o.bbox)
            .collect();
        let rows = self.backend.poses(&image, &person_boxes)?;
        let json_rows: Vec<serde_json::Value> = rows
            .into_iter()
            .map(|mut r| {
                r.image_id = image_id.to_string();
                serde_json::to_value(r).unwrap()
            })
            .collect();
        store.upsert_signal(self.table_name(), image_id, &json_rows)?;
        Ok(())
    }
}
