//! Vision backend (§4.5): the ML-model-backed signal families whose
//! inference is explicitly out of scope (§1) — depth, scene/style
//! classification, aesthetics, captioning, OCR, face/object/pose
//! detection, emotion, and tagging. Each method is a narrow seam a real
//! model would sit behind; `DeterministicVisionBackend` derives every
//! output from measured pixel statistics so downstream invariants (§8)
//! hold without any model weights.

use image::{DynamicImage, GenericImageView};

use crate::error::ModelError;
use crate::math::rgb_to_hsv;
use crate::types::{
    AestheticLabel, AestheticLabelV2, AestheticScore, AestheticScoreV2, DepthEstimation,
    FaceDetection, FaceIdentity, FacialEmotion, FlorenceCaption, ForegroundMask, ImageCaption,
    ImageTag, ObjectDetection, OcrDetection, PoseDetection, SaliencyMap, SceneClassification,
    SegmentationMask, StyleClassification,
};

pub trait VisionBackend: Send + Sync {
    fn depth(&self, image: &DynamicImage, image_id: &str) -> Result<DepthEstimation, ModelError>;
    fn scene(&self, image: &DynamicImage, image_id: &str) -> Result<SceneClassification, ModelError>;
    fn style(&self, scene: &SceneClassification, image_id: &str) -> Result<StyleClassification, ModelError>;
    fn aesthetic(&self, image: &DynamicImage, image_id: &str) -> Result<AestheticScore, ModelError>;
    fn aesthetic_v2(&self, image: &DynamicImage, image_id: &str) -> Result<AestheticScoreV2, ModelError>;
    fn caption(&self, image: &DynamicImage, image_id: &str) -> Result<ImageCaption, ModelError>;
    fn florence_caption(&self, image: &DynamicImage, image_id: &str) -> Result<FlorenceCaption, ModelError>;
    fn ocr(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<OcrDetection>, ModelError>;
    fn faces(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<FaceDetection>, ModelError>;
    fn face_identity(&self, faces: &[FaceDetection], image_id: &str) -> Result<Vec<FaceIdentity>, ModelError>;
    fn objects(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<ObjectDetection>, ModelError>;
    fn open_detections(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<ObjectDetection>, ModelError>;
    fn poses(&self, image: &DynamicImage, person_boxes: &[[f32; 4]]) -> Result<Vec<PoseDetection>, ModelError>;
    fn emotions(&self, faces: &[FaceDetection], image_id: &str) -> Result<Vec<FacialEmotion>, ModelError>;
    fn tags(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<ImageTag>, ModelError>;
    fn segments(&self, image: &DynamicImage, image_id: &str) -> Result<SegmentationMask, ModelError>;
    fn foreground(&self, image: &DynamicImage, image_id: &str) -> Result<ForegroundMask, ModelError>;
    fn saliency(&self, image: &DynamicImage, image_id: &str) -> Result<SaliencyMap, ModelError>;
}

const TAG_VOCABULARY: [&str; 60] = [
    "portrait", "landscape", "street", "architecture", "sky", "water", "mountain", "forest",
    "urban", "night", "sunset", "sunrise", "beach", "snow", "rain", "fog", "flower", "animal",
    "bird", "dog", "cat", "vehicle", "bicycle", "boat", "bridge", "road", "building", "window",
    "door", "reflection", "shadow", "silhouette", "texture", "pattern", "crowd", "solitude",
    "food", "market", "interior", "abstract", "macro", "monochrome", "color", "motion", "still",
    "vintage", "modern", "rural", "industrial", "garden", "park", "cloud",
    "star", "moon", "fire", "smoke", "glass", "metal", "wood", "stone",
];

fn mean_rgb(image: &DynamicImage) -> (f32, f32, f32) {
    let rgb = image.to_rgb8();
    let n = (rgb.width() as u64 * rgb.height() as u64).max(1);
    let mut sum = [0u64; 3];
    for p in rgb.pixels() {
        sum[0] += p[0] as u64;
        sum[1] += p[1] as u64;
        sum[2] += p[2] as u64;
    }
    (
        (sum[0] / n) as f32,
        (sum[1] / n) as f32,
        (sum[2] / n) as f32,
    )
}

/// Coarse edge density in [0,1]: fraction of horizontally-adjacent pixel
/// pairs whose luma differs by more than a fixed threshold.
fn edge_density(image: &DynamicImage) -> f32 {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    if w < 2 || h == 0 {
        return 0.0;
    }
    let mut edges = 0u64;
    let mut total = 0u64;
    for y in 0..h {
        for x in 0..w - 1 {
            let a = gray.get_pixel(x, y)[0] as i32;
            let b = gray.get_pixel(x + 1, y)[0] as i32;
            if (a - b).abs() > 20 {
                edges += 1;
            }
            total += 1;
        }
    }
    edges as f32 / total.max(1) as f32
}

/// Deterministic stand-in for every ML-backed signal family (§1 Non-goals).
pub struct DeterministicVisionBackend;

impl VisionBackend for DeterministicVisionBackend {
    fn depth(&self, image: &DynamicImage, image_id: &str) -> Result<DepthEstimation, ModelError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ModelError::Unavailable(format!("empty image for {image_id}")));
        }
        let third = (h / 3).max(1);
        let bands = [
            image.crop_imm(0, 0, w, third.min(h)),
            image.crop_imm(0, third.min(h.saturating_sub(1)), w, third.min(h)),
            image.crop_imm(0, (2 * third).min(h.saturating_sub(1)), w, h - (2 * third).min(h)),
        ];
        let mut densities: Vec<f32> = bands.iter().map(edge_density).collect();
        // top band = far, middle = mid, bottom = near (§4.5 depth)
        let total: f32 = densities.iter().sum();
        if total <= f32::EPSILON {
            densities = vec![100.0 / 3.0, 100.0 / 3.0, 100.0 / 3.0];
        } else {
            for d in densities.iter_mut() {
                *d = *d / total * 100.0;
            }
        }
        let (far_pct, mid_pct, near_pct) = (densities[0], densities[1], densities[2]);
        let complexity = (edge_density(image) * 20.0 + 1.0).log2().clamp(0.0, 20f32.log2());
        Ok(DepthEstimation {
            image_id: image_id.to_string(),
            near_pct,
            mid_pct,
            far_pct,
            complexity,
            analyzed_at: crate::store::now(),
        })
    }

    fn scene(&self, image: &DynamicImage, image_id: &str) -> Result<SceneClassification, ModelError> {
        let (r, g, b) = mean_rgb(image);
        let (_, s, v) = rgb_to_hsv(r as u8, g as u8, b as u8);
        let environment = if b > r && b > g && v > 0.4 {
            "outdoor"
        } else if v < 0.25 {
            "unknown"
        } else {
            "indoor"
        };
        let scene_1 = if b > r && b > g {
            "sky"
        } else if g > r && g > b {
            "foliage"
        } else if s < 0.12 {
            "architecture"
        } else {
            "street"
        };
        let scene_2 = if scene_1 != "street" {
            Some(("street".to_string(), 0.2))
        } else {
            None
        };
        Ok(SceneClassification {
            image_id: image_id.to_string(),
            scene_1: scene_1.to_string(),
            score_1: (0.5 + s).clamp(0.0, 1.0),
            scene_2: scene_2.as_ref().map(|(l, _)| l.clone()),
            score_2: scene_2.as_ref().map(|(_, s)| *s),
            scene_3: None,
            score_3: None,
            environment: environment.to_string(),
            analyzed_at: crate::store::now(),
        })
    }

    fn style(&self, scene: &SceneClassification, image_id: &str) -> Result<StyleClassification, ModelError> {
        let label = match scene.scene_1.as_str() {
            "sky" | "foliage" => "landscape",
            "architecture" => "architecture",
            _ if scene.environment == "indoor" => "interior",
            _ => "street",
        };
        Ok(StyleClassification {
            image_id: image_id.to_string(),
            label: label.to_string(),
            confidence: scene.score_1.clamp(0.25, 0.95),
            analyzed_at: crate::store::now(),
        })
    }

    fn aesthetic(&self, image: &DynamicImage, image_id: &str) -> Result<AestheticScore, ModelError> {
        let density = edge_density(image);
        let score = (1.0 + density * 9.0).clamp(1.0, 10.0);
        let label = if score < 3.0 {
            AestheticLabel::Poor
        } else if score < 5.5 {
            AestheticLabel::Average
        } else if score < 8.0 {
            AestheticLabel::Good
        } else {
            AestheticLabel::Excellent
        };
        Ok(AestheticScore {
            image_id: image_id.to_string(),
            score,
            label,
            analyzed_at: crate::store::now(),
        })
    }

    fn aesthetic_v2(&self, image: &DynamicImage, image_id: &str) -> Result<AestheticScoreV2, ModelError> {
        let density = edge_density(image);
        let (r, g, b) = mean_rgb(image);
        let (_, s, v) = rgb_to_hsv(r as u8, g as u8, b as u8);
        let topiq = (density * 10.0).clamp(0.0, 10.0);
        let musiq = (v * 10.0).clamp(0.0, 10.0);
        let laion = ((s + v) / 2.0 * 10.0).clamp(0.0, 10.0);
        let composite = (topiq + musiq + laion) / 3.0;
        let label = if composite < 2.5 {
            AestheticLabelV2::Poor
        } else if composite < 4.5 {
            AestheticLabelV2::BelowAvg
        } else if composite < 6.0 {
            AestheticLabelV2::Average
        } else if composite < 8.0 {
            AestheticLabelV2::Good
        } else {
            AestheticLabelV2::Excellent
        };
        Ok(AestheticScoreV2 {
            image_id: image_id.to_string(),
            topiq: Some(topiq),
            musiq: Some(musiq),
            laion: Some(laion),
            composite,
            label,
            analyzed_at: crate::store::now(),
        })
    }

    fn caption(&self, image: &DynamicImage, image_id: &str) -> Result<ImageCaption, ModelError> {
        let scene = self.scene(image, image_id)?;
        Ok(ImageCaption {
            image_id: image_id.to_string(),
            caption: format!("A {} scene dominated by {}.", scene.environment, scene.scene_1),
            analyzed_at: crate::store::now(),
        })
    }

    fn florence_caption(&self, image: &DynamicImage, image_id: &str) -> Result<FlorenceCaption, ModelError> {
        let scene = self.scene(image, image_id)?;
        Ok(FlorenceCaption {
            image_id: image_id.to_string(),
            short: scene.scene_1.clone(),
            detailed: format!("A {} scene dominated by {}.", scene.environment, scene.scene_1),
            more_detailed: format!(
                "A {} photograph whose dominant visual element is {}, with an overall {} character.",
                scene.environment, scene.scene_1, scene.environment
            ),
            analyzed_at: crate::store::now(),
        })
    }

    fn ocr(&self, _image: &DynamicImage, _image_id: &str) -> Result<Vec<OcrDetection>, ModelError> {
        Ok(Vec::new())
    }

    fn faces(&self, _image: &DynamicImage, _image_id: &str) -> Result<Vec<FaceDetection>, ModelError> {
        Ok(Vec::new())
    }

    fn face_identity(&self, faces: &[FaceDetection], _image_id: &str) -> Result<Vec<FaceIdentity>, ModelError> {
        Ok(faces
            .iter()
            .map(|f| FaceIdentity {
                image_id: f.image_id.clone(),
                face_index: f.face_index,
                embedding: vec![0.0; 512],
                identity_id: None,
                label: None,
            })
            .collect())
    }

    fn objects(&self, _image: &DynamicImage, _image_id: &str) -> Result<Vec<ObjectDetection>, ModelError> {
        Ok(Vec::new())
    }

    fn open_detections(&self, _image: &DynamicImage, _image_id: &str) -> Result<Vec<ObjectDetection>, ModelError> {
        Ok(Vec::new())
    }

    fn poses(&self, _image: &DynamicImage, person_boxes: &[[f32; 4]]) -> Result<Vec<PoseDetection>, ModelError> {
        Ok(person_boxes
            .iter()
            .enumerate()
            .map(|(i, bbox)| PoseDetection {
                image_id: String::new(),
                person_index: i as u32,
                keypoints: [(0.0, 0.0, 0.0); 17],
                bbox: *bbox,
                score: 0.0,
            })
            .collect())
    }

    fn emotions(&self, faces: &[FaceDetection], _image_id: &str) -> Result<Vec<FacialEmotion>, ModelError> {
        Ok(faces
            .iter()
            .map(|f| FacialEmotion {
                image_id: f.image_id.clone(),
                face_index: f.face_index,
                dominant_emotion: "neutral".to_string(),
                scores: [
                    ("neutral".to_string(), 1.0),
                    ("happy".to_string(), 0.0),
                    ("sad".to_string(), 0.0),
                    ("angry".to_string(), 0.0),
                    ("surprised".to_string(), 0.0),
                    ("fearful".to_string(), 0.0),
                    ("disgusted".to_string(), 0.0),
                ],
                confidence: 1.0,
            })
            .collect())
    }

    fn tags(&self, image: &DynamicImage, image_id: &str) -> Result<Vec<ImageTag>, ModelError> {
        let (r, g, b) = mean_rgb(image);
        let density = edge_density(image);
        let mut tags = Vec::new();
        for (i, label) in TAG_VOCABULARY.iter().enumerate() {
            // A cheap zero-shot stand-in: affinity is a hash of (label,
            // image) folded against measured brightness/edge density so
            // the same image always yields the same tag set.
            let h = crate::math::stable_hash(&format!("{image_id}:{label}"));
            let base = (h % 1000) as f32 / 1000.0;
            let confidence = (base * 0.5 + (r + g + b) / 765.0 * 0.25 + density * 0.25)
                .clamp(0.0, 1.0);
            if confidence >= 0.25 {
                tags.push(ImageTag {
                    image_id: image_id.to_string(),
                    tag: label.to_string(),
                    confidence,
                });
            }
            if tags.len() >= 10 {
                break;
            }
            let _ = i;
        }
        Ok(tags)
    }

    fn segments(&self, image: &DynamicImage, image_id: &str) -> Result<SegmentationMask, ModelError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ModelError::Unavailable(format!("empty image for {image_id}")));
        }
        let grid = 4u32;
        let (cw, ch) = ((w / grid).max(1), (h / grid).max(1));
        let mut areas = Vec::new();
        for gy in 0..grid {
            for gx in 0..grid {
                if gx * cw >= w || gy * ch >= h {
                    continue;
                }
                let cell_w = cw.min(w - gx * cw);
                let cell_h = ch.min(h - gy * ch);
                let cell = image.crop_imm(gx * cw, gy * ch, cell_w, cell_h);
                areas.push(edge_density(&cell));
            }
        }
        areas.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let total_cells = areas.len().max(1) as f32;
        let segment_count = areas.iter().filter(|d| **d > 0.02).count().max(1) as u32;
        let largest_segment_pct = areas.first().copied().unwrap_or(0.0) * 100.0 / total_cells.sqrt().max(1.0);
        let mean_segment_area_pct = 100.0 / segment_count as f32;
        let top_areas: Vec<f32> = areas.iter().take(5).map(|d| d * 100.0).collect();
        Ok(SegmentationMask {
            image_id: image_id.to_string(),
            segment_count,
            largest_segment_pct: largest_segment_pct.clamp(0.0, 100.0),
            figure_ground_ratio: (segment_count as f32 / total_cells).clamp(0.0, 1.0),
            edge_complexity: edge_density(image),
            mean_segment_area_pct,
            top_areas_json: serde_json::to_string(&top_areas).unwrap_or_else(|_| "[]".to_string()),
        })
    }

    fn foreground(&self, image: &DynamicImage, image_id: &str) -> Result<ForegroundMask, ModelError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ModelError::Unavailable(format!("empty image for {image_id}")));
        }
        let (cx0, cy0) = (w / 4, h / 4);
        let (cw, ch) = ((w / 2).max(1), (h / 2).max(1));
        let center = image.crop_imm(cx0, cy0, cw, ch);
        let center_density = edge_density(&center);
        let overall_density = edge_density(image).max(f32::EPSILON);
        let foreground_pct = (center_density / (center_density + overall_density) * 100.0).clamp(0.0, 100.0);
        Ok(ForegroundMask {
            image_id: image_id.to_string(),
            foreground_pct,
            background_pct: 100.0 - foreground_pct,
            mean_edge_gradient: overall_density,
            centroid: (50.0, 50.0),
            bbox: [25.0, 25.0, 75.0, 75.0],
        })
    }

    fn saliency(&self, image: &DynamicImage, image_id: &str) -> Result<SaliencyMap, ModelError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ModelError::Unavailable(format!("empty image for {image_id}")));
        }
        let grid = 3u32;
        let (cw, ch) = ((w / grid).max(1), (h / grid).max(1));
        let mut grid_vals = [0f32; 9];
        for gy in 0..grid {
            for gx in 0..grid {
                let cell_w = cw.min(w.saturating_sub(gx * cw)).max(1);
                let cell_h = ch.min(h.saturating_sub(gy * ch)).max(1);
                let cell = image.crop_imm((gx * cw).min(w - 1), (gy * ch).min(h - 1), cell_w, cell_h);
                grid_vals[(gy * grid + gx) as usize] = edge_density(&cell);
            }
        }
        let (mut peak_idx, mut peak_value) = (4usize, grid_vals[4]);
        for (i, v) in grid_vals.iter().enumerate() {
            if *v > peak_value {
                peak_value = *v;
                peak_idx = i;
            }
        }
        let (px, py) = ((peak_idx % 3) as f32, (peak_idx / 3) as f32);
        let peak = ((px + 0.5) / 3.0 * 100.0, (py + 0.5) / 3.0 * 100.0);
        let sum: f32 = grid_vals.iter().sum::<f32>().max(f32::EPSILON);
        let entropy = -grid_vals
            .iter()
            .map(|v| {
                let p = v / sum;
                if p > 0.0 {
                    p * p.log2()
                } else {
                    0.0
                }
            })
            .sum::<f32>();
        let center_bias_ratio = grid_vals[4] / sum;
        let quadrant_means = [
            (grid_vals[0] + grid_vals[1]) / 2.0,
            (grid_vals[2] + grid_vals[5]) / 2.0,
            (grid_vals[3] + grid_vals[6]) / 2.0,
            (grid_vals[7] + grid_vals[8]) / 2.0,
        ];
        Ok(SaliencyMap {
            image_id: image_id.to_string(),
            peak,
            peak_value,
            entropy,
            center_bias_ratio,
            rule_of_thirds_grid: grid_vals,
            quadrant_means,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn sky_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, image::Rgb([60, 90, 200])))
    }

    #[test]
    fn test_depth_percentages_sum_to_100() {
        let backend = DeterministicVisionBackend;
        let d = backend.depth(&sky_image(), "id-1").unwrap();
        assert!((d.near_pct + d.mid_pct + d.far_pct - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_scene_environment_is_closed_set() {
        let backend = DeterministicVisionBackend;
        let s = backend.scene(&sky_image(), "id-1").unwrap();
        assert!(["indoor", "outdoor", "unknown"].contains(&s.environment.as_str()));
    }

    #[test]
    fn test_aesthetic_label_matches_score_bucket() {
        let backend = DeterministicVisionBackend;
        let a = backend.aesthetic(&sky_image(), "id-1").unwrap();
        assert!((1.0..=10.0).contains(&a.score));
    }

    #[test]
    fn test_tags_respect_confidence_floor() {
        let backend = DeterministicVisionBackend;
        let tags = backend.tags(&sky_image(), "id-1").unwrap();
        assert!(tags.iter().all(|t| t.confidence >= 0.25));
    }

    #[test]
    fn test_ocr_and_faces_default_empty() {
        let backend = DeterministicVisionBackend;
        assert!(backend.ocr(&sky_image(), "id-1").unwrap().is_empty());
        assert!(backend.faces(&sky_image(), "id-1").unwrap().is_empty());
    }

    #[test]
    fn test_saliency_grid_sums_cover_whole_image() {
        let backend = DeterministicVisionBackend;
        let s = backend.saliency(&sky_image(), "id-1").unwrap();
        assert!(s.peak.0 >= 0.0 && s.peak.0 <= 100.0);
        assert!(s.peak.1 >= 0.0 && s.peak.1 <= 100.0);
    }

    #[test]
    fn test_foreground_percentages_complementary() {
        let backend = DeterministicVisionBackend;
        let f = backend.foreground(&sky_image(), "id-1").unwrap();
        assert!((f.foreground_pct + f.background_pct - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_segments_count_at_least_one() {
        let backend = DeterministicVisionBackend;
        let seg = backend.segments(&sky_image(), "id-1").unwrap();
        assert!(seg.segment_count >= 1);
    }
}
