//! Core data types for the aperture pipeline (§3 DATA MODEL).
//!
//! One named record type per signal family, with an explicit field list,
//! replacing the dynamically-typed dictionaries of the source this was
//! distilled from (§9 "Dynamic typing everywhere").

use serde::{Deserialize, Serialize};

/// Orientation derived from width/height (§3 Image invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        use std::cmp::Ordering;
        match width.cmp(&height) {
            Ordering::Greater => Orientation::Landscape,
            Ordering::Less => Orientation::Portrait,
            Ordering::Equal => Orientation::Square,
        }
    }
}

/// Medium of capture (§3 Image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Digital,
    Analog,
    Monochrome,
}

/// Curation status of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurationStatus {
    Pending,
    Kept,
    Rejected,
}

/// Whether a source is RAW or an already-encoded format (§4.3 Scanner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Raw,
    Encoded,
}

/// The primary per-image record (§3 Image).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub source_path: String,
    pub file_name: String,
    pub category: String,
    pub subcategory: String,
    pub source_format: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub orientation: Orientation,
    pub source_bytes: u64,
    pub exif_blob: Option<String>,
    pub camera_body: Option<String>,
    pub medium: Medium,
    pub film_stock: Option<String>,
    pub monochrome: bool,
    pub curation_status: CurationStatus,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A rendered resolution tier (§3 Tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    pub image_id: String,
    pub variant_id: Option<String>,
    pub tier_name: String,
    pub format: String,
    pub local_path: String,
    pub remote_url: Option<String>,
    pub public_url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub uploaded_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Pending,
    Success,
    Failed,
    Filtered,
}

/// A generated image-to-image derivative (§3 Variant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub image_id: String,
    pub variant_type: String,
    pub source_tier: String,
    pub status: VariantStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Parsed fields of the Gemini structured-JSON response (§6 Gemini
/// response contract), plus the raw blob (§9: retain raw, lift parsed
/// fields into columns).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiAnalysis {
    pub image_id: String,
    pub raw_json: Option<String>,
    pub error: Option<String>,
    pub exposure: Option<String>,
    pub sharpness: Option<String>,
    pub lens_artifacts: Vec<String>,
    pub technique: Option<String>,
    pub depth_note: Option<String>,
    pub geometry: Vec<String>,
    pub palette: Vec<String>,
    pub semantic_pops: Vec<String>,
    pub grading_style: Option<String>,
    pub time_of_day: Option<String>,
    pub setting: Option<String>,
    pub weather: Option<String>,
    pub faces: Option<i32>,
    pub vibe: Vec<String>,
    pub alt_text: Option<String>,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneClassification {
    pub image_id: String,
    pub scene_1: String,
    pub score_1: f32,
    pub scene_2: Option<String>,
    pub score_2: Option<f32>,
    pub scene_3: Option<String>,
    pub score_3: Option<f32>,
    pub environment: String,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleClassification {
    pub image_id: String,
    pub label: String,
    pub confidence: f32,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AestheticLabel {
    Poor,
    Average,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AestheticScore {
    pub image_id: String,
    pub score: f32,
    pub label: AestheticLabel,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AestheticLabelV2 {
    Poor,
    BelowAvg,
    Average,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AestheticScoreV2 {
    pub image_id: String,
    pub topiq: Option<f32>,
    pub musiq: Option<f32>,
    pub laion: Option<f32>,
    pub composite: f32,
    pub label: AestheticLabelV2,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    pub image_id: String,
    pub exposure_quality: Option<f32>,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthEstimation {
    pub image_id: String,
    pub near_pct: f32,
    pub mid_pct: f32,
    pub far_pct: f32,
    pub complexity: f32,
    pub analyzed_at: String,
}

/// Pixel-level statistics (§4.5 pixel-analysis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub image_id: String,
    pub mean_brightness: f32,
    pub contrast_ratio: f32,
    pub mean_r: f32,
    pub mean_g: f32,
    pub mean_b: f32,
    pub wb_shift_r: f32,
    pub wb_shift_b: f32,
    pub noise_estimate: f32,
    pub clip_low_pct: f32,
    pub clip_high_pct: f32,
    pub mean_saturation: f32,
    pub dominant_hue: f32,
    pub color_cast: String,
    pub low_key: bool,
    pub high_key: bool,
    pub analyzed_at: String,
}

/// One of the five dominant-color rows per image (§4.5 dominant-colors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantColor {
    pub image_id: String,
    pub rank: u32,
    pub percentage: f32,
    pub hex: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub l: f32,
    pub a: f32,
    pub b_lab: f32,
    pub css4_name: String,
}

/// Perceptual hashes and derived sharpness/blur/entropy (§4.5 hashes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHash {
    pub image_id: String,
    pub phash: String,
    pub ahash: String,
    pub dhash: String,
    pub whash: String,
    pub blur_score: f32,
    pub sharpness: f32,
    pub entropy: f32,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    pub image_id: String,
    pub face_index: u32,
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub confidence: f32,
    pub area_pct: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacialEmotion {
    pub image_id: String,
    pub face_index: u32,
    pub dominant_emotion: String,
    pub scores: [(String, f32); 7],
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub image_id: String,
    pub label: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
    pub area_pct: f32,
}

/// Same shape as `ObjectDetection`; open-vocabulary labels (§4.5 open-detections).
pub type OpenDetection = ObjectDetection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseDetection {
    pub image_id: String,
    pub person_index: u32,
    pub keypoints: [(f32, f32, f32); 17],
    pub bbox: [f32; 4],
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    pub image_id: String,
    pub segment_count: u32,
    pub largest_segment_pct: f32,
    pub figure_ground_ratio: f32,
    pub edge_complexity: f32,
    pub mean_segment_area_pct: f32,
    pub top_areas_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForegroundMask {
    pub image_id: String,
    pub foreground_pct: f32,
    pub background_pct: f32,
    pub mean_edge_gradient: f32,
    pub centroid: (f32, f32),
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaliencyMap {
    pub image_id: String,
    pub peak: (f32, f32),
    pub peak_value: f32,
    pub entropy: f32,
    pub center_bias_ratio: f32,
    pub rule_of_thirds_grid: [f32; 9],
    pub quadrant_means: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCaption {
    pub image_id: String,
    pub caption: String,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlorenceCaption {
    pub image_id: String,
    pub short: String,
    pub detailed: String,
    pub more_detailed: String,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrDetection {
    pub image_id: String,
    pub text: String,
    pub confidence: f32,
    pub bbox_polygon: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceIdentity {
    pub image_id: String,
    pub face_index: u32,
    pub embedding: Vec<f32>,
    pub identity_id: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTag {
    pub image_id: String,
    pub tag: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageLocation {
    pub image_id: String,
    pub lat: f64,
    pub lon: f64,
    pub source: String,
    pub confidence: f32,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderCrop {
    pub image_id: String,
    pub top_pct: f32,
    pub bottom_pct: f32,
    pub left_pct: f32,
    pub right_pct: f32,
}

/// A single enhancement step (§4.6 Recipe fields).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecipeStep {
    pub skipped: bool,
    pub params: std::collections::BTreeMap<String, f64>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planned,
    Enhanced,
    Accepted,
    Failed,
}

/// An enhancement recipe + measured pre/post metrics (§3 EnhancementPlan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementPlan {
    pub image_id: String,
    pub version: u8,
    pub pre_metrics_json: String,
    pub white_balance: RecipeStep,
    pub exposure: RecipeStep,
    pub shadow_highlight: RecipeStep,
    pub contrast: RecipeStep,
    pub saturation: RecipeStep,
    pub sharpening: RecipeStep,
    pub output_path: Option<String>,
    pub post_metrics_json: Option<String>,
    pub status: PlanStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One run of a named phase (§3 PhaseRun).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRun {
    pub run_id: i64,
    pub phase: String,
    pub status: RunStatus,
    pub processed: u64,
    pub failed: u64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error: Option<String>,
    pub config_json: Option<String>,
}

/// A file's remote destination (§3 Upload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub local_path: String,
    pub remote_path: String,
    pub bytes: u64,
    pub uploaded_at: String,
    pub verified: bool,
}

/// Aggregate counts returned by `Store::stats()` (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub table_counts: std::collections::BTreeMap<String, u64>,
    pub run_status_counts: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(3000, 2000), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(2000, 3000), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(2000, 2000), Orientation::Square);
    }

    #[test]
    fn test_aesthetic_label_v2_serde_snake_case() {
        let json = serde_json::to_string(&AestheticLabelV2::BelowAvg).unwrap();
        assert_eq!(json, "\"below_avg\"");
    }

    #[test]
    fn test_recipe_step_default_not_skipped() {
        let step = RecipeStep::default();
        assert!(!step.skipped);
        assert!(step.params.is_empty());
    }
}
