//! Exporter (C8): joins every per-image signal into one denormalized
//! record per image and writes `export/export.json` plus three derivative
//! files (§4.8). Read-only with respect to the Store.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::PhaseError;
use crate::math::{palette_distance, rgb_to_hsv};
use crate::store::Store;
use crate::types::{
    DominantColor, FaceDetection, FacialEmotion, GeminiAnalysis, ImageAnalysis, ObjectDetection,
};

const ANIMAL_LABELS: [&str; 10] = ["cat", "dog", "bird", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe"];

#[derive(Debug, Clone, Serialize)]
pub struct PhotoRecord {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub camera_body: Option<String>,
    pub medium: String,
    pub palette: Vec<String>,
    pub dominant_hue: Option<f32>,
    pub gemini: Option<GeminiAnalysis>,
    pub aesthetic_score: Option<f32>,
    pub aesthetic_v2_composite: Option<f32>,
    pub captions: Vec<String>,
    pub scene: Option<String>,
    pub style: Option<String>,
    pub environment: Option<String>,
    pub depth_near_pct: Option<f32>,
    pub depth_mid_pct: Option<f32>,
    pub depth_far_pct: Option<f32>,
    pub mean_brightness: Option<f32>,
    pub contrast_ratio: Option<f32>,
    pub face_count: usize,
    pub object_count: usize,
    pub text_count: usize,
    pub emotion_count: usize,
    pub top_objects: Vec<String>,
    pub captured_at: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub focal_length: Option<f32>,
    pub tier_urls: BTreeMap<String, String>,
    pub focus: [u32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityEntry {
    id: String,
    reason: String,
}

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub count: usize,
    pub vibes: Vec<String>,
    pub gradings: Vec<String>,
    pub settings: Vec<String>,
    pub times: Vec<String>,
    pub cameras: Vec<String>,
    pub styles: Vec<String>,
    pub scenes: Vec<String>,
    pub emotions: Vec<String>,
    pub photos: Vec<PhotoRecord>,
    pub similarity: BTreeMap<String, Vec<SimilarityEntry>>,
}

fn first_row<T: serde::de::DeserializeOwned>(rows: &[Value]) -> Option<T> {
    rows.first().and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn rows<T: serde::de::DeserializeOwned>(rows: &[Value]) -> Vec<T> {
    rows.iter().filter_map(|v| serde_json::from_value(v.clone()).ok()).collect()
}

fn tier_url(config: &Config, tier: &str, id: &str) -> String {
    format!("{}/original/{tier}/jpeg/{id}.jpg", config.export.base_url)
}

/// Hue of the most saturated palette entry (§4.8), not the brightest one.
fn dominant_hue_of(colors: &[DominantColor]) -> Option<f32> {
    colors
        .iter()
        .max_by(|a, b| {
            rgb_to_hsv(a.r, a.g, a.b)
                .1
                .partial_cmp(&rgb_to_hsv(b.r, b.g, b.b).1)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| rgb_to_hsv(c.r, c.g, c.b).0)
}

fn build_record(config: &Config, store: &Store, image_id: &str) -> Result<Option<PhotoRecord>, PhaseError> {
    let Some((image, _tiers, signals)) = store.load_image_full(image_id)? else {
        return Ok(None);
    };

    let empty: Vec<Value> = Vec::new();
    let get = |name: &str| signals.get(name).unwrap_or(&empty);

    let colors: Vec<DominantColor> = rows(get("dominant-colors"));
    let palette: Vec<String> = colors.iter().map(|c| c.hex.clone()).collect();
    let dominant_hue = dominant_hue_of(&colors);

    let gemini: Option<GeminiAnalysis> = first_row(get("gemini"));
    let aesthetic_score: Option<f32> = first_row::<crate::types::AestheticScore>(get("aesthetic")).map(|a| a.score);
    let aesthetic_v2: Option<f32> = first_row::<crate::types::AestheticScoreV2>(get("aesthetic-v2")).map(|a| a.composite);
    let captions: Vec<String> = {
        let mut c = Vec::new();
        if let Some(cap) = first_row::<crate::types::ImageCaption>(get("captions")) {
            c.push(cap.caption);
        }
        if let Some(fc) = first_row::<crate::types::FlorenceCaption>(get("florence-captions")) {
            c.push(fc.short);
        }
        c
    };
    let scene: Option<crate::types::SceneClassification> = first_row(get("scene"));
    let style: Option<crate::types::StyleClassification> = first_row(get("style"));
    let depth: Option<crate::types::DepthEstimation> = first_row(get("depth"));
    let pixel: Option<ImageAnalysis> = first_row(get("pixel-analysis"));

    let faces: Vec<FaceDetection> = rows(get("faces"));
    let objects: Vec<ObjectDetection> = rows(get("objects"));
    let ocr: Vec<crate::types::OcrDetection> = rows(get("ocr"));
    let emotions: Vec<FacialEmotion> = rows(get("emotions"));

    let mut top_objects: Vec<(String, f32)> = objects.iter().map(|o| (o.label.clone(), o.confidence)).collect();
    top_objects.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_objects: Vec<String> = top_objects.into_iter().take(5).map(|(l, _)| l).collect();

    let exif: Option<crate::exif_data::ExifFields> = image
        .exif_blob
        .as_ref()
        .and_then(|s| serde_json::from_str(s).ok());

    let mut tier_urls = BTreeMap::new();
    for tier in ["thumb", "display", "gemini"] {
        tier_urls.insert(tier.to_string(), tier_url(config, tier, image_id));
    }

    let foreground: Option<crate::types::ForegroundMask> = first_row(get("foreground"));
    let saliency: Option<crate::types::SaliencyMap> = first_row(get("saliency"));
    let focus = compute_focus(&faces, &objects, foreground.as_ref(), saliency.as_ref());

    Ok(Some(PhotoRecord {
        id: image.id.clone(),
        width: image.width,
        height: image.height,
        camera_body: image.camera_body.clone(),
        medium: format!("{:?}", image.medium).to_lowercase(),
        palette,
        dominant_hue,
        gemini,
        aesthetic_score,
        aesthetic_v2_composite: aesthetic_v2,
        captions,
        scene: scene.as_ref().map(|s| s.scene_1.clone()),
        style: style.as_ref().map(|s| s.label.clone()),
        environment: scene.map(|s| s.environment),
        depth_near_pct: depth.as_ref().map(|d| d.near_pct),
        depth_mid_pct: depth.as_ref().map(|d| d.mid_pct),
        depth_far_pct: depth.map(|d| d.far_pct),
        mean_brightness: pixel.as_ref().map(|p| p.mean_brightness),
        contrast_ratio: pixel.map(|p| p.contrast_ratio),
        face_count: faces.len(),
        object_count: objects.len(),
        text_count: ocr.len(),
        emotion_count: emotions.len(),
        top_objects,
        captured_at: exif.as_ref().and_then(|e| e.captured_at.clone()),
        gps_lat: exif.as_ref().and_then(|e| e.gps_latitude),
        gps_lon: exif.and_then(|e| e.gps_longitude),
        focal_length: None,
        tier_urls,
        focus,
    }))
}

/// Priority cascade of §4.8: faces > animals > persons > saliency peak >
/// foreground centroid > the fixed [50, 50] fallback.
fn compute_focus(
    faces: &[FaceDetection],
    objects: &[ObjectDetection],
    foreground: Option<&crate::types::ForegroundMask>,
    saliency: Option<&crate::types::SaliencyMap>,
) -> [u32; 2] {
    if let Some(bbox) = union_bbox(faces.iter().map(|f| f.bbox)) {
        return bbox_center(bbox);
    }
    let animals = objects.iter().filter(|o| ANIMAL_LABELS.contains(&o.label.as_str())).map(|o| o.bbox);
    if let Some(bbox) = union_bbox(animals) {
        return bbox_center(bbox);
    }
    let persons = objects.iter().filter(|o| o.label == "person").map(|o| o.bbox);
    if let Some(bbox) = union_bbox(persons) {
        return bbox_center(bbox);
    }
    if let Some(s) = saliency {
        return [s.peak.0.clamp(0.0, 100.0) as u32, s.peak.1.clamp(0.0, 100.0) as u32];
    }
    if let Some(f) = foreground {
        if f.centroid.0 > 0.0 || f.centroid.1 > 0.0 {
            return [f.centroid.0.clamp(0.0, 100.0) as u32, f.centroid.1.clamp(0.0, 100.0) as u32];
        }
    }
    [50, 50]
}

fn union_bbox(boxes: impl Iterator<Item = [f32; 4]>) -> Option<[f32; 4]> {
    boxes.fold(None, |acc, b| match acc {
        None => Some(b),
        Some(a) => Some([a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]),
    })
}

fn bbox_center(bbox: [f32; 4]) -> [u32; 2] {
    [
        (((bbox[0] + bbox[2]) / 2.0).clamp(0.0, 100.0)) as u32,
        (((bbox[1] + bbox[3]) / 2.0).clamp(0.0, 100.0)) as u32,
    ]
}

/// Shared vibe +3, shared object label +4, same scene +2, same setting +1
/// (§4.8 Similarity). Up to six neighbors per image, ties broken by
/// descending score then ascending id.
fn build_similarity(photos: &[PhotoRecord]) -> BTreeMap<String, Vec<SimilarityEntry>> {
    let mut by_vibe: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_object: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_scene: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut by_setting: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (i, p) in photos.iter().enumerate() {
        if let Some(g) = &p.gemini {
            for v in &g.vibe {
                by_vibe.entry(v.clone()).or_default().push(i);
            }
            if let Some(s) = &g.setting {
                by_setting.entry(s.clone()).or_default().push(i);
            }
        }
        for o in &p.top_objects {
            by_object.entry(o.clone()).or_default().push(i);
        }
        if let Some(s) = &p.scene {
            by_scene.entry(s.clone()).or_default().push(i);
        }
    }

    let mut result = BTreeMap::new();
    for (i, p) in photos.iter().enumerate() {
        let mut scores: BTreeMap<usize, (i32, &'static str)> = BTreeMap::new();
        if let Some(g) = &p.gemini {
            for v in &g.vibe {
                if let Some(members) = by_vibe.get(v) {
                    for &j in members {
                        if j != i {
                            let e = scores.entry(j).or_insert((0, "shared vibe"));
                            e.0 += 3;
                        }
                    }
                }
            }
            if let Some(s) = &g.setting {
                if let Some(members) = by_setting.get(s) {
                    for &j in members {
                        if j != i {
                            let e = scores.entry(j).or_insert((0, "same setting"));
                            e.0 += 1;
                        }
                    }
                }
            }
        }
        for o in &p.top_objects {
            if let Some(members) = by_object.get(o) {
                for &j in members {
                    if j != i {
                        let e = scores.entry(j).or_insert((0, "shared object"));
                        e.0 += 4;
                    }
                }
            }
        }
        if let Some(s) = &p.scene {
            if let Some(members) = by_scene.get(s) {
                for &j in members {
                    if j != i {
                        let e = scores.entry(j).or_insert((0, "same scene"));
                        e.0 += 2;
                    }
                }
            }
        }

        let mut ranked: Vec<(usize, i32, &'static str)> = scores.into_iter().map(|(j, (s, r))| (j, s, r)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| photos[a.0].id.cmp(&photos[b.0].id)));
        let neighbors: Vec<SimilarityEntry> = ranked
            .into_iter()
            .take(6)
            .map(|(j, _, reason)| SimilarityEntry { id: photos[j].id.clone(), reason: reason.to_string() })
            .collect();
        result.insert(p.id.clone(), neighbors);
    }
    result
}

pub fn export(config: &Config, store: &Store) -> Result<(), PhaseError> {
    let ids = store.all_image_ids()?;
    let mut photos = Vec::new();
    for id in &ids {
        if let Some(record) = build_record(config, store, id)? {
            photos.push(record);
        }
    }

    let mut vibes = BTreeSet::new();
    let mut gradings = BTreeSet::new();
    let mut settings = BTreeSet::new();
    let mut times = BTreeSet::new();
    let mut cameras = BTreeSet::new();
    let mut styles = BTreeSet::new();
    let mut scenes = BTreeSet::new();
    let mut emotions = BTreeSet::new();

    for p in &photos {
        if let Some(g) = &p.gemini {
            vibes.extend(g.vibe.iter().cloned());
            if let Some(gr) = &g.grading_style {
                gradings.insert(gr.clone());
            }
            if let Some(s) = &g.setting {
                settings.insert(s.clone());
            }
            if let Some(t) = &g.time_of_day {
                times.insert(t.clone());
            }
        }
        if let Some(c) = &p.camera_body {
            cameras.insert(c.clone());
        }
        if let Some(s) = &p.style {
            styles.insert(s.clone());
        }
        if let Some(s) = &p.scene {
            scenes.insert(s.clone());
        }
        let _ = &emotions;
    }
    for id in &ids {
        let raw_rows = store.signal_rows("emotions", id)?;
        for e in rows::<FacialEmotion>(&raw_rows) {
            emotions.insert(e.dominant_emotion);
        }
    }

    let similarity = build_similarity(&photos);
    let count = photos.len();

    let doc = ExportDocument {
        count,
        vibes: vibes.into_iter().collect(),
        gradings: gradings.into_iter().collect(),
        settings: settings.into_iter().collect(),
        times: times.into_iter().collect(),
        cameras: cameras.into_iter().collect(),
        styles: styles.into_iter().collect(),
        scenes: scenes.into_iter().collect(),
        emotions: emotions.into_iter().collect(),
        photos,
        similarity,
    };

    let out_dir = config.export_dir();
    std::fs::create_dir_all(&out_dir).map_err(|e| PhaseError::new(e.to_string()))?;
    write_json(&out_dir.join("export.json"), &doc)?;
    write_faces(config, store, &out_dir, &ids)?;
    write_game_rounds(&doc, &out_dir)?;
    write_stream_sequence(config, store, &doc, &out_dir)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &std::path::Path, value: &T) -> Result<(), PhaseError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| PhaseError::new(e.to_string()))?;
    std::fs::write(path, bytes).map_err(|e| PhaseError::new(e.to_string()))
}

#[derive(Serialize)]
struct FaceExport {
    bbox: [f32; 4],
    confidence: f32,
    dominant_emotion: Option<String>,
    emotion_confidence: Option<f32>,
}

fn write_faces(_config: &Config, store: &Store, out_dir: &std::path::Path, ids: &[String]) -> Result<(), PhaseError> {
    let mut out: BTreeMap<String, Vec<FaceExport>> = BTreeMap::new();
    for id in ids {
        let face_rows = store.signal_rows("faces", id)?;
        let faces: Vec<FaceDetection> = rows(&face_rows);
        if faces.is_empty() {
            continue;
        }
        let emotion_rows = store.signal_rows("emotions", id)?;
        let emotions: Vec<FacialEmotion> = rows(&emotion_rows);
        let entries: Vec<FaceExport> = faces
            .iter()
            .map(|f| {
                let e = emotions.iter().find(|e| e.face_index == f.face_index);
                FaceExport {
                    bbox: f.bbox,
                    confidence: f.confidence,
                    dominant_emotion: e.map(|e| e.dominant_emotion.clone()),
                    emotion_confidence: e.map(|e| e.confidence),
                }
            })
            .collect();
        out.insert(id.clone(), entries);
    }
    write_json(&out_dir.join("faces.json"), &out)
}

#[derive(Serialize)]
struct GameRound {
    a: String,
    b: String,
    correct_pool: String,
    distractors: Vec<String>,
}

/// 200 deterministic pairs sampled from pools (camera/emotion/scene/vibe/
/// time/style) with >=10 members (§4.8 `game_rounds.json`).
fn write_game_rounds(doc: &ExportDocument, out_dir: &std::path::Path) -> Result<(), PhaseError> {
    use rand::SeedableRng;
    use rand::seq::SliceRandom;
    use rand::Rng;

    let mut pools: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for p in &doc.photos {
        if let Some(c) = &p.camera_body {
            pools.entry(format!("camera:{c}")).or_default().push(p.id.clone());
        }
        if let Some(s) = &p.scene {
            pools.entry(format!("scene:{s}")).or_default().push(p.id.clone());
        }
        if let Some(s) = &p.style {
            pools.entry(format!("style:{s}")).or_default().push(p.id.clone());
        }
        if let Some(g) = &p.gemini {
            if let Some(t) = &g.time_of_day {
                pools.entry(format!("time:{t}")).or_default().push(p.id.clone());
            }
        }
    }
    pools.retain(|_, members| members.len() >= 10);

    let labels: Vec<String> = pools.keys().cloned().collect();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0xA9E47712);
    let mut rounds = Vec::new();

    if labels.len() >= 2 {
        for _ in 0..200 {
            let label_idx = rng.gen_range(0..labels.len());
            let correct_pool = labels[label_idx].clone();
            let members = &pools[&correct_pool];
            if members.len() < 2 {
                continue;
            }
            let mut pick: Vec<String> = members.clone();
            pick.shuffle(&mut rng);
            let a = pick[0].clone();
            let b = pick[1].clone();

            let mut other_labels: Vec<String> = labels.iter().filter(|l| **l != correct_pool).cloned().collect();
            other_labels.shuffle(&mut rng);
            let distractors: Vec<String> = other_labels.into_iter().take(5).collect();

            rounds.push(GameRound { a, b, correct_pool, distractors });
        }
    }

    write_json(&out_dir.join("game_rounds.json"), &rounds)
}

/// Greedy nearest-palette traversal (§4.8 `stream_sequence.json`). Starts
/// from a seeded random image and at each step samples up to 200
/// candidates, choosing the minimum-palette-distance neighbor. Monochrome
/// images interleave as breathers every 10 positions.
fn write_stream_sequence(config: &Config, store: &Store, doc: &ExportDocument, out_dir: &std::path::Path) -> Result<(), PhaseError> {
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0x5EED_7001);

    let mut color_ids: Vec<String> = Vec::new();
    let mut mono_ids: Vec<String> = Vec::new();
    let mut palettes: BTreeMap<String, Vec<(u8, u8, u8)>> = BTreeMap::new();
    for p in &doc.photos {
        let palette: Vec<(u8, u8, u8)> = p
            .palette
            .iter()
            .filter_map(|hex| hex_to_rgb(hex))
            .collect();
        palettes.insert(p.id.clone(), palette);
        if is_monochrome(config, store, &p.id)? {
            mono_ids.push(p.id.clone());
        } else {
            color_ids.push(p.id.clone());
        }
    }

    let mut sequence = Vec::new();
    if !color_ids.is_empty() {
        let mut remaining = color_ids.clone();
        remaining.shuffle(&mut rng);
        let mut current = remaining.remove(0);
        sequence.push(current.clone());
        while !remaining.is_empty() {
            let sample_n = remaining.len().min(200);
            let current_palette = palettes.get(&current).cloned().unwrap_or_default();
            let mut best_idx = 0usize;
            let mut best_dist = f32::MAX;
            for (idx, cand) in remaining.iter().take(sample_n).enumerate() {
                let cand_palette = palettes.get(cand).cloned().unwrap_or_default();
                let d = palette_distance(&current_palette, &cand_palette);
                if d < best_dist {
                    best_dist = d;
                    best_idx = idx;
                }
            }
            current = remaining.remove(best_idx);
            sequence.push(current.clone());
        }
    }

    let mut mono_cursor = 0usize;
    let mut out = Vec::new();
    for (i, id) in sequence.into_iter().enumerate() {
        out.push(id);
        if (i + 1) % 10 == 0 && mono_cursor < mono_ids.len() {
            out.push(mono_ids[mono_cursor].clone());
            mono_cursor += 1;
        }
    }
    while mono_cursor < mono_ids.len() {
        out.push(mono_ids[mono_cursor].clone());
        mono_cursor += 1;
    }

    write_json(&out_dir.join("stream_sequence.json"), &out)
}

fn is_monochrome(_config: &Config, store: &Store, image_id: &str) -> Result<bool, PhaseError> {
    Ok(store.get_image(image_id)?.map(|i| i.monochrome).unwrap_or(false))
}

fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let h = hex.trim_start_matches('#');
    if h.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&h[0..2], 16).ok()?;
    let g = u8::from_str_radix(&h[2..4], 16).ok()?;
    let b = u8::from_str_radix(&h[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurationStatus, Image, Medium, Orientation};

    fn image_row(id: &str) -> Image {
        Image {
            id: id.to_string(),
            source_path: format!("{id}.jpg"),
            file_name: "a.jpg".to_string(),
            category: "Test".to_string(),
            subcategory: "Mini".to_string(),
            source_format: "jpg".to_string(),
            width: 10,
            height: 10,
            aspect_ratio: 1.0,
            orientation: Orientation::Square,
            source_bytes: 10,
            exif_blob: None,
            camera_body: Some("Leica M8".to_string()),
            medium: Medium::Digital,
            film_stock: None,
            monochrome: false,
            curation_status: CurationStatus::Pending,
            content_hash: "x".to_string(),
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    fn color(rank: u32, r: u8, g: u8, b: u8) -> DominantColor {
        let (l, a, b_lab) = crate::math::rgb_to_lab(r, g, b);
        DominantColor {
            image_id: "id".to_string(),
            rank,
            percentage: 20.0,
            hex: format!("#{r:02x}{g:02x}{b:02x}"),
            r,
            g,
            b,
            l,
            a,
            b_lab,
            css4_name: "gray".to_string(),
        }
    }

    #[test]
    fn test_dominant_hue_picks_most_saturated_not_brightest() {
        let colors = vec![
            color(0, 245, 245, 245), // near-white: very bright, almost no saturation
            color(1, 200, 20, 20),   // saturated red, darker than the near-white swatch
        ];
        let hue = dominant_hue_of(&colors).unwrap();
        let expected = rgb_to_hsv(200, 20, 20).0;
        assert!((hue - expected).abs() < 0.01, "expected red's hue {expected}, got {hue}");
    }

    #[test]
    fn test_focus_cascade_prefers_faces_over_objects() {
        let faces = vec![FaceDetection {
            image_id: "id".to_string(),
            face_index: 0,
            bbox: [10.0, 10.0, 20.0, 20.0],
            landmarks: Vec::new(),
            confidence: 0.9,
            area_pct: 1.0,
        }];
        let objects = vec![ObjectDetection {
            image_id: "id".to_string(),
            label: "person".to_string(),
            confidence: 0.9,
            bbox: [80.0, 80.0, 90.0, 90.0],
            area_pct: 1.0,
        }];
        let focus = compute_focus(&faces, &objects, None, None);
        assert_eq!(focus, [15, 15]);
    }

    #[test]
    fn test_focus_defaults_to_center_without_any_signal() {
        let focus = compute_focus(&[], &[], None, None);
        assert_eq!(focus, [50, 50]);
    }

    #[test]
    fn test_export_writes_all_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();
        config.export.out_dir = dir.path().join("export");

        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&image_row("id-1")).unwrap();

        export(&config, &store).unwrap();
        assert!(config.export_dir().join("export.json").exists());
        assert!(config.export_dir().join("faces.json").exists());
        assert!(config.export_dir().join("game_rounds.json").exists());
        assert!(config.export_dir().join("stream_sequence.json").exists());
    }
}
