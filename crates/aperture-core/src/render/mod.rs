//! Tier Renderer (C4): decode one source image, emit a pyramid of resized,
//! sharpened, quality-controlled encoded outputs (§4.4).

mod decode;
mod encode;
mod raw;
mod resize;

pub use decode::{decode_source, DecodedSource};
pub use encode::encode_tier;
pub use resize::{resize_to_long_edge, unsharp_mask};

use std::path::{Path, PathBuf};

use crate::config::{Config, TierSpec};
use crate::error::RenderError;
use image::DynamicImage;

/// One rendered tier file, ready to be upserted as a `Tier` row.
pub struct RenderedTier {
    pub tier_name: String,
    pub format: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Render every configured `(tier, format)` pair for one decoded image,
/// writing under `<rendered_dir>/<tier>/<format>/<id>.<ext>` via
/// write-to-temp-then-rename (§4.4 Contract: atomic).
///
/// `id` is the image identifier for originals or the variant identifier for
/// variants (§4.4 Encoding: no category/subcategory nesting).
pub fn render_tiers(
    config: &Config,
    id: &str,
    image: &DynamicImage,
    tiers: &std::collections::HashMap<String, TierSpec>,
    force: bool,
) -> Result<Vec<RenderedTier>, RenderError> {
    let mut out = Vec::new();
    let rendered_root = config.rendered_dir();

    for (tier_name, spec) in tiers {
        let resized = resize_to_long_edge(image, spec.long_edge);
        let sharpened = match spec.unsharp {
            Some(u) => unsharp_mask(&resized, u.radius, u.amount, u.threshold),
            None => resized,
        };
        let (w, h) = (sharpened.width(), sharpened.height());

        let formats: Vec<(&str, u8)> = {
            let mut v = vec![("jpeg", spec.jpeg_quality)];
            if let Some(wq) = spec.webp_quality {
                v.push(("webp", wq));
            }
            v
        };

        for (format, quality) in formats {
            let ext = if format == "jpeg" { "jpg" } else { "webp" };
            let dir = rendered_root.join(tier_name).join(format);
            let final_path = dir.join(format!("{id}.{ext}"));

            if !force && final_path.exists() {
                if let Ok(meta) = std::fs::metadata(&final_path) {
                    out.push(RenderedTier {
                        tier_name: tier_name.clone(),
                        format: format.to_string(),
                        path: final_path.clone(),
                        width: w,
                        height: h,
                        bytes: meta.len(),
                    });
                    continue;
                }
            }

            std::fs::create_dir_all(&dir).map_err(RenderError::Io)?;
            let bytes = encode_tier(&sharpened, format, quality, spec.progressive)?;

            let tmp_path = temp_path(&final_path);
            std::fs::write(&tmp_path, &bytes).map_err(RenderError::Io)?;
            std::fs::rename(&tmp_path, &final_path).map_err(RenderError::Io)?;

            out.push(RenderedTier {
                tier_name: tier_name.clone(),
                format: format.to_string(),
                path: final_path,
                width: w,
                height: h,
                bytes: bytes.len() as u64,
            });
        }
    }

    Ok(out)
}

fn temp_path(final_path: &Path) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use image::{DynamicImage, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_render_tiers_writes_expected_files() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();

        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 60));
        let mut tiers = std::collections::HashMap::new();
        tiers.insert(
            "thumb".to_string(),
            crate::config::TierSpec {
                long_edge: 50,
                jpeg_quality: 80,
                webp_quality: Some(75),
                progressive: false,
                chroma_subsampling: 420,
                unsharp: None,
            },
        );

        let result = render_tiers(&config, "test-id", &image, &tiers, false).unwrap();
        assert_eq!(result.len(), 2);
        for tier in &result {
            assert!(tier.path.exists());
            assert!(tier.width <= 50 && tier.height <= 50);
        }
    }

    #[test]
    fn test_render_tiers_is_idempotent_without_force() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.general.root = dir.path().to_path_buf();

        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 40));
        let mut tiers = std::collections::HashMap::new();
        tiers.insert(
            "micro".to_string(),
            crate::config::TierSpec {
                long_edge: 20,
                jpeg_quality: 70,
                webp_quality: None,
                progressive: false,
                chroma_subsampling: 420,
                unsharp: None,
            },
        );

        let first = render_tiers(&config, "id", &image, &tiers, false).unwrap();
        let mtime_first = std::fs::metadata(&first[0].path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = render_tiers(&config, "id", &image, &tiers, false).unwrap();
        let mtime_second = std::fs::metadata(&second[0].path).unwrap().modified().unwrap();
        assert_eq!(mtime_first, mtime_second);
    }
}
