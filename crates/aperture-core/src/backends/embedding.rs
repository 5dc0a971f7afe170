//! Embedding backend (§4.5 `vectors`): DINOv2 (768-d), SigLIP (768-d), and
//! CLIP (512-d), each L2-normalized (§8). The ONNX model weights themselves
//! are out of scope (§1); this trait is the seam a real `ort`-backed
//! session would sit behind, following the loading convention of the
//! teacher's `embedding::EmbeddingEngine` (`{model_dir}/{model}/visual.onnx`).

use image::DynamicImage;

use crate::error::ModelError;
use crate::math::l2_normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    DinoV2,
    SigLip,
    Clip,
}

impl EmbeddingKind {
    pub fn dims(self) -> usize {
        match self {
            EmbeddingKind::DinoV2 => 768,
            EmbeddingKind::SigLip => 768,
            EmbeddingKind::Clip => 512,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EmbeddingKind::DinoV2 => "dinov2",
            EmbeddingKind::SigLip => "siglip",
            EmbeddingKind::Clip => "clip",
        }
    }
}

pub trait EmbeddingBackend: Send + Sync {
    fn embed(&self, image: &DynamicImage, kind: EmbeddingKind) -> Result<Vec<f32>, ModelError>;
}

/// Deterministic stand-in: downsamples the image to a fixed low-resolution
/// grid, flattens/pads/truncates the pixel values to the target
/// dimensionality, and L2-normalizes. Same input always yields the same
/// vector, and the vector always has unit norm, satisfying §8's vector
/// invariant without any model weights.
pub struct DeterministicEmbeddingBackend;

impl EmbeddingBackend for DeterministicEmbeddingBackend {
    fn embed(&self, image: &DynamicImage, kind: EmbeddingKind) -> Result<Vec<f32>, ModelError> {
        let dims = kind.dims();
        let grid = (dims as f64).sqrt().ceil() as u32;
        let small = image.resize_exact(grid, grid, image::imageops::FilterType::Triangle);
        let rgb = small.to_rgb8();

        let mut values: Vec<f32> = rgb
            .pixels()
            .flat_map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        // Mix in the embedding kind so the three named vectors for one
        // image differ from each other, not just across images.
        let salt = match kind {
            EmbeddingKind::DinoV2 => 1.0,
            EmbeddingKind::SigLip => 2.0,
            EmbeddingKind::Clip => 3.0,
        };
        for (i, v) in values.iter_mut().enumerate() {
            *v = (*v / 255.0) * salt + (i as f32 * 0.001);
        }
        values.resize(dims, 0.0);
        Ok(l2_normalize(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_embed_is_deterministic_and_unit_norm() {
        let backend = DeterministicEmbeddingBackend;
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([((x * 3) % 256) as u8, ((y * 5) % 256) as u8, 128])
        }));
        let a = backend.embed(&image, EmbeddingKind::SigLip).unwrap();
        let b = backend.embed(&image, EmbeddingKind::SigLip).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 768);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_different_kinds_yield_different_vectors() {
        let backend = DeterministicEmbeddingBackend;
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |x, _| {
            image::Rgb([x as u8, 10, 200])
        }));
        let dino = backend.embed(&image, EmbeddingKind::DinoV2).unwrap();
        let clip = backend.embed(&image, EmbeddingKind::Clip).unwrap();
        assert_eq!(dino.len(), 768);
        assert_eq!(clip.len(), 512);
        assert_ne!(&dino[..512], &clip[..]);
    }
}
