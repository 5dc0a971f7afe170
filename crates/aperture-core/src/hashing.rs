//! Content and perceptual hashing (§4.3 content identity, §4.5 `hashes`).
//! Adapted from the teacher's pipeline hasher: BLAKE3 for exact dedup,
//! a perceptual hash for near-duplicate detection.

use blake3::Hasher as Blake3Hasher;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// BLAKE3 hash of a file's bytes, streamed so large originals don't need
/// to be loaded whole.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Blake3Hasher::new();
    let mut buffer = [0u8; 65536];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn hasher_for(alg: HashAlg) -> image_hasher::Hasher<Box<[u8]>> {
    HasherConfig::new().hash_alg(alg).hash_size(16, 16).to_hasher()
}

/// The four perceptual hashes §4.5 `hashes` records (p/a/d/w), each base64.
pub fn perceptual_hashes(image: &DynamicImage) -> (String, String, String, String) {
    let phash = hasher_for(HashAlg::Gradient).hash_image(image).to_base64();
    let ahash = hasher_for(HashAlg::Mean).hash_image(image).to_base64();
    let dhash = hasher_for(HashAlg::DoubleGradient).hash_image(image).to_base64();
    let whash = hasher_for(HashAlg::Blockhash).hash_image(image).to_base64();
    (phash, ahash, dhash, whash)
}

pub fn perceptual_distance(hash1: &str, hash2: &str) -> Option<u32> {
    let h1 = ImageHash::<Vec<u8>>::from_base64(hash1).ok()?;
    let h2 = ImageHash::<Vec<u8>>::from_base64(hash2).ok()?;
    Some(h1.dist(&h2))
}

/// Sharpness/blur estimate from the Laplacian variance of a downsampled
/// grayscale copy: higher variance means a sharper image.
pub fn sharpness_score(image: &DynamicImage) -> f32 {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    let mut n = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = gray.get_pixel(x, y)[0] as f64;
            let up = gray.get_pixel(x, y - 1)[0] as f64;
            let down = gray.get_pixel(x, y + 1)[0] as f64;
            let left = gray.get_pixel(x - 1, y)[0] as f64;
            let right = gray.get_pixel(x + 1, y)[0] as f64;
            let lap = up + down + left + right - 4.0 * center;
            sum += lap;
            sum_sq += lap * lap;
            n += 1;
        }
    }
    if n == 0 {
        return 0.0;
    }
    let mean = sum / n as f64;
    let variance = sum_sq / n as f64 - mean * mean;
    variance.max(0.0) as f32
}

/// Shannon entropy of the grayscale histogram, bits per pixel (0-8).
pub fn entropy(image: &DynamicImage) -> f32 {
    let gray = image.to_luma8();
    let mut hist = [0u64; 256];
    let mut total = 0u64;
    for p in gray.pixels() {
        hist[p[0] as usize] += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let mut h = 0f64;
    for &count in &hist {
        if count > 0 {
            let p = count as f64 / total as f64;
            h -= p * p.log2();
        }
    }
    h as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_perceptual_hash_consistency() {
        let img = DynamicImage::new_rgb8(100, 100);
        let (p1, a1, d1, w1) = perceptual_hashes(&img);
        let (p2, a2, d2, w2) = perceptual_hashes(&img);
        assert_eq!((p1, a1, d1, w1), (p2, a2, d2, w2));
    }

    #[test]
    fn test_perceptual_distance_identical_is_zero() {
        let img = DynamicImage::new_rgb8(100, 100);
        let (p, ..) = perceptual_hashes(&img);
        assert_eq!(perceptual_distance(&p, &p), Some(0));
    }

    #[test]
    fn test_sharpness_is_zero_for_flat_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, image::Rgb([10, 10, 10])));
        assert_eq!(sharpness_score(&img), 0.0);
    }

    #[test]
    fn test_entropy_is_zero_for_flat_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, image::Rgb([10, 10, 10])));
        assert_eq!(entropy(&img), 0.0);
    }
}
