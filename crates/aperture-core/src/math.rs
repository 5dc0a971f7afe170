//! Shared math utilities: vector normalization, color space conversion,
//! K-means clustering for dominant colors, and the stable hash used for
//! phase sharding (§C5).

use std::hash::Hasher as _;
use twox_hash::XxHash64;

/// §C5: `stable_hash(id) mod M == N` for sharding. Fixed 64-bit
/// non-cryptographic hash, seeded with 0 so it is reproducible across runs
/// and processes.
pub fn stable_hash(id: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(id.as_bytes());
    hasher.finish()
}

/// sRGB (0-255 per channel) to CIE L*a*b*.
pub fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    fn to_linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    let (r, g, b) = (to_linear(r), to_linear(g), to_linear(b));

    // sRGB -> XYZ (D65).
    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    // D65 reference white.
    const XN: f32 = 0.95047;
    const YN: f32 = 1.0;
    const ZN: f32 = 1.08883;

    fn f(t: f32) -> f32 {
        const DELTA: f32 = 6.0 / 29.0;
        if t > DELTA.powi(3) {
            t.cbrt()
        } else {
            t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
        }
    }

    let (fx, fy, fz) = (f(x / XN), f(y / YN), f(z / ZN));
    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);
    (l, a, bb)
}

/// CIE L*a*b* back to sRGB (0-255 per channel, rounded and clamped).
pub fn lab_to_rgb(l: f32, a: f32, b: f32) -> (u8, u8, u8) {
    const DELTA: f32 = 6.0 / 29.0;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    fn finv(t: f32) -> f32 {
        if t > DELTA {
            t.powi(3)
        } else {
            3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
        }
    }

    const XN: f32 = 0.95047;
    const YN: f32 = 1.0;
    const ZN: f32 = 1.08883;
    let (x, y, z) = (finv(fx) * XN, finv(fy) * YN, finv(fz) * ZN);

    let r = x * 3.2404542 + y * -1.5371385 + z * -0.4985314;
    let g = x * -0.9692660 + y * 1.8760108 + z * 0.0415560;
    let bl = x * 0.0556434 + y * -0.2040259 + z * 1.0572252;

    fn to_srgb(c: f32) -> u8 {
        let c = c.clamp(0.0, 1.0);
        let s = if c <= 0.0031308 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        (s * 255.0).round().clamp(0.0, 255.0) as u8
    }

    (to_srgb(r), to_srgb(g), to_srgb(bl))
}

/// Euclidean distance between two L*a*b* points.
pub fn lab_distance(a: (f32, f32, f32), b: (f32, f32, f32)) -> f32 {
    let (dl, da, db) = (a.0 - b.0, a.1 - b.1, a.2 - b.2);
    (dl * dl + da * da + db * db).sqrt()
}

/// K-means clustering in L*a*b* space over pixel samples, returning
/// `(centroid_lab, share)` pairs sorted by descending share, where `share`
/// is the fraction of samples assigned to that cluster (§4.5 dominant-colors:
/// exactly `k` rows per image with percentages summing to 100, descending).
///
/// Deterministic: seeded by evenly spacing initial centroids across the
/// sample list rather than by random draw, so repeat runs on the same
/// decoded pixels are bit-identical.
pub fn kmeans_lab(samples: &[(f32, f32, f32)], k: usize, iterations: usize) -> Vec<((f32, f32, f32), f32)> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(samples.len());
    let step = samples.len() / k;
    let mut centroids: Vec<(f32, f32, f32)> = (0..k).map(|i| samples[i * step]).collect();

    let mut assignments = vec![0usize; samples.len()];
    for _ in 0..iterations.max(1) {
        for (i, s) in samples.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (ci, c) in centroids.iter().enumerate() {
                let d = lab_distance(*s, *c);
                if d < best_dist {
                    best_dist = d;
                    best = ci;
                }
            }
            assignments[i] = best;
        }

        let mut sums = vec![(0.0f32, 0.0f32, 0.0f32); k];
        let mut counts = vec![0usize; k];
        for (i, s) in samples.iter().enumerate() {
            let c = assignments[i];
            sums[c].0 += s.0;
            sums[c].1 += s.1;
            sums[c].2 += s.2;
            counts[c] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = (
                    sums[c].0 / counts[c] as f32,
                    sums[c].1 / counts[c] as f32,
                    sums[c].2 / counts[c] as f32,
                );
            }
        }
    }

    let mut counts = vec![0usize; k];
    for &c in &assignments {
        counts[c] += 1;
    }
    let total = samples.len() as f32;
    let mut result: Vec<((f32, f32, f32), f32)> = centroids
        .into_iter()
        .zip(counts)
        .map(|(c, n)| (c, 100.0 * n as f32 / total))
        .collect();
    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    result
}

/// sRGB (0-255 per channel) to HSV: hue in [0,360), saturation and value in [0,1].
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

/// HSV back to sRGB (0-255 per channel).
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |ch: f32| ((ch + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r1), to_u8(g1), to_u8(b1))
}

/// Palette distance (§4.8): mean over colors in `p1` of the minimum distance
/// to any color in `p2`, in sRGB space.
pub fn palette_distance(p1: &[(u8, u8, u8)], p2: &[(u8, u8, u8)]) -> f32 {
    if p1.is_empty() || p2.is_empty() {
        return f32::MAX;
    }
    let sum: f32 = p1
        .iter()
        .map(|c1| {
            p2.iter()
                .map(|c2| {
                    let (dr, dg, db) = (
                        c1.0 as f32 - c2.0 as f32,
                        c1.1 as f32 - c2.1 as f32,
                        c1.2 as f32 - c2.2 as f32,
                    );
                    (dr * dr + dg * dg + db * db).sqrt()
                })
                .fold(f32::MAX, f32::min)
        })
        .sum();
    sum / p1.len() as f32
}

/// L2-normalize a vector in place so its magnitude is 1.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// L2-normalize a slice, returning a new vector with unit magnitude.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let mut result = v.to_vec();
    l2_normalize_in_place(&mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = l2_normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_l2_normalize_in_place() {
        let mut v = vec![3.0, 4.0];
        l2_normalize_in_place(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("abc"), stable_hash("abc"));
        assert_ne!(stable_hash("abc"), stable_hash("abd"));
    }

    #[test]
    fn test_lab_roundtrip_white_and_black() {
        let (l, a, b) = rgb_to_lab(255, 255, 255);
        assert!((l - 100.0).abs() < 0.5);
        assert!(a.abs() < 0.5 && b.abs() < 0.5);
        let (r, g, bl) = lab_to_rgb(l, a, b);
        assert_eq!((r, g, bl), (255, 255, 255));

        let (l0, _, _) = rgb_to_lab(0, 0, 0);
        assert!(l0.abs() < 0.5);
    }

    #[test]
    fn test_kmeans_lab_percentages_sum_to_100_descending() {
        let samples: Vec<(f32, f32, f32)> = (0..100)
            .map(|i| {
                let color = if i < 60 {
                    rgb_to_lab(255, 0, 0)
                } else {
                    rgb_to_lab(0, 0, 255)
                };
                color
            })
            .collect();
        let clusters = kmeans_lab(&samples, 2, 5);
        assert_eq!(clusters.len(), 2);
        let sum: f32 = clusters.iter().map(|(_, pct)| pct).sum();
        assert!((sum - 100.0).abs() < 0.01);
        assert!(clusters[0].1 >= clusters[1].1);
    }

    #[test]
    fn test_hsv_roundtrip() {
        let (h, s, v) = rgb_to_hsv(200, 50, 50);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        assert!((r as i32 - 200).abs() <= 1);
        assert!((g as i32 - 50).abs() <= 1);
        assert!((b as i32 - 50).abs() <= 1);
    }

    #[test]
    fn test_palette_distance_identical_is_zero() {
        let p = [(10u8, 20u8, 30u8), (200, 100, 50)];
        assert_eq!(palette_distance(&p, &p), 0.0);
    }
}
