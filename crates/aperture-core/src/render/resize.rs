//! Resize and sharpen semantics (§4.4 Resize semantics / Sharpening).

use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// If `max(w,h) > long_edge`, resample with Lanczos-3 to `(w*r, h*r)` where
/// `r = long_edge / max(w,h)`. Otherwise copy (never upscale).
pub fn resize_to_long_edge(image: &DynamicImage, long_edge: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    let max_edge = w.max(h);
    if max_edge <= long_edge {
        return image.clone();
    }
    let ratio = long_edge as f64 / max_edge as f64;
    let new_w = ((w as f64) * ratio).round().max(1.0) as u32;
    let new_h = ((h as f64) * ratio).round().max(1.0) as u32;
    image.resize_exact(new_w, new_h, FilterType::Lanczos3)
}

/// Unsharp mask: blur with `radius`, scale the high-frequency residual by
/// `amount` percent, and only apply where the residual exceeds `threshold`
/// (§4.4 Sharpening, reused verbatim by the Enhancer's own sharpening step
/// §4.7).
pub fn unsharp_mask(image: &DynamicImage, radius: f32, amount: f32, threshold: i32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let blurred = imageproc::filter::gaussian_blur_f32(&rgb, radius.max(0.01));

    let (w, h) = rgb.dimensions();
    let mut out = rgb.clone();
    let scale = amount / 100.0;

    for y in 0..h {
        for x in 0..w {
            let orig = rgb.get_pixel(x, y);
            let blur = blurred.get_pixel(x, y);
            let mut px = *orig;
            for c in 0..3 {
                let diff = orig[c] as i32 - blur[c] as i32;
                if diff.abs() >= threshold {
                    let sharpened = orig[c] as f32 + diff as f32 * scale;
                    px[c] = sharpened.round().clamp(0.0, 255.0) as u8;
                }
            }
            out.put_pixel(x, y, px);
        }
    }

    DynamicImage::ImageRgb8(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_resize_never_upscales() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let resized = resize_to_long_edge(&image, 500);
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }

    #[test]
    fn test_resize_downscales_preserving_aspect() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let resized = resize_to_long_edge(&image, 100);
        assert_eq!(resized.width(), 100);
        assert_eq!(resized.height(), 50);
    }

    #[test]
    fn test_unsharp_mask_preserves_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let sharpened = unsharp_mask(&image, 0.5, 40.0, 2);
        assert_eq!((sharpened.width(), sharpened.height()), (40, 30));
    }
}
