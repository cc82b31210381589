// ABOUTME: Quality filters that reject blank, misshapen, over-compressed, or avatar images.
// ABOUTME: Pure predicates over decoded pixels, dimensions, byte sizes, and raw <img> tag text.

use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum width and height, in pixels, for a fetched image to be kept.
pub const MIN_DIMENSION: u32 = 100;
/// Luminance standard deviation below which an image counts as blank.
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_MIN_RATIO: f64 = 0.1;
pub const DEFAULT_MAX_RATIO: f64 = 10.0;
/// Bytes per pixel below which an image counts as degraded.
pub const DEFAULT_BYTES_PER_PIXEL: f64 = 0.01;
/// Declared display size below which an <img> tag is treated as an avatar or icon.
pub const AVATAR_MAX_DISPLAY_PX: u32 = 100;

static WIDTH_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)width=["'](\d+)"#).unwrap());
static WIDTH_STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)width:\s*(\d+)px").unwrap());
static HEIGHT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)height=["'](\d+)"#).unwrap());
static HEIGHT_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)height:\s*(\d+)px").unwrap());

/// Returns true when the luminance channel is nearly flat (solid color or blank placeholder).
///
/// Uses the population standard deviation of the 8-bit luma values.
pub fn low_color_variance(image: &DynamicImage, threshold: f64) -> bool {
    let luma = image.to_luma8();
    let pixels = luma.as_raw();
    if pixels.is_empty() {
        return false;
    }

    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = pixels
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    variance.sqrt() < threshold
}

/// Returns true for tracking-pixel strips and banners whose width/height ratio
/// falls outside `[min_ratio, max_ratio]`.
pub fn bad_aspect_ratio(width: u32, height: u32, min_ratio: f64, max_ratio: f64) -> bool {
    if height == 0 {
        return true;
    }
    let ratio = width as f64 / height as f64;
    ratio < min_ratio || ratio > max_ratio
}

/// Returns true when the encoded size is implausibly small for the pixel count.
///
/// The boundary is exclusive: exactly `threshold` bytes per pixel passes.
pub fn over_compressed(byte_size: usize, width: u32, height: u32, threshold: f64) -> bool {
    let pixel_count = width as u64 * height as u64;
    if pixel_count == 0 {
        return true;
    }
    (byte_size as f64 / pixel_count as f64) < threshold
}

/// Reads a numeric size declared on a tag, either as `attr="N"` or as `attr: Npx`.
fn declared_size(tag: &str, attr_re: &Regex, style_re: &Regex) -> Option<u32> {
    attr_re
        .captures(tag)
        .or_else(|| style_re.captures(tag))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Returns true if a raw `<img>` tag looks like an avatar or small icon.
///
/// A circular `border-radius: 50%` always qualifies. Otherwise a declared width
/// or height under 100 qualifies; a tag without any declared size does not.
pub fn is_avatar_tag(tag: &str) -> bool {
    if tag.contains("border-radius") && tag.contains("50%") {
        return true;
    }

    let width = declared_size(tag, &WIDTH_ATTR_RE, &WIDTH_STYLE_RE);
    let height = declared_size(tag, &HEIGHT_ATTR_RE, &HEIGHT_STYLE_RE);

    width.is_some_and(|w| w < AVATAR_MAX_DISPLAY_PX)
        || height.is_some_and(|h| h < AVATAR_MAX_DISPLAY_PX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_low_color_variance_solid_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 120, Rgb([200, 10, 10])));
        assert!(low_color_variance(&img, DEFAULT_VARIANCE_THRESHOLD));
    }

    #[test]
    fn test_low_color_variance_checkerboard_passes() {
        let img = image::GrayImage::from_fn(120, 120, |x, y| {
            if (x / 10 + y / 10) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        assert!(!low_color_variance(
            &DynamicImage::ImageLuma8(img),
            DEFAULT_VARIANCE_THRESHOLD
        ));
    }

    #[test]
    fn test_low_color_variance_faint_noise_still_rejected() {
        // alternating 100/104 gives a standard deviation of exactly 2
        let img = image::GrayImage::from_fn(50, 50, |x, _| Luma([if x % 2 == 0 { 100 } else { 104 }]));
        assert!(low_color_variance(
            &DynamicImage::ImageLuma8(img),
            DEFAULT_VARIANCE_THRESHOLD
        ));
    }

    #[test]
    fn test_bad_aspect_ratio() {
        assert!(bad_aspect_ratio(100, 0, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
        assert!(bad_aspect_ratio(1200, 100, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
        assert!(bad_aspect_ratio(100, 1200, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
        assert!(!bad_aspect_ratio(640, 480, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
        // both ends of the range are inclusive
        assert!(!bad_aspect_ratio(1000, 100, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
        assert!(!bad_aspect_ratio(100, 1000, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO));
    }

    #[test]
    fn test_over_compressed_boundary_is_exclusive() {
        assert!(!over_compressed(10_000, 1000, 1000, DEFAULT_BYTES_PER_PIXEL));
        assert!(over_compressed(9_999, 1000, 1000, DEFAULT_BYTES_PER_PIXEL));
        assert!(over_compressed(5_000, 0, 10, DEFAULT_BYTES_PER_PIXEL));
    }

    #[test]
    fn test_avatar_by_small_width_attribute() {
        assert!(is_avatar_tag(r#"<img src="https://x/me.png" width="40">"#));
        assert!(is_avatar_tag(r#"<img src='https://x/me.png' HEIGHT='64'>"#));
    }

    #[test]
    fn test_avatar_not_for_large_declared_size() {
        assert!(!is_avatar_tag(
            r#"<img src="https://x/photo.jpg" width="400" height="300">"#
        ));
    }

    #[test]
    fn test_avatar_by_circular_border_radius() {
        assert!(is_avatar_tag(
            r#"<img src="https://x/me.png" style="border-radius:50%">"#
        ));
    }

    #[test]
    fn test_avatar_by_inline_style_size() {
        assert!(is_avatar_tag(
            r#"<img src="https://x/icon.png" style="width: 24px; height: 24px">"#
        ));
        assert!(!is_avatar_tag(
            r#"<img src="https://x/hero.png" style="width: 600px">"#
        ));
    }

    #[test]
    fn test_avatar_requires_declared_size() {
        assert!(!is_avatar_tag(r#"<img src="https://x/photo.jpg">"#));
        assert!(!is_avatar_tag(r#"<img src="https://x/photo.jpg" alt="width">"#));
    }
}
