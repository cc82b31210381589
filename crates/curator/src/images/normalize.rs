// ABOUTME: Target encodings and the pixel normalization applied before saving an image.
// ABOUTME: Flattens alpha onto black for JPEG, keeps alpha for PNG, and encodes to bytes.

use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Default JPEG quality for re-encoded body images.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Output format a fetched image is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetEncoding {
    /// Lossy, opaque. Used for body images.
    Jpeg,
    /// Lossless, alpha-capable. Used for cover thumbnails.
    Png,
}

impl TargetEncoding {
    /// File extension for saved files, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            TargetEncoding::Jpeg => "jpg",
            TargetEncoding::Png => "png",
        }
    }
}

impl fmt::Display for TargetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetEncoding::Jpeg => "JPEG",
            TargetEncoding::Png => "PNG",
        };
        write!(f, "{}", s)
    }
}

/// Short uppercase label for a decoded source format, e.g. `PNG` or `JPEG`.
pub fn format_label(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Ico => "ICO",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Avif => "AVIF",
        ImageFormat::Tga => "TGA",
        ImageFormat::Pnm => "PNM",
        ImageFormat::Dds => "DDS",
        ImageFormat::Hdr => "HDR",
        ImageFormat::OpenExr => "EXR",
        ImageFormat::Farbfeld => "FARBFELD",
        ImageFormat::Qoi => "QOI",
        _ => "UNKNOWN",
    }
}

/// Composites every pixel over an opaque black background, weighting color by alpha.
pub fn flatten_on_black(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let weight = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        Rgb([weight(r), weight(g), weight(b)])
    })
}

/// Converts a decoded image into the pixel layout used for `target`.
///
/// JPEG has no alpha channel, so transparent regions become black. PNG keeps
/// alpha when the source has it and is otherwise forced to opaque RGB.
pub fn normalize(image: &DynamicImage, target: TargetEncoding) -> DynamicImage {
    let has_alpha = image.color().has_alpha();
    match target {
        TargetEncoding::Jpeg if has_alpha => DynamicImage::ImageRgb8(flatten_on_black(image)),
        TargetEncoding::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        TargetEncoding::Png if has_alpha => DynamicImage::ImageRgba8(image.to_rgba8()),
        TargetEncoding::Png => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Encodes an already normalized image.
pub fn encode(
    image: &DynamicImage,
    target: TargetEncoding,
    jpeg_quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    match target {
        TargetEncoding::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            image.write_with_encoder(encoder)?;
        }
        TargetEncoding::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            image.write_with_encoder(encoder)?;
        }
    }
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, GenericImageView, Rgba, RgbaImage};

    #[test]
    fn test_fully_transparent_to_jpeg_is_black_and_opaque() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            120,
            120,
            Rgba([255, 255, 255, 0]),
        ));
        let out = normalize(&img, TargetEncoding::Jpeg);
        assert_eq!(out.color(), ColorType::Rgb8);
        assert!(!out.color().has_alpha());
        assert!(out.pixels().all(|(_, _, p)| p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_half_alpha_is_composited_not_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 100, 0, 128])));
        let flat = flatten_on_black(&img);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([100, 50, 0]));
    }

    #[test]
    fn test_png_keeps_alpha_when_present() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 40])));
        let out = normalize(&img, TargetEncoding::Png);
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(out.get_pixel(0, 0), Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn test_png_forces_rgb_for_opaque_sources() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(8, 8, image::Luma([77])));
        let out = normalize(&img, TargetEncoding::Png);
        assert_eq!(out.color(), ColorType::Rgb8);
    }

    #[test]
    fn test_encode_produces_decodable_bytes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |x, y| {
            Rgb([x as u8 * 8, y as u8 * 8, 0])
        }));
        let jpg = encode(&img, TargetEncoding::Jpeg, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(image::guess_format(&jpg).unwrap(), ImageFormat::Jpeg);

        let png = encode(&img, TargetEncoding::Png, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_extension_and_labels() {
        assert_eq!(TargetEncoding::Jpeg.extension(), "jpg");
        assert_eq!(TargetEncoding::Png.extension(), "png");
        assert_eq!(TargetEncoding::Png.to_string(), "PNG");
        assert_eq!(format_label(ImageFormat::Jpeg), "JPEG");
        assert_eq!(format_label(ImageFormat::WebP), "WEBP");
    }
}
