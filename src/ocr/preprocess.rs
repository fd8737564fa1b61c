use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GrayImage, Luma};

/// Image preparation applied before recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareOptions {
    /// Narrower images are scaled up to this width (0 disables scaling).
    pub upscale_min_width: u32,
    /// When set, pixels darker than this become black text and the rest white.
    pub binarize_threshold: Option<u8>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            upscale_min_width: 1200,
            binarize_threshold: None,
        }
    }
}

/// Decodes image bytes and prepares a grayscale image for OCR.
pub fn prepare_for_ocr(bytes: &[u8], options: &PrepareOptions) -> Result<GrayImage> {
    let decoded = image::load_from_memory(bytes).context("Failed to decode image")?;
    let gray = upscale_to_min_width(decoded.to_luma8(), options.upscale_min_width);

    Ok(match options.binarize_threshold {
        Some(threshold) => binarize_dark_text(&gray, threshold),
        None => gray,
    })
}

/// Scales `img` up, keeping its aspect ratio, when it is narrower than
/// `min_width`.
pub fn upscale_to_min_width(img: GrayImage, min_width: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if min_width == 0 || width == 0 || width >= min_width {
        return img;
    }

    let scale = min_width as f32 / width as f32;
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&img, min_width, new_height, FilterType::CatmullRom)
}

/// Converts to binary by keeping only dark pixels.
///
/// Pixels at or below `threshold` become black (text), everything else white
/// (parchment/background).
pub fn binarize_dark_text(img: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] <= threshold { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_prepare_decodes_and_upscales() {
        let img = RgbaImage::from_pixel(100, 40, Rgba([255, 255, 255, 255]));
        let options = PrepareOptions {
            upscale_min_width: 300,
            binarize_threshold: None,
        };

        let prepared = prepare_for_ocr(&png_bytes(img), &options).unwrap();
        assert_eq!(prepared.dimensions(), (300, 120));
    }

    #[test]
    fn test_prepare_rejects_garbage() {
        assert!(prepare_for_ocr(b"definitely not an image", &PrepareOptions::default()).is_err());
    }

    #[test]
    fn test_upscale_keeps_wide_images() {
        let img = GrayImage::new(1600, 900);
        assert_eq!(upscale_to_min_width(img, 1200).dimensions(), (1600, 900));
    }

    #[test]
    fn test_binarize_dark_text() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([20]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(2, 0, Luma([240]));

        let result = binarize_dark_text(&img, 128);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 0, "Threshold pixel should become black");
        assert_eq!(result.get_pixel(2, 0)[0], 255, "Light pixel should become white");
    }
}
