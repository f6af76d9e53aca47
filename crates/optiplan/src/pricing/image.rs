//! Image cleanup ahead of OCR.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::error::IngestError;

/// Resolution assumed for photos and scans that carry none.
pub const SOURCE_DPI: u32 = 72;
pub const BINARIZE_THRESHOLD: u8 = 150;
/// Longest side after resizing.
pub const MAX_SIDE_PX: u32 = 4096;

/// Grayscale, autocontrast, 3×3 median, binarize, then resize from
/// [`SOURCE_DPI`] to `target_dpi`. Returns PNG bytes.
pub fn preprocess(image_bytes: &[u8], target_dpi: u32) -> Result<Vec<u8>, IngestError> {
    let _span = tracing::info_span!("pricing.image_preprocess").entered();

    let img = image::load_from_memory(image_bytes)
        .map_err(|e| IngestError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let mut gray = img.to_luma8();
    autocontrast(&mut gray);
    let mut gray = median_3x3(&gray);
    binarize(&mut gray, BINARIZE_THRESHOLD);

    let (width, height) = target_size(gray.width(), gray.height(), target_dpi);
    let resized = if (width, height) == gray.dimensions() {
        gray
    } else {
        imageops::resize(&gray, width, height, FilterType::Triangle)
    };

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(resized)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| IngestError::ImageProcessing(format!("Failed to encode image: {}", e)))?;
    Ok(png)
}

/// Stretches the histogram so the darkest pixel is 0 and the brightest 255.
fn autocontrast(img: &mut GrayImage) {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return;
    }
    let span = (max - min) as u32;
    for p in img.pixels_mut() {
        p[0] = ((p[0] - min) as u32 * 255 / span) as u8;
    }
}

/// Edges use the clamped neighbourhood.
fn median_3x3(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut out = GrayImage::new(width, height);
    let mut window = [0u8; 9];

    for y in 0..height {
        for x in 0..width {
            let mut i = 0;
            for dy in [-1i64, 0, 1] {
                for dx in [-1i64, 0, 1] {
                    let nx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let ny = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    window[i] = img.get_pixel(nx, ny)[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

fn binarize(img: &mut GrayImage, threshold: u8) {
    for p in img.pixels_mut() {
        p[0] = if p[0] > threshold { 255 } else { 0 };
    }
}

/// Scales by `target_dpi / SOURCE_DPI`, then caps the longest side at
/// [`MAX_SIDE_PX`] keeping the aspect ratio.
fn target_size(width: u32, height: u32, target_dpi: u32) -> (u32, u32) {
    let scale = target_dpi.max(1) as f64 / SOURCE_DPI as f64;
    let mut w = (width as f64 * scale).round().max(1.0);
    let mut h = (height as f64 * scale).round().max(1.0);

    let longest = w.max(h);
    if longest > MAX_SIDE_PX as f64 {
        let cap = MAX_SIDE_PX as f64 / longest;
        w = (w * cap).round().max(1.0);
        h = (h * cap).round().max(1.0);
    }
    (w as u32, h as u32)
}
