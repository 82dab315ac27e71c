//! CLIP image preprocessing.
//!
//! Decodes image bytes, resizes to fill 224x224 (shortest side scaled, then a
//! center crop), and normalizes each RGB channel with the CLIP mean/std into a
//! `[1, 3, 224, 224]` channel-first tensor.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use ndarray::Array4;

/// CLIP vision input size in pixels.
pub const CLIP_IMAGE_SIZE: u32 = 224;

pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Decode and preprocess an image into a `[1, 3, 224, 224]` tensor.
pub fn clip_pixel_values(bytes: &[u8]) -> Result<Array4<f32>> {
    anyhow::ensure!(!bytes.is_empty(), "image is empty");

    let img = image::load_from_memory(bytes).context("failed to decode image")?;
    anyhow::ensure!(
        img.width() > 0 && img.height() > 0,
        "image has zero dimensions"
    );

    let rgb = img
        .resize_to_fill(CLIP_IMAGE_SIZE, CLIP_IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let size = CLIP_IMAGE_SIZE as usize;
    let mut pixels = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            pixels[[0, c, y as usize, x as usize]] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    Ok(pixels)
}

/// Detected container format, used for object names and content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Sniff the encoded format. Unknown formats are stored as JPEG.
pub fn sniff_kind(bytes: &[u8]) -> ImageKind {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => ImageKind {
            extension: "png",
            content_type: "image/png",
        },
        Ok(image::ImageFormat::WebP) => ImageKind {
            extension: "webp",
            content_type: "image/webp",
        },
        Ok(image::ImageFormat::Gif) => ImageKind {
            extension: "gif",
            content_type: "image/gif",
        },
        _ => ImageKind {
            extension: "jpg",
            content_type: "image/jpeg",
        },
    }
}
