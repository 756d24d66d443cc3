//! Turning client-supplied images into model input.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use ndarray::{Array3, ArrayD};
use std::io::Cursor;

use crate::error::{LedgerError, Result};
use crate::ml::INPUT_SHAPE;

/// Drop a `data:image/png;base64,` style prefix, if any
pub fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, encoded)) => encoded,
        None => payload,
    }
}

/// Decode a data URL or bare base64 image into a `(28, 28, 1)` array in `[0, 1]`
pub fn decode_base64_image(payload: &str) -> Result<ArrayD<f32>> {
    let encoded = strip_data_url(payload).trim();
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| LedgerError::InvalidInput(format!("invalid base64: {e}")))?;
    let image = image::load_from_memory(&bytes)?;
    Ok(normalize_image(&image))
}

/// Grayscale, resize to the model's side length if needed, and scale to `[0, 1]`
pub fn normalize_image(image: &DynamicImage) -> ArrayD<f32> {
    let [height, width, _] = INPUT_SHAPE;
    let gray = image.to_luma8();
    let gray = if gray.dimensions() != (width as u32, height as u32) {
        imageops::resize(&gray, width as u32, height as u32, FilterType::Lanczos3)
    } else {
        gray
    };

    Array3::from_shape_fn((height, width, 1), |(y, x, _)| {
        f32::from(gray.get_pixel(x as u32, y as u32)[0]) / 255.0
    })
    .into_dyn()
}

/// Convert a normalized `(h, w)` or `(h, w, 1)` array back to an 8-bit image
pub fn array_to_gray_image(array: &ArrayD<f32>) -> Result<GrayImage> {
    let (height, width) = match array.shape() {
        [h, w] | [h, w, 1] => (*h, *w),
        other => {
            return Err(LedgerError::InvalidInput(format!(
                "expected a single-channel image, got shape {other:?}"
            )))
        }
    };

    let pixels: Vec<u8> = array
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let mut image = GrayImage::new(width as u32, height as u32);
    for (idx, value) in pixels.into_iter().enumerate() {
        let (y, x) = (idx / width, idx % width);
        image.put_pixel(x as u32, y as u32, Luma([value]));
    }
    Ok(image)
}

/// PNG-encode an image as a `data:` URL
pub fn image_to_base64(image: &DynamicImage) -> Result<String> {
    let mut png: Vec<u8> = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
