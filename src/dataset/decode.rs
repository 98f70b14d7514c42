//! Image decoding into channel-first tensors normalised to [0, 1].

use image::{DynamicImage, GenericImageView};
use std::path::Path;

use crate::error::{CnnError, Result};
use crate::math::tensor::Tensor;

/// Converts a decoded image to a `[channels, height, width]` tensor.
///
/// `channels` selects the colour conversion: 1 → luma, 3 → RGB, 4 → RGBA.
pub fn image_to_chw(img: &DynamicImage, channels: usize) -> Result<Tensor> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let raw: Vec<u8> = match channels {
        1 => img.to_luma8().into_raw(),
        3 => img.to_rgb8().into_raw(),
        4 => img.to_rgba8().into_raw(),
        other => return Err(CnnError::UnsupportedChannels(other)),
    };

    let mut data = vec![0.0; channels * h * w];
    for (i, pixel) in raw.chunks_exact(channels).enumerate() {
        let (y, x) = (i / w, i % w);
        for (c, &value) in pixel.iter().enumerate() {
            data[(c * h + y) * w + x] = value as f64 / 255.0;
        }
    }
    Ok(Tensor::from_vec(&[channels, h, w], data))
}

/// Decodes `path` and returns its tensor along with its `(width, height)`.
pub fn load_image_tensor(path: &Path, channels: usize) -> Result<(Tensor, (u32, u32))> {
    let img = image::open(path)?;
    let size = img.dimensions();
    Ok((image_to_chw(&img, channels)?, size))
}
