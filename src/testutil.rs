//! Synthetic on-disk fixtures for tests.

use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// Writes a solid-colour PNG of `(width, height)`, creating parent folders.
pub fn write_png(path: &Path, (width, height): (u32, u32), rgb: [u8; 3]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb(rgb)).save(path).unwrap();
}

/// Writes `root/<category>/case<i>/frame<j>.png`.
///
/// Frames of category `k` get brightness rising with `k`, so a classifier
/// can tell the categories apart.
pub fn write_dataset(root: &Path, categories: &[&str], cases: usize, frames: usize, size: (u32, u32)) {
    let step = 200 / categories.len().max(1) as u32;
    for (k, category) in categories.iter().enumerate() {
        for case in 0..cases {
            for frame in 0..frames {
                let level = (k as u32 * step + (case + frame) as u32 % 8) as u8;
                let path = root
                    .join(category)
                    .join(format!("case{}", case))
                    .join(format!("frame{}.png", frame));
                write_png(&path, size, [level, level, level]);
            }
        }
    }
}
