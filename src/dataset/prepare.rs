//! Builds the resized "adaptation" copy of a dataset tree.

use image::imageops::FilterType;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::{file_name, list_dirs, list_images};
use crate::error::{CnnError, Result};

/// `<input>_<rows>X<cols>_adaptation`, next to `input`.
pub fn adaptation_dir(input: &Path, rows: u32, cols: u32) -> PathBuf {
    let mut name: OsString = input.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!("_{}X{}_adaptation", rows, cols));
    input.with_file_name(name)
}

/// Resizes every `<category>/<case>/<frame>` of `input` to `cols × rows` and
/// writes it as PNG under the same relative path in `output`.
///
/// The tree is assembled in `<output>.partial` and renamed into place, so an
/// interrupted run never leaves a half-written `output`. Returns the number
/// of frames written.
pub fn reshape_images(input: &Path, output: &Path, rows: u32, cols: u32) -> Result<usize> {
    let mut partial_name = output.as_os_str().to_os_string();
    partial_name.push(".partial");
    let partial = PathBuf::from(partial_name);
    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }

    let mut written = 0;
    for category in list_dirs(input)? {
        for case in list_dirs(&category)? {
            let target = partial.join(file_name(&category)).join(file_name(&case));
            fs::create_dir_all(&target)?;
            for frame in list_images(&case)? {
                let img = image::open(&frame)?;
                let resized = img.resize_exact(cols, rows, FilterType::Triangle);
                let out = target.join(png_name(&frame));
                if out.exists() {
                    return Err(CnnError::Dataset(format!(
                        "{} and another frame both map to {}",
                        frame.display(),
                        out.display()
                    )));
                }
                resized.save(&out)?;
                written += 1;
            }
            debug!("resized case {}", case.display());
        }
    }

    if output.exists() {
        fs::remove_dir_all(output)?;
    }
    fs::rename(&partial, output)?;
    info!("wrote {} frames at {}x{} to {}", written, cols, rows, output.display());
    Ok(written)
}

/// `f.png` stays `f.png`; any other frame keeps its extension in the stem,
/// so `f.bmp` becomes `f.bmp.png` and cannot collide with `f.png`.
fn png_name(frame: &Path) -> String {
    let name = file_name(frame);
    let is_png = frame
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("png"));
    if is_png { name } else { format!("{}.png", name) }
}

/// Returns the adaptation directory for `input`, creating it first if absent.
pub fn ensure_adapted(input: &Path, rows: u32, cols: u32) -> Result<PathBuf> {
    let output = adaptation_dir(input, rows, cols);
    if !output.exists() {
        info!("adaptation tree {} missing, regenerating", output.display());
        reshape_images(input, &output, rows, cols)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write_dataset, write_png};

    #[test]
    fn adaptation_name() {
        assert_eq!(
            adaptation_dir(Path::new("/p/dataset"), 200, 100),
            PathBuf::from("/p/dataset_200X100_adaptation")
        );
    }

    #[test]
    fn resizes_whole_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dataset");
        write_dataset(&input, &["neg", "pos"], 2, 3, (10, 6));

        let output = ensure_adapted(&input, 4, 5).unwrap();
        assert!(output.ends_with("dataset_4X5_adaptation"));

        let frame = output.join("pos").join("case1").join("frame2.png");
        let img = image::open(&frame).unwrap();
        assert_eq!((img.width(), img.height()), (5, 4));
        assert!(!dir.path().join("dataset_4X5_adaptation.partial").exists());
    }

    #[test]
    fn frames_sharing_a_stem_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dataset");
        let case = input.join("a").join("case0");
        write_png(&case.join("f.png"), (6, 6), [10, 10, 10]);
        image::RgbImage::from_pixel(6, 6, image::Rgb([90, 90, 90]))
            .save(case.join("f.bmp"))
            .unwrap();

        let output = dir.path().join("out");
        assert_eq!(reshape_images(&input, &output, 3, 3).unwrap(), 2);
        let frames = list_images(&output.join("a").join("case0")).unwrap();
        let names: Vec<String> = frames.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["f.bmp.png", "f.png"]);
    }

    #[test]
    fn colliding_output_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dataset");
        let case = input.join("a").join("case0");
        write_png(&case.join("f.png"), (6, 6), [10, 10, 10]);
        image::RgbImage::from_pixel(6, 6, image::Rgb([90, 90, 90]))
            .save(case.join("f.bmp"))
            .unwrap();
        write_png(&case.join("f.bmp.png"), (6, 6), [50, 50, 50]);

        let output = dir.path().join("out");
        assert!(matches!(reshape_images(&input, &output, 3, 3), Err(CnnError::Dataset(_))));
        assert!(!output.exists());
    }

    #[test]
    fn existing_tree_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dataset");
        write_dataset(&input, &["a", "b"], 1, 1, (8, 8));
        let output = adaptation_dir(&input, 4, 4);
        fs::create_dir_all(&output).unwrap();

        ensure_adapted(&input, 4, 4).unwrap();
        assert!(list_dirs(&output).unwrap().is_empty());
    }
}
