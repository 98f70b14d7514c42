pub mod decode;
pub mod loader;
pub mod prepare;

use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::math::tensor::Tensor;

pub use loader::{load_data_set, random_frame};
pub use prepare::{adaptation_dir, ensure_adapted, reshape_images};

/// File extensions treated as frames.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Images with their integer labels, one-hot targets and source files,
/// kept index-aligned.
#[derive(Debug, Clone, Default)]
pub struct LabeledSet {
    pub images: Vec<Tensor>,
    pub labels: Vec<usize>,
    pub targets: Vec<Vec<f64>>,
    pub paths: Vec<PathBuf>,
}

impl LabeledSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn push(&mut self, image: Tensor, label: usize, path: PathBuf) {
        self.images.push(image);
        self.labels.push(label);
        self.paths.push(path);
    }

    /// Applies one random permutation to every column.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.images = order.iter().map(|&i| std::mem::take(&mut self.images[i])).collect();
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
        self.paths = order.iter().map(|&i| std::mem::take(&mut self.paths[i])).collect();
        if !self.targets.is_empty() {
            self.targets = order.iter().map(|&i| std::mem::take(&mut self.targets[i])).collect();
        }
    }

    /// Splits off the samples from `at` onwards.
    pub fn split_off(&mut self, at: usize) -> LabeledSet {
        LabeledSet {
            images: self.images.split_off(at),
            labels: self.labels.split_off(at),
            targets: if self.targets.len() > at { self.targets.split_off(at) } else { Vec::new() },
            paths: self.paths.split_off(at),
        }
    }

    /// Fills `targets` with one-hot rows over `num_classes`.
    pub fn encode_targets(&mut self, num_classes: usize) {
        self.targets = self.labels.iter()
            .map(|&label| {
                let mut row = vec![0.0; num_classes];
                row[label] = 1.0;
                row
            })
            .collect();
    }
}

/// A loaded, split and encoded data set.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Category folder names; the index is the label.
    pub categories: Vec<String>,
    pub train: LabeledSet,
    pub validation: LabeledSet,
    /// The (resized) tree the frames were read from.
    pub source: PathBuf,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sub-directories of `path`, sorted by name, hidden entries skipped.
pub(crate) fn list_dirs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && !is_hidden(&entry.path()) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Image files directly inside `path`, sorted by name.
pub(crate) fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let p = entry.path();
        if entry.file_type()?.is_file() && !is_hidden(&p) && has_image_extension(&p) {
            frames.push(p);
        }
    }
    frames.sort();
    Ok(frames)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Final path component as a `String`.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn set(n: usize) -> LabeledSet {
        let mut s = LabeledSet::default();
        for i in 0..n {
            s.push(Tensor::from_vec(&[1], vec![i as f64]), i % 2, PathBuf::from(format!("f{}", i)));
        }
        s.encode_targets(2);
        s
    }

    #[test]
    fn shuffle_keeps_columns_aligned() {
        let mut s = set(20);
        s.shuffle(&mut ChaCha8Rng::seed_from_u64(7));
        for i in 0..s.len() {
            let original = s.images[i].data[0] as usize;
            assert_eq!(s.labels[i], original % 2);
            assert_eq!(s.paths[i], PathBuf::from(format!("f{}", original)));
            assert_eq!(s.targets[i][original % 2], 1.0);
        }
    }

    #[test]
    fn split_off_partitions() {
        let mut s = set(5);
        let tail = s.split_off(3);
        assert_eq!(s.len(), 3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.targets.len(), 2);
    }

    #[test]
    fn listing_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join("z.PNG"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let dirs: Vec<String> = list_dirs(dir.path()).unwrap().iter().map(|p| file_name(p)).collect();
        assert_eq!(dirs, vec!["a", "b"]);
        let frames = list_images(dir.path()).unwrap();
        assert_eq!(frames.len(), 1);
    }
}
