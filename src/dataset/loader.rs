use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::dataset::decode::load_image_tensor;
use crate::dataset::{file_name, list_dirs, list_images, Dataset, LabeledSet};
use crate::error::{CnnError, Result};

/// Loads every frame under `root` (`<category>/<case>/<frame>`) and splits
/// it into training and validation sets.
///
/// Categories are the sorted sub-directories of `root`; a frame's label is
/// its category's index. With `config.split_cases` the first half of each
/// category's (sorted) cases goes to validation and the rest to training, so
/// no case straddles both. Otherwise all frames are pooled, shuffled, and
/// the first `ceil(test_size · n)` become validation. Both paths shuffle with
/// `config.seed`, so repeated loads are identical.
pub fn load_data_set(root: &Path, config: &ModelConfig) -> Result<Dataset> {
    let category_dirs = list_dirs(root)?;
    if category_dirs.is_empty() {
        return Err(CnnError::Dataset(format!("no category folders in {}", root.display())));
    }
    let categories: Vec<String> = category_dirs.iter().map(|p| file_name(p)).collect();
    info!("loading {} categories from {}", categories.len(), root.display());

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut train = LabeledSet::default();
    let mut validation = LabeledSet::default();

    for (label, category) in category_dirs.iter().enumerate() {
        let cases = list_dirs(category)?;
        let held_out = if config.split_cases { cases.len() / 2 } else { 0 };
        for (i, case) in cases.iter().enumerate() {
            let target = if i < held_out { &mut validation } else { &mut train };
            load_case(case, label, config, target)?;
        }
        debug!("category '{}' (label {}): {} cases", categories[label], label, cases.len());
    }

    if config.split_cases {
        train.shuffle(&mut rng);
        validation.shuffle(&mut rng);
    } else {
        let n = train.len();
        if n < 2 {
            return Err(CnnError::Dataset(format!(
                "need at least two frames to split, found {}",
                n
            )));
        }
        train.shuffle(&mut rng);
        let n_val = ((config.test_size * n as f64).ceil() as usize).clamp(1, n - 1);
        let rest = train.split_off(n_val);
        validation = std::mem::replace(&mut train, rest);
    }

    if train.is_empty() {
        return Err(CnnError::Dataset(format!("no training frames found under {}", root.display())));
    }

    train.encode_targets(categories.len());
    validation.encode_targets(categories.len());
    info!("{} train frames, {} validation frames", train.len(), validation.len());

    Ok(Dataset { categories, train, validation, source: root.to_path_buf() })
}

fn load_case(case: &Path, label: usize, config: &ModelConfig, into: &mut LabeledSet) -> Result<()> {
    let expected = (config.img_cols, config.img_rows);
    for frame in list_images(case)? {
        let (tensor, size) = load_image_tensor(&frame, config.nb_channel)?;
        if size != expected {
            return Err(CnnError::InconsistentImage { path: frame, expected, actual: size });
        }
        into.push(tensor, label, frame);
    }
    Ok(())
}

/// Picks a uniformly random category, then case, then frame under `root`.
/// Returns the frame path and its category index.
pub fn random_frame<R: Rng + ?Sized>(root: &Path, rng: &mut R) -> Result<(PathBuf, usize)> {
    let categories = list_dirs(root)?;
    if categories.is_empty() {
        return Err(CnnError::Dataset(format!("no category folders in {}", root.display())));
    }
    let label = rng.gen_range(0..categories.len());

    let cases = list_dirs(&categories[label])?;
    if cases.is_empty() {
        return Err(CnnError::Dataset(format!("no cases in {}", categories[label].display())));
    }
    let case = &cases[rng.gen_range(0..cases.len())];

    let frames = list_images(case)?;
    if frames.is_empty() {
        return Err(CnnError::Dataset(format!("no frames in {}", case.display())));
    }
    let frame = frames[rng.gen_range(0..frames.len())].clone();
    Ok((frame, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write_dataset, write_png};
    use std::collections::HashSet;

    fn config(split_cases: bool) -> ModelConfig {
        let mut config = ModelConfig::new("loader");
        config.img_rows = 4;
        config.img_cols = 6;
        config.split_cases = split_cases;
        config
    }

    fn assert_partition(ds: &Dataset, total: usize) {
        let train: HashSet<_> = ds.train.paths.iter().collect();
        let val: HashSet<_> = ds.validation.paths.iter().collect();
        assert_eq!(train.len() + val.len(), total);
        assert!(train.is_disjoint(&val));
    }

    #[test]
    fn random_split_partitions_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["neg", "pos"], 3, 4, (6, 4));

        let ds = load_data_set(dir.path(), &config(false)).unwrap();
        assert_eq!(ds.categories, vec!["neg", "pos"]);
        assert_partition(&ds, 24);
        // ceil(0.2 · 24) = 5
        assert_eq!(ds.validation.len(), 5);
        assert_eq!(ds.train.images[0].shape, vec![3, 4, 6]);
        assert_eq!(ds.train.targets[0].len(), 2);
    }

    #[test]
    fn case_split_keeps_cases_whole() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["neg", "pos"], 4, 2, (6, 4));

        let ds = load_data_set(dir.path(), &config(true)).unwrap();
        assert_partition(&ds, 16);
        assert_eq!(ds.validation.len(), 8);
        let case_of = |p: &PathBuf| p.parent().unwrap().to_path_buf();
        let train_cases: HashSet<_> = ds.train.paths.iter().map(case_of).collect();
        let val_cases: HashSet<_> = ds.validation.paths.iter().map(case_of).collect();
        assert!(train_cases.is_disjoint(&val_cases));
        assert!(val_cases.iter().all(|c| c.ends_with("case0") || c.ends_with("case1")));
    }

    #[test]
    fn loading_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["a", "b", "c"], 2, 3, (6, 4));
        let first = load_data_set(dir.path(), &config(false)).unwrap();
        let second = load_data_set(dir.path(), &config(false)).unwrap();
        assert_eq!(first.train.paths, second.train.paths);
        assert_eq!(first.validation.paths, second.validation.paths);
        assert_eq!(first.train.labels, second.train.labels);
    }

    #[test]
    fn labels_follow_category_folder() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["a", "b"], 2, 2, (6, 4));
        let ds = load_data_set(dir.path(), &config(false)).unwrap();
        for (path, &label) in ds.train.paths.iter().zip(&ds.train.labels) {
            let category = path.parent().unwrap().parent().unwrap();
            assert_eq!(file_name(category), ds.categories[label]);
        }
    }

    #[test]
    fn odd_sized_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["a", "b"], 2, 2, (6, 4));
        write_png(&dir.path().join("b").join("case1").join("odd.png"), (5, 4), [1, 2, 3]);
        let err = load_data_set(dir.path(), &config(false)).unwrap_err();
        assert!(matches!(err, CnnError::InconsistentImage { actual: (5, 4), .. }));
    }

    #[test]
    fn empty_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_data_set(dir.path(), &config(false)), Err(CnnError::Dataset(_))));
    }

    #[test]
    fn random_frame_lies_in_tree() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &["a", "b"], 2, 3, (6, 4));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let (frame, label) = random_frame(dir.path(), &mut rng).unwrap();
            assert!(frame.exists());
            let category = frame.parent().unwrap().parent().unwrap();
            assert_eq!(file_name(category), ["a", "b"][label]);
        }
    }
}
