use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::checkpoint::{CheckpointStore, ModelMetadata, WeightFormat};
use crate::config::{ModelConfig, ProjectPaths};
use crate::dataset::{self, decode::image_to_chw, Dataset};
use crate::error::{CnnError, Result};
use crate::network::{build_network, Architecture, Sequential};
use crate::optim::{Optimizer, OptimizerSpec};
use crate::train::{fit, BestCheckpoint, ConfusionTracker, EpochHook, FitConfig, TrainingHistory};

/// Owns one named model through its whole lifecycle: data loading, network
/// construction, training, checkpointing and prediction.
#[derive(Debug)]
pub struct ModelManager {
    config: ModelConfig,
    paths: ProjectPaths,
    store: CheckpointStore,
    model: Sequential,
    optimizer: Optimizer,
    history: TrainingHistory,
    dataset: Option<Dataset>,
    rng: ChaCha8Rng,
}

impl ModelManager {
    /// Creates a fresh, untrained model under `root`.
    pub fn new(config: ModelConfig, root: impl Into<PathBuf>) -> Result<ModelManager> {
        config.validate()?;
        let paths = ProjectPaths::new(root);
        let store = CheckpointStore::new(paths.checkpoint_base(&config.model_name));
        let model = build_network(&config, config.num_classes())?;
        let optimizer = optimizer_spec(&config).build();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(ModelManager {
            config,
            paths,
            store,
            model,
            optimizer,
            history: TrainingHistory::default(),
            dataset: None,
            rng,
        })
    }

    /// Restores a model saved under `root` with `model_name`.
    pub fn open(model_name: &str, root: impl Into<PathBuf>) -> Result<ModelManager> {
        let paths = ProjectPaths::new(root);
        let store = CheckpointStore::new(paths.checkpoint_base(model_name));
        let ModelMetadata { config, history } = store.load_metadata()?;
        let model = store.load_network(WeightFormat::for_config(&config), &config)?;
        info!(
            "opened model '{}' ({} categories, {} epochs trained)",
            config.model_name,
            config.category.len(),
            history.done_train_epoch
        );
        let optimizer = optimizer_spec(&config).build();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(ModelManager { config, paths, store, model, optimizer, history, dataset: None, rng })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn model(&self) -> &Sequential {
        &self.model
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn weight_format(&self) -> WeightFormat {
        WeightFormat::for_config(&self.config)
    }

    /// Directory of resized frames the model trains on.
    pub fn adaptation_dir(&self) -> PathBuf {
        dataset::adaptation_dir(&self.paths.dataset_dir(), self.config.img_rows, self.config.img_cols)
    }

    /// Loads and splits the project's dataset, regenerating the resized
    /// copy when missing. The dataset's categories replace the configured
    /// ones; the network is rebuilt if that changes the class count.
    pub fn load_data_set(&mut self) -> Result<&Dataset> {
        let source = dataset::ensure_adapted(&self.paths.dataset_dir(), self.config.img_rows, self.config.img_cols)?;
        let loaded = dataset::load_data_set(&source, &self.config)?;

        if !self.config.category.is_empty() && self.config.category != loaded.categories {
            warn!(
                "dataset categories {:?} replace configured {:?}",
                loaded.categories, self.config.category
            );
        }
        self.config.category = loaded.categories.clone();
        if self.model.output_shape() != [self.config.num_classes()] {
            info!("rebuilding network for {} classes", self.config.num_classes());
            self.build_model()?;
        }
        Ok(self.dataset.insert(loaded))
    }

    /// Rebuilds network and optimizer from the current config, discarding
    /// learned weights.
    pub fn build_model(&mut self) -> Result<()> {
        self.model = build_network(&self.config, self.config.num_classes())?;
        self.optimizer = optimizer_spec(&self.config).build();
        Ok(())
    }

    /// Trains for `n_epoch` epochs (default `config.epoch`), loading the
    /// dataset first if needed.
    ///
    /// Each epoch appends confusion matrices to the history and saves a
    /// `(best)` checkpoint when validation does not get worse. Afterwards
    /// the best weights are reloaded and saved as the regular checkpoint
    /// together with the full history, which retires the `(best)` file.
    /// Returns the last epoch's training loss.
    pub fn train_model(&mut self, n_epoch: Option<usize>) -> Result<f64> {
        if self.dataset.is_none() {
            self.load_data_set()?;
        }
        let epochs = n_epoch.unwrap_or(self.config.epoch);
        self.history.total_train_epoch = epochs;
        let format = self.weight_format();

        let loss = {
            let data = self.dataset.as_ref().ok_or(CnnError::NoCategories)?;
            if data.validation.is_empty() {
                warn!("validation split is empty; every epoch will count as best");
            }
            info!(
                "training '{}' for {} epochs on {} frames",
                self.config.model_name,
                epochs,
                data.train.len()
            );

            let fit_config = FitConfig::from_model_config(&self.config, epochs);
            let mut tracker = ConfusionTracker::new(&data.train, &data.validation);
            let mut best = BestCheckpoint { store: &self.store, format, config: &self.config };
            let mut hooks: [&mut dyn EpochHook; 2] = [&mut tracker, &mut best];
            fit(
                &mut self.model,
                &mut self.optimizer,
                &data.train,
                Some(&data.validation),
                &fit_config,
                &mut self.history,
                &mut hooks,
            )?
        };

        if self.store.best_weights_path(format).exists() {
            self.model = self.store.load_network(format, &self.config)?;
        }
        self.save()?;
        if let Some((epoch, score)) = self.history.best_validation() {
            info!("best validation score {:.4} at epoch {}", score, epoch);
        }
        Ok(loss)
    }

    pub fn info(&self) -> ModelMetadata {
        ModelMetadata { config: self.config.clone(), history: self.history.clone() }
    }

    /// Writes the regular weight file and metadata.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.model, self.weight_format(), &self.info())?;
        info!("saved model '{}' to {}", self.config.model_name, self.store.base().display());
        Ok(())
    }

    /// Replaces config, history and weights with what is on disk.
    pub fn reload(&mut self) -> Result<()> {
        let ModelMetadata { config, history } = self.store.load_metadata()?;
        self.model = self.store.load_network(WeightFormat::for_config(&config), &config)?;
        self.optimizer = optimizer_spec(&config).build();
        if !same_input(&self.config, &config) {
            self.dataset = None;
        }
        self.config = config;
        self.history = history;
        Ok(())
    }

    /// Raw network output for one image file.
    ///
    /// The image must already be `img_cols × img_rows`; it is not resized.
    pub fn predict_scores(&mut self, frame: &Path) -> Result<Vec<f64>> {
        let img = image::open(frame)?;
        let expected = (self.config.img_cols, self.config.img_rows);
        let actual = (img.width(), img.height());
        if actual != expected {
            return Err(CnnError::ImageSizeMismatch { expected, actual });
        }
        let input = image_to_chw(&img, self.config.nb_channel)?;
        Ok(self.model.predict(input).data)
    }

    /// Name of the category predicted for one image file.
    pub fn predict(&mut self, frame: &Path) -> Result<String> {
        if self.config.category.is_empty() {
            return Err(CnnError::NoCategories);
        }
        let scores = self.predict_scores(frame)?;
        let index = crate::math::tensor::argmax(&scores);
        let label = self.config.category.get(index).cloned().ok_or_else(|| {
            CnnError::Shape(format!(
                "network has {} outputs but only {} categories are known",
                scores.len(),
                self.config.category.len()
            ))
        })?;
        info!("{} -> {}", frame.display(), label);
        Ok(label)
    }

    /// A random frame of the resized dataset and its category index.
    pub fn get_random_frame(&mut self) -> Result<(PathBuf, usize)> {
        let source = dataset::ensure_adapted(&self.paths.dataset_dir(), self.config.img_rows, self.config.img_cols)?;
        dataset::random_frame(&source, &mut self.rng)
    }

    /// Best validation score and its 1-based epoch, if any epoch has run.
    pub fn best_validation_score(&self) -> Option<(usize, f64)> {
        self.history.best_validation()
    }

    /// Writes a Graphviz description of the network to `<base>.dot`.
    pub fn export_dot(&self) -> Result<PathBuf> {
        let mut name = self.store.base().as_os_str().to_os_string();
        name.push(".dot");
        let path = PathBuf::from(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.model.to_dot(&self.config.model_name))?;
        Ok(path)
    }
}

/// Whether frames loaded for `a` are valid samples for a model built from `b`.
fn same_input(a: &ModelConfig, b: &ModelConfig) -> bool {
    a.img_rows == b.img_rows
        && a.img_cols == b.img_cols
        && a.nb_channel == b.nb_channel
        && a.category == b.category
}

fn optimizer_spec(config: &ModelConfig) -> OptimizerSpec {
    config.optimizer.unwrap_or_else(|| Architecture::for_config(config).default_optimizer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write_dataset, write_png};

    fn small_config(name: &str, with_gabor: bool) -> ModelConfig {
        let mut config = ModelConfig::new(name);
        config.img_rows = 12;
        config.img_cols = 12;
        config.nb_channel = 1;
        config.nb_filters = 2;
        config.hidden_units = 4;
        config.batch_size = 4;
        config.with_gabor = with_gabor;
        config
    }

    fn project(categories: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(&dir.path().join("dataset"), categories, 2, 3, (16, 16));
        dir
    }

    #[test]
    fn train_save_and_reopen() {
        let dir = project(&["neg", "pos"]);
        let mut manager = ModelManager::new(small_config("plain", false), dir.path()).unwrap();
        manager.train_model(Some(2)).unwrap();

        let history = manager.history().clone();
        assert_eq!(history.total_train_epoch, 2);
        assert_eq!(history.done_train_epoch, 2);
        assert_eq!(history.con_mat_val.len(), 2);
        assert_eq!(history.con_mat_train.len(), 2);
        assert_eq!(manager.config().category, vec!["neg", "pos"]);
        assert!(manager.store().weights_path(WeightFormat::Architecture).exists());
        assert!(!manager.store().best_weights_path(WeightFormat::Architecture).exists());

        let (frame, _) = manager.get_random_frame().unwrap();
        let before = manager.predict_scores(&frame).unwrap();

        let mut reopened = ModelManager::open("plain", dir.path()).unwrap();
        assert_eq!(reopened.config(), manager.config());
        assert_eq!(reopened.history().con_mat_val, history.con_mat_val);
        assert_eq!(reopened.history().con_mat_train, history.con_mat_train);
        assert_eq!(reopened.history().done_train_epoch, 2);
        assert_eq!(reopened.predict_scores(&frame).unwrap(), before);
        assert!(["neg", "pos"].contains(&reopened.predict(&frame).unwrap().as_str()));
    }

    #[test]
    fn save_after_rebuild_is_what_open_returns() {
        let dir = project(&["neg", "pos"]);
        let mut manager = ModelManager::new(small_config("rebuilt", false), dir.path()).unwrap();
        manager.train_model(Some(1)).unwrap();

        manager.config.seed = 21;
        manager.build_model().unwrap();
        manager.save().unwrap();
        let saved = manager.model().export_weights();

        let reopened = ModelManager::open("rebuilt", dir.path()).unwrap();
        assert_eq!(reopened.model().export_weights(), saved);
        assert_eq!(reopened.config().seed, 21);
    }

    #[test]
    fn fresh_model_replaces_trained_one_of_same_name() {
        let dir = project(&["neg", "pos"]);
        let mut trained = ModelManager::new(small_config("same", false), dir.path()).unwrap();
        trained.train_model(Some(1)).unwrap();

        let mut config = small_config("same", false);
        config.img_rows = 16;
        config.img_cols = 16;
        let fresh = ModelManager::new(config, dir.path()).unwrap();
        fresh.save().unwrap();

        let reopened = ModelManager::open("same", dir.path()).unwrap();
        assert_eq!(reopened.model().input_shape, vec![1, 16, 16]);
        assert_eq!(reopened.model().export_weights(), fresh.model().export_weights());
    }

    #[test]
    fn reload_with_new_geometry_drops_loaded_frames() {
        let dir = project(&["neg", "pos"]);
        let mut manager = ModelManager::new(small_config("reshaped", false), dir.path()).unwrap();
        manager.load_data_set().unwrap();

        let mut config = small_config("reshaped", false);
        config.img_rows = 16;
        config.img_cols = 16;
        config.category = manager.config().category.clone();
        ModelManager::new(config, dir.path()).unwrap().save().unwrap();

        manager.reload().unwrap();
        assert!(manager.dataset().is_none());
        manager.train_model(Some(1)).unwrap();
        assert_eq!(manager.dataset().unwrap().train.images[0].shape, vec![1, 16, 16]);
    }

    #[test]
    fn reload_with_same_geometry_keeps_loaded_frames() {
        let dir = project(&["neg", "pos"]);
        let mut manager = ModelManager::new(small_config("kept", false), dir.path()).unwrap();
        manager.load_data_set().unwrap();
        manager.save().unwrap();

        manager.reload().unwrap();
        assert!(manager.dataset().is_some());
    }

    #[test]
    fn gabor_model_uses_weights_only_format() {
        let dir = project(&["neg", "pos"]);
        let mut manager = ModelManager::new(small_config("gabor", true), dir.path()).unwrap();
        manager.train_model(Some(1)).unwrap();
        assert!(manager.store().weights_path(WeightFormat::WeightsOnly).exists());

        let reopened = ModelManager::open("gabor", dir.path()).unwrap();
        assert_eq!(reopened.model().export_weights(), manager.model().export_weights());
    }

    #[test]
    fn dataset_categories_resize_the_output() {
        let dir = project(&["a", "b", "c"]);
        let mut manager = ModelManager::new(small_config("three", false), dir.path()).unwrap();
        assert_eq!(manager.model().output_shape(), &[2]);

        let loaded = manager.load_data_set().unwrap();
        assert_eq!(loaded.categories.len(), 3);
        assert_eq!(manager.model().output_shape(), &[3]);
        assert!(manager.adaptation_dir().ends_with("dataset_12X12_adaptation"));
    }

    #[test]
    fn predict_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config("sized", false);
        config.category = vec!["neg".into(), "pos".into()];
        let mut manager = ModelManager::new(config, dir.path()).unwrap();

        let frame = dir.path().join("odd.png");
        write_png(&frame, (10, 12), [9, 9, 9]);
        let err = manager.predict(&frame).unwrap_err();
        assert!(matches!(err, CnnError::ImageSizeMismatch { expected: (12, 12), actual: (10, 12) }));
    }

    #[test]
    fn predict_needs_categories() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ModelManager::new(small_config("blank", false), dir.path()).unwrap();
        let frame = dir.path().join("f.png");
        write_png(&frame, (12, 12), [1, 2, 3]);
        assert!(matches!(manager.predict(&frame), Err(CnnError::NoCategories)));
    }

    #[test]
    fn open_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ModelManager::open("ghost", dir.path()), Err(CnnError::MissingCheckpoint(_))));
    }

    #[test]
    fn reload_restores_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config("reload", false);
        config.category = vec!["x".into(), "y".into()];
        let mut manager = ModelManager::new(config, dir.path()).unwrap();
        manager.save().unwrap();
        let saved = manager.model().export_weights();

        manager.build_model().unwrap();
        manager.config.seed = 1234;
        manager.reload().unwrap();
        assert_eq!(manager.config().seed, 7);
        assert_eq!(manager.model().export_weights(), saved);
    }

    #[test]
    fn dot_export_lands_next_to_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(small_config("drawn", false), dir.path()).unwrap();
        let path = manager.export_dot().unwrap();
        assert_eq!(path, dir.path().join("cnn_models").join("drawn.dot"));
        assert!(fs::read_to_string(path).unwrap().contains("Conv2D"));
    }
}
