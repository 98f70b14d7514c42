use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::activation::ActivationFunction;
use crate::error::{CnnError, Result};
use crate::loss::LossType;
use crate::optim::OptimizerSpec;

/// A `(rows, cols)` window. Deserializes from either `3` or `[3, 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size2(pub usize, pub usize);

impl Size2 {
    pub fn square(n: usize) -> Size2 {
        Size2(n, n)
    }

    pub fn as_tuple(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}

impl Serialize for Size2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.0, self.1].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Size2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Square(usize),
            Pair([usize; 2]),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Square(n) => Ok(Size2(n, n)),
            Repr::Pair([r, c]) => Ok(Size2(r, c)),
            Repr::Text(s) => s
                .trim()
                .parse::<usize>()
                .map(Size2::square)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn default_rows() -> u32 { 200 }
fn default_cols() -> u32 { 200 }
fn default_channels() -> usize { 3 }
fn default_batch_size() -> usize { 32 }
fn default_epoch() -> usize { 5 }
fn default_filters() -> usize { 32 }
fn default_pool() -> Size2 { Size2::square(2) }
fn default_kernel() -> Size2 { Size2::square(3) }
fn default_dropout() -> f64 { 0.5 }
fn default_activation() -> ActivationFunction { ActivationFunction::Softmax }
fn default_hidden() -> usize { 64 }
fn default_true() -> bool { true }
fn default_test_size() -> f64 { 0.2 }
fn default_seed() -> u64 { 7 }

/// Hyperparameters of one named model.
///
/// Every field except `model_name` has a default, so a config file only
/// needs to name what it changes. Field names are also the keys written to
/// the checkpoint's JSON side-car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Used as the checkpoint file stem.
    pub model_name: String,
    #[serde(default = "default_rows")]
    pub img_rows: u32,
    #[serde(default = "default_cols")]
    pub img_cols: u32,
    #[serde(default = "default_channels")]
    pub nb_channel: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Epochs used when `train_model` is not given an explicit count.
    #[serde(default = "default_epoch")]
    pub epoch: usize,
    /// Convolution filters per block.
    #[serde(default = "default_filters")]
    pub nb_filters: usize,
    #[serde(default = "default_pool")]
    pub pool_size: Size2,
    #[serde(default = "default_kernel")]
    pub kernel_size: Size2,
    /// Dropout after the convolution blocks of the three-block network.
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    /// Output-layer activation.
    #[serde(default = "default_activation")]
    pub activation_function: ActivationFunction,
    #[serde(default = "default_hidden")]
    pub hidden_units: usize,
    /// Category names in label order; filled from the dataset folders.
    #[serde(default)]
    pub category: Vec<String>,
    /// Seed the first convolution with a Gabor filter bank (two-block network).
    #[serde(default = "default_true")]
    pub with_gabor: bool,
    /// Split train/validation by case folder instead of by frame.
    #[serde(default = "default_true")]
    pub split_cases: bool,
    /// Validation fraction for the per-frame split.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub loss: LossType,
    /// `None` picks the architecture's default optimizer.
    #[serde(default)]
    pub optimizer: Option<OptimizerSpec>,
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>) -> ModelConfig {
        ModelConfig {
            model_name: model_name.into(),
            img_rows: default_rows(),
            img_cols: default_cols(),
            nb_channel: default_channels(),
            batch_size: default_batch_size(),
            epoch: default_epoch(),
            nb_filters: default_filters(),
            pool_size: default_pool(),
            kernel_size: default_kernel(),
            dropout: default_dropout(),
            activation_function: default_activation(),
            hidden_units: default_hidden(),
            category: Vec::new(),
            with_gabor: true,
            split_cases: true,
            test_size: default_test_size(),
            seed: default_seed(),
            loss: LossType::default(),
            optimizer: None,
        }
    }

    /// Number of output units: the category count, or 2 before any data set
    /// has been seen.
    pub fn num_classes(&self) -> usize {
        if self.category.is_empty() { 2 } else { self.category.len() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(CnnError::Config("model_name must not be empty".into()));
        }
        if self.img_rows == 0 || self.img_cols == 0 {
            return Err(CnnError::Config("image dimensions must be positive".into()));
        }
        if !matches!(self.nb_channel, 1 | 3 | 4) {
            return Err(CnnError::UnsupportedChannels(self.nb_channel));
        }
        if self.batch_size == 0 || self.nb_filters == 0 || self.hidden_units == 0 {
            return Err(CnnError::Config(
                "batch_size, nb_filters and hidden_units must be positive".into(),
            ));
        }
        if self.pool_size.0 == 0 || self.pool_size.1 == 0 {
            return Err(CnnError::Config("pool_size must be positive".into()));
        }
        if self.kernel_size.0 == 0 || self.kernel_size.1 == 0 {
            return Err(CnnError::Config("kernel_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(CnnError::Config(format!("dropout {} is outside [0, 1)", self.dropout)));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(CnnError::Config(format!("test_size {} is outside (0, 1)", self.test_size)));
        }
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<ModelConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: ModelConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

/// Directory conventions under a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> ProjectPaths {
        ProjectPaths { root: root.into() }
    }

    /// The unresized `<category>/<case>/<frame>` tree.
    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("dataset")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("cnn_models")
    }

    /// Checkpoint path without extension.
    pub fn checkpoint_base(&self, model_name: &str) -> PathBuf {
        self.models_dir().join(model_name)
    }
}
