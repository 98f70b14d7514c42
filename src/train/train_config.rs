use crate::config::ModelConfig;
use crate::loss::LossType;

/// Configuration for a `fit` run.
///
/// - `epochs`     total number of full passes over the training data
/// - `batch_size` samples per mini-batch; `1` gives online updates
/// - `loss`       objective whose derivative drives backprop
/// - `seed`       seeds the per-epoch sample shuffle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub loss: LossType,
    pub seed: u64,
}

impl FitConfig {
    pub fn new(epochs: usize, batch_size: usize, loss: LossType) -> Self {
        FitConfig { epochs, batch_size, loss, seed: 0 }
    }

    /// Takes batch size, loss and seed from `config`.
    pub fn from_model_config(config: &ModelConfig, epochs: usize) -> Self {
        FitConfig { epochs, batch_size: config.batch_size, loss: config.loss, seed: config.seed }
    }
}
