use serde::{Serialize, Deserialize};

use crate::metrics::ConfusionMatrix;
use crate::train::epoch_stats::EpochStats;

/// Everything recorded while training one model. Field names double as the
/// checkpoint metadata keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// One entry per completed epoch, on the training split.
    #[serde(default)]
    pub con_mat_train: Vec<ConfusionMatrix>,
    /// One entry per completed epoch, on the validation split.
    #[serde(default)]
    pub con_mat_val: Vec<ConfusionMatrix>,
    #[serde(default)]
    pub hist: Vec<EpochStats>,
    /// Epochs requested by the most recent `train_model` call.
    #[serde(default)]
    pub total_train_epoch: usize,
    /// Epochs completed over the model's lifetime.
    #[serde(default)]
    pub done_train_epoch: usize,
}

impl TrainingHistory {
    pub fn validation_scores(&self) -> Vec<f64> {
        self.con_mat_val.iter().map(ConfusionMatrix::score).collect()
    }

    /// True when no earlier validation score beats the latest one.
    /// Ties count as best. False when there is no history.
    pub fn latest_val_is_best(&self) -> bool {
        match self.validation_scores().split_last() {
            Some((last, earlier)) => earlier.iter().all(|s| s <= last),
            None => false,
        }
    }

    /// Highest validation score and its 1-based epoch.
    pub fn best_validation(&self) -> Option<(usize, f64)> {
        self.validation_scores()
            .into_iter()
            .enumerate()
            .fold(None, |best, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i + 1, s)),
            })
    }
}
