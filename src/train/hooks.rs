use tracing::info;

use crate::checkpoint::{CheckpointStore, ModelMetadata, WeightFormat};
use crate::config::ModelConfig;
use crate::dataset::LabeledSet;
use crate::error::Result;
use crate::metrics::ConfusionMatrix;
use crate::network::Sequential;
use crate::train::epoch_stats::EpochStats;
use crate::train::history::TrainingHistory;
use crate::train::loop_fn::predicted_labels;

/// Called by `fit` after each epoch's statistics have been recorded.
pub trait EpochHook {
    fn on_epoch_end(
        &mut self,
        stats: &EpochStats,
        model: &mut Sequential,
        history: &mut TrainingHistory,
    ) -> Result<()>;
}

/// Appends a confusion matrix for each split to the history and counts the
/// epoch as done.
pub struct ConfusionTracker<'a> {
    pub train: &'a LabeledSet,
    pub validation: &'a LabeledSet,
    /// Label treated as positive.
    pub positive: usize,
}

impl<'a> ConfusionTracker<'a> {
    pub fn new(train: &'a LabeledSet, validation: &'a LabeledSet) -> Self {
        ConfusionTracker { train, validation, positive: 1 }
    }

    fn matrix(&self, model: &mut Sequential, set: &LabeledSet) -> ConfusionMatrix {
        let predicted = predicted_labels(model, set);
        ConfusionMatrix::from_predictions(&set.labels, &predicted, self.positive)
    }
}

impl EpochHook for ConfusionTracker<'_> {
    fn on_epoch_end(&mut self, _: &EpochStats, model: &mut Sequential, history: &mut TrainingHistory) -> Result<()> {
        let val = self.matrix(model, self.validation);
        let train = self.matrix(model, self.train);
        history.con_mat_val.push(val);
        history.con_mat_train.push(train);
        history.done_train_epoch += 1;
        Ok(())
    }
}

/// Saves a `(best)` checkpoint whenever the latest validation score is at
/// least as good as every earlier one.
pub struct BestCheckpoint<'a> {
    pub store: &'a CheckpointStore,
    pub format: WeightFormat,
    pub config: &'a ModelConfig,
}

impl EpochHook for BestCheckpoint<'_> {
    fn on_epoch_end(&mut self, stats: &EpochStats, model: &mut Sequential, history: &mut TrainingHistory) -> Result<()> {
        if !history.latest_val_is_best() {
            return Ok(());
        }
        let metadata = ModelMetadata { config: self.config.clone(), history: history.clone() };
        self.store.save_best(model, self.format, &metadata)?;
        info!("epoch {}: new best validation score, checkpoint saved", stats.epoch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{Dense, Layer};
    use crate::math::tensor::Tensor;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::path::PathBuf;

    fn stats(epoch: usize) -> EpochStats {
        EpochStats {
            epoch,
            total_epochs: 3,
            train_loss: 0.5,
            val_loss: None,
            train_accuracy: 0.5,
            val_accuracy: None,
            elapsed_ms: 0,
        }
    }

    /// Always predicts class 1.
    fn constant_model() -> Sequential {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut dense = Dense::new(1, 2, &mut rng);
        dense.weights.fill_zero();
        dense.biases = Tensor::from_vec(&[2], vec![0.0, 1.0]);
        let mut net = Sequential::new(&[1], 0);
        net.push(Layer::Dense(dense)).unwrap();
        net.push(Layer::activation(ActivationFunction::Softmax)).unwrap();
        net
    }

    fn set(labels: &[usize]) -> LabeledSet {
        let mut set = LabeledSet::default();
        for (i, &label) in labels.iter().enumerate() {
            set.push(Tensor::from_vec(&[1], vec![i as f64]), label, PathBuf::from(i.to_string()));
        }
        set.encode_targets(2);
        set
    }

    #[test]
    fn tracker_appends_both_matrices() {
        let train = set(&[0, 1, 1]);
        let validation = set(&[0, 1]);
        let mut tracker = ConfusionTracker::new(&train, &validation);
        let mut history = TrainingHistory::default();
        let mut model = constant_model();

        tracker.on_epoch_end(&stats(1), &mut model, &mut history).unwrap();
        tracker.on_epoch_end(&stats(2), &mut model, &mut history).unwrap();

        assert_eq!(history.done_train_epoch, 2);
        assert_eq!(history.con_mat_val, vec![ConfusionMatrix::from([0, 1, 0, 1]); 2]);
        assert_eq!(history.con_mat_train[0], ConfusionMatrix::from([0, 1, 0, 2]));
    }

    #[test]
    fn best_checkpoint_saves_only_on_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("hooked"));
        let mut config = ModelConfig::new("hooked");
        config.img_rows = 1;
        config.img_cols = 1;
        config.nb_channel = 1;
        let mut hook = BestCheckpoint { store: &store, format: WeightFormat::Architecture, config: &config };
        let mut model = constant_model();
        let best = store.best_weights_path(WeightFormat::Architecture);

        let mut history = TrainingHistory::default();
        history.con_mat_val.push(ConfusionMatrix::from([5, 0, 0, 5]));
        hook.on_epoch_end(&stats(1), &mut model, &mut history).unwrap();
        assert!(best.exists());
        assert_eq!(store.load_metadata().unwrap().history.con_mat_val.len(), 1);

        std::fs::remove_file(&best).unwrap();
        history.con_mat_val.push(ConfusionMatrix::from([4, 1, 1, 4]));
        hook.on_epoch_end(&stats(2), &mut model, &mut history).unwrap();
        assert!(!best.exists());
    }
}
