//! Checkpoint persistence: a binary weight file plus a JSON metadata file
//! sharing one base path.

pub mod store;

use serde::{Serialize, Deserialize};
use std::fmt;

use crate::config::ModelConfig;
use crate::train::history::TrainingHistory;

pub use store::CheckpointStore;

/// How a model's weights are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightFormat {
    /// The whole `Sequential` (layer stack and weights), `<base>.model`.
    Architecture,
    /// Parameter tensors only, `<base>.weights`. The network is rebuilt from
    /// the config and then filled.
    WeightsOnly,
}

impl WeightFormat {
    /// Gabor-seeded networks are stored weights-only, everything else as a
    /// full architecture.
    pub fn for_config(config: &ModelConfig) -> WeightFormat {
        if config.with_gabor { WeightFormat::WeightsOnly } else { WeightFormat::Architecture }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            WeightFormat::Architecture => "model",
            WeightFormat::WeightsOnly => "weights",
        }
    }
}

impl fmt::Display for WeightFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Everything written to `<base>.json`: hyperparameters and training record
/// side by side in one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(flatten)]
    pub config: ModelConfig,
    #[serde(flatten)]
    pub history: TrainingHistory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ConfusionMatrix;

    #[test]
    fn metadata_is_one_flat_object() {
        let mut history = TrainingHistory::default();
        history.con_mat_val.push(ConfusionMatrix::from([1, 2, 3, 4]));
        history.done_train_epoch = 1;
        let meta = ModelMetadata { config: ModelConfig::new("flat"), history };

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["model_name"], "flat");
        assert_eq!(value["con_mat_val"][0], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(value["done_train_epoch"], 1);
        assert_eq!(value["pool_size"], serde_json::json!([2, 2]));

        let back: ModelMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn metadata_without_history_loads() {
        let meta: ModelMetadata =
            serde_json::from_str(r#"{"model_name": "old", "category": ["a", "b"], "pool_size": 2}"#).unwrap();
        assert_eq!(meta.config.category, vec!["a", "b"]);
        assert_eq!(meta.history, TrainingHistory::default());
    }

    #[test]
    fn format_follows_gabor_flag() {
        let mut config = ModelConfig::new("m");
        assert_eq!(WeightFormat::for_config(&config), WeightFormat::WeightsOnly);
        config.with_gabor = false;
        assert_eq!(WeightFormat::for_config(&config), WeightFormat::Architecture);
        assert_eq!(WeightFormat::Architecture.to_string(), "model");
    }
}
