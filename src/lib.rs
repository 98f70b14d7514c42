pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod metrics;
pub mod dataset;
pub mod train;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;

#[cfg(test)]
pub(crate) mod testutil;

// Convenience re-exports
pub use math::tensor::Tensor;
pub use activation::ActivationFunction;
pub use layers::{Layer, Phase};
pub use network::{build_network, Architecture, Sequential};
pub use loss::LossType;
pub use optim::{Optimizer, OptimizerSpec};
pub use metrics::ConfusionMatrix;
pub use dataset::Dataset;
pub use train::{fit, EpochStats, FitConfig, TrainingHistory};
pub use checkpoint::{CheckpointStore, ModelMetadata, WeightFormat};
pub use config::{ModelConfig, ProjectPaths};
pub use error::{CnnError, Result};
pub use manager::ModelManager;
