pub mod epoch_stats;
pub mod history;
pub mod hooks;
pub mod loop_fn;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use history::TrainingHistory;
pub use hooks::{BestCheckpoint, ConfusionTracker, EpochHook};
pub use loop_fn::{evaluate, fit, predicted_labels};
pub use train_config::FitConfig;
