use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading data, building, training or persisting a model.
#[derive(Error, Debug)]
pub enum CnnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("weight file error: {0}")]
    Weights(#[from] bincode::Error),

    /// A prediction input does not have the configured `(width, height)`.
    #[error("image size does not match: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ImageSizeMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// A dataset frame does not have the configured `(width, height)`.
    #[error("frame '{}' is {}x{}, expected {}x{}", path.display(), actual.0, actual.1, expected.0, expected.1)]
    InconsistentImage {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("shape error: {0}")]
    Shape(String),

    #[error("no checkpoint found at '{}'", .0.display())]
    MissingCheckpoint(PathBuf),

    #[error("model has no categories; load a data set or train first")]
    NoCategories,
}

pub type Result<T> = std::result::Result<T, CnnError>;
