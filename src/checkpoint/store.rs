use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::checkpoint::{ModelMetadata, WeightFormat};
use crate::config::ModelConfig;
use crate::error::{CnnError, Result};
use crate::math::tensor::Tensor;
use crate::network::{build_network, Sequential};

const BEST_SUFFIX: &str = "(best)";

/// Reads and writes the checkpoint files of one model.
///
/// Every file is written to a `.tmp` sibling and renamed into place, and
/// weights are always written before metadata, so a crash leaves either the
/// previous pair or weights newer than their metadata, never a torn file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    base: PathBuf,
}

impl CheckpointStore {
    /// `base` is the checkpoint path without extension.
    pub fn new(base: impl Into<PathBuf>) -> CheckpointStore {
        CheckpointStore { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn metadata_path(&self) -> PathBuf {
        with_suffix(&self.base, ".json")
    }

    pub fn weights_path(&self, format: WeightFormat) -> PathBuf {
        with_suffix(&self.base, &format!(".{}", format.extension()))
    }

    pub fn best_weights_path(&self, format: WeightFormat) -> PathBuf {
        with_suffix(&self.weights_path(format), BEST_SUFFIX)
    }

    pub fn exists(&self) -> bool {
        self.metadata_path().exists()
    }

    /// Writes the regular weight file, then the metadata, then drops any
    /// `(best)` file so it cannot shadow the pair just written.
    pub fn save(&self, model: &Sequential, format: WeightFormat, metadata: &ModelMetadata) -> Result<()> {
        self.write_pair(&self.weights_path(format), model, format, metadata)?;
        let best = self.best_weights_path(format);
        if best.exists() {
            fs::remove_file(&best)?;
            debug!("removed superseded {}", best.display());
        }
        Ok(())
    }

    /// Writes the `(best)` weight file, then the metadata.
    pub fn save_best(&self, model: &Sequential, format: WeightFormat, metadata: &ModelMetadata) -> Result<()> {
        self.write_pair(&self.best_weights_path(format), model, format, metadata)
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            return Err(CnnError::MissingCheckpoint(path));
        }
        let reader = BufReader::new(File::open(&path)?);
        let metadata: ModelMetadata = serde_json::from_reader(reader)?;
        metadata.config.validate()?;
        Ok(metadata)
    }

    /// Loads the network, preferring the `(best)` weight file over the
    /// regular one.
    pub fn load_network(&self, format: WeightFormat, config: &ModelConfig) -> Result<Sequential> {
        let best = self.best_weights_path(format);
        let path = if best.exists() { best } else { self.weights_path(format) };
        if !path.exists() {
            return Err(CnnError::MissingCheckpoint(path));
        }
        info!("loading {} weights from {}", format, path.display());

        let reader = BufReader::new(File::open(&path)?);
        let model = match format {
            WeightFormat::Architecture => {
                let mut model: Sequential = bincode::deserialize_from(reader)?;
                model.reseed(config.seed);
                model
            }
            WeightFormat::WeightsOnly => {
                let weights: Vec<Tensor> = bincode::deserialize_from(reader)?;
                let mut model = build_network(config, config.num_classes())?;
                model.import_weights(weights)?;
                model
            }
        };

        let expected = [config.nb_channel, config.img_rows as usize, config.img_cols as usize];
        if model.input_shape != expected {
            return Err(CnnError::Shape(format!(
                "checkpoint expects input {:?}, config describes {:?}",
                model.input_shape, expected
            )));
        }
        Ok(model)
    }

    fn write_pair(
        &self,
        weights_path: &Path,
        model: &Sequential,
        format: WeightFormat,
        metadata: &ModelMetadata,
    ) -> Result<()> {
        if let Some(parent) = self.base.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(weights_path, |w| {
            match format {
                WeightFormat::Architecture => bincode::serialize_into(w, model)?,
                WeightFormat::WeightsOnly => bincode::serialize_into(w, &model.export_weights())?,
            }
            Ok(())
        })?;
        write_atomic(&self.metadata_path(), |w| {
            serde_json::to_writer_pretty(w, metadata)?;
            Ok(())
        })?;
        debug!("checkpoint written to {}", weights_path.display());
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp = with_suffix(path, ".tmp");
    let mut writer = BufWriter::new(File::create(&tmp)?);
    write(&mut writer)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&tmp, path)?;
    Ok(())
}
