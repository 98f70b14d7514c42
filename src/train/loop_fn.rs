use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::info;

use crate::dataset::LabeledSet;
use crate::error::{CnnError, Result};
use crate::layers::Phase;
use crate::loss::LossType;
use crate::math::tensor::Tensor;
use crate::network::Sequential;
use crate::optim::Optimizer;
use crate::train::epoch_stats::EpochStats;
use crate::train::history::TrainingHistory;
use crate::train::hooks::EpochHook;
use crate::train::train_config::FitConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `model` for `config.epochs` epochs and returns the mean training
/// loss of the last completed epoch.
///
/// After every epoch the model is evaluated in inference mode on both
/// splits, an `EpochStats` is appended to `history.hist`, and each hook runs
/// in order. A hook error aborts training with that error.
pub fn fit(
    model: &mut Sequential,
    optimizer: &mut Optimizer,
    train: &LabeledSet,
    validation: Option<&LabeledSet>,
    config: &FitConfig,
    history: &mut TrainingHistory,
    hooks: &mut [&mut dyn EpochHook],
) -> Result<f64> {
    if train.is_empty() {
        return Err(CnnError::Config("training set is empty".into()));
    }
    if config.batch_size == 0 {
        return Err(CnnError::Config("batch_size must be at least 1".into()));
    }
    if train.targets.len() != train.len() {
        return Err(CnnError::Config("training targets are not encoded".into()));
    }
    let validation = validation.filter(|v| !v.is_empty());

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        let train_loss = run_one_epoch(model, optimizer, train, config, &mut rng);
        last_train_loss = train_loss;

        let (_, train_accuracy) = evaluate(model, train, config.loss);
        let (val_loss, val_accuracy) = match validation {
            Some(v) => {
                let (loss, accuracy) = evaluate(model, v, config.loss);
                (Some(loss), Some(accuracy))
            }
            None => (None, None),
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            val_loss,
            train_accuracy,
            val_accuracy,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        info!(
            "epoch {}/{}: loss {:.4} acc {:.3} | val loss {} val acc {} ({} ms)",
            epoch,
            config.epochs,
            train_loss,
            train_accuracy,
            fmt_opt(val_loss),
            fmt_opt(val_accuracy),
            stats.elapsed_ms
        );
        history.hist.push(stats.clone());

        for hook in hooks.iter_mut() {
            hook.on_epoch_end(&stats, model, history)?;
        }
    }

    Ok(last_train_loss)
}

/// Mean loss and argmax accuracy over `set`, without touching gradients.
pub fn evaluate(model: &mut Sequential, set: &LabeledSet, loss: LossType) -> (f64, f64) {
    if set.is_empty() {
        return (0.0, 0.0);
    }
    let mut total_loss = 0.0;
    let mut correct = 0usize;
    for (i, image) in set.images.iter().enumerate() {
        let output = model.forward(image.clone(), Phase::Infer);
        if let Some(target) = set.targets.get(i) {
            total_loss += loss.loss(&output.data, target);
        }
        if output.argmax() == set.labels[i] {
            correct += 1;
        }
    }
    let n = set.len() as f64;
    (total_loss / n, correct as f64 / n)
}

/// Argmax class of every sample in `set`, in order.
pub fn predicted_labels(model: &mut Sequential, set: &LabeledSet) -> Vec<usize> {
    set.images
        .iter()
        .map(|image| model.forward(image.clone(), Phase::Infer).argmax())
        .collect()
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One shuffled pass of mini-batch updates. Returns the mean loss over all
/// samples as seen during the pass (dropout active).
fn run_one_epoch(
    model: &mut Sequential,
    optimizer: &mut Optimizer,
    train: &LabeledSet,
    config: &FitConfig,
    rng: &mut ChaCha8Rng,
) -> f64 {
    let n = train.len();
    let mut total_loss = 0.0;

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    for batch in indices.chunks(config.batch_size) {
        model.zero_grad();
        for &idx in batch {
            let output = model.forward(train.images[idx].clone(), Phase::Train);
            let target = &train.targets[idx];
            total_loss += config.loss.loss(&output.data, target);

            let grad = config.loss.derivative(&output.data, target);
            model.backward(Tensor::from_vec(&output.shape, grad));
        }
        optimizer.step(model, batch.len());
    }

    total_loss / n as f64
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}
