pub mod adam;
pub mod sgd;

use serde::{Serialize, Deserialize};

use crate::network::Sequential;

pub use adam::Adam;
pub use sgd::Sgd;

/// Serializable optimizer choice with its hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        learning_rate: f64,
        momentum: f64,
        decay: f64,
        nesterov: bool,
    },
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
}

impl OptimizerSpec {
    /// SGD(lr 0.1, decay 1e-6, momentum 0.9, Nesterov).
    pub fn nesterov_sgd() -> OptimizerSpec {
        OptimizerSpec::Sgd { learning_rate: 0.1, momentum: 0.9, decay: 1e-6, nesterov: true }
    }

    pub fn adam() -> OptimizerSpec {
        OptimizerSpec::Adam { learning_rate: 0.001, beta1: 0.9, beta2: 0.999, epsilon: 1e-8 }
    }

    pub fn build(&self) -> Optimizer {
        match *self {
            OptimizerSpec::Sgd { learning_rate, momentum, decay, nesterov } => {
                Optimizer::Sgd(Sgd::new(learning_rate, momentum, decay, nesterov))
            }
            OptimizerSpec::Adam { learning_rate, beta1, beta2, epsilon } => {
                Optimizer::Adam(Adam::new(learning_rate, beta1, beta2, epsilon))
            }
        }
    }
}

/// A stateful optimizer bound to one network's parameter order.
#[derive(Debug, Clone)]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    /// Updates every trainable tensor of `model` from its accumulated
    /// gradients, averaged over `batch_size` samples.
    pub fn step(&mut self, model: &mut Sequential, batch_size: usize) {
        let scale = 1.0 / batch_size.max(1) as f64;
        let params = model.params_mut();
        match self {
            Optimizer::Sgd(o) => o.step(params, scale),
            Optimizer::Adam(o) => o.step(params, scale),
        }
    }
}
