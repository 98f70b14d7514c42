use serde::{Serialize, Deserialize};
use std::f64::consts::E;
use std::fmt;
use std::str::FromStr;

use crate::error::CnnError;

/// Activation applied by an `Activation` layer, stored in model metadata
/// by its lowercase name (`"relu"`, `"softmax"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationFunction {
    Relu,
    Sigmoid,
    /// Vector-valued; applied over the whole input by `apply`.
    Softmax,
    Tanh,
    Linear,
}

impl ActivationFunction {
    /// Element-wise activation. `Softmax` has no element-wise form; use `apply`.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Relu => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Linear => x,
        }
    }

    /// Element-wise derivative at the pre-activation value `x`.
    /// `Softmax` is handled by the layer through its Jacobian.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Relu => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Linear => 1.0,
        }
    }

    /// Applies the activation to a whole vector.
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        match self {
            ActivationFunction::Softmax => softmax(input),
            other => input.iter().map(|&x| other.function(x)).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Relu => "relu",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Softmax => "softmax",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Linear => "linear",
        }
    }
}

/// Numerically stable softmax (max-subtracted).
pub fn softmax(input: &[f64]) -> Vec<f64> {
    let max = input.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = input.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationFunction {
    type Err = CnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(ActivationFunction::Relu),
            "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "softmax" => Ok(ActivationFunction::Softmax),
            "tanh" => Ok(ActivationFunction::Tanh),
            "linear" | "identity" => Ok(ActivationFunction::Linear),
            other => Err(CnnError::Config(format!("unknown activation function '{}'", other))),
        }
    }
}
