pub mod conv;
pub mod dense;
pub mod dropout;
pub mod pool;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::math::tensor::Tensor;

pub use conv::{Conv2d, Padding};
pub use dense::Dense;
pub use dropout::Dropout;
pub use pool::MaxPool2d;

/// Whether a forward pass is part of training (dropout active, caches kept
/// for backprop) or plain inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Infer,
}

/// Collapses any input to a vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flatten {
    #[serde(skip)]
    input_shape: Vec<usize>,
}

/// Applies an `ActivationFunction` to its whole input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationLayer {
    pub function: ActivationFunction,
    #[serde(skip)]
    pre_activation: Tensor,
    #[serde(skip)]
    output: Tensor,
}

impl ActivationLayer {
    pub fn new(function: ActivationFunction) -> ActivationLayer {
        ActivationLayer { function, pre_activation: Tensor::default(), output: Tensor::default() }
    }

    fn forward(&mut self, input: Tensor) -> Tensor {
        let output = Tensor { shape: input.shape.clone(), data: self.function.apply(&input.data) };
        self.pre_activation = input;
        self.output = output.clone();
        output
    }

    fn backward(&mut self, grad: Tensor) -> Tensor {
        match self.function {
            // Jacobian-vector product: s ⊙ (g − ⟨g, s⟩)
            ActivationFunction::Softmax => {
                let inner = grad.dot(&self.output);
                let data = self.output.data.iter().zip(&grad.data)
                    .map(|(s, g)| s * (g - inner))
                    .collect();
                Tensor { shape: grad.shape, data }
            }
            f => {
                let data = self.pre_activation.data.iter().zip(&grad.data)
                    .map(|(z, g)| g * f.derivative(*z))
                    .collect();
                Tensor { shape: grad.shape, data }
            }
        }
    }
}

/// One stage of a `Sequential` network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Dropout(Dropout),
    Flatten(Flatten),
    Dense(Dense),
    Activation(ActivationLayer),
}

impl Layer {
    pub fn activation(function: ActivationFunction) -> Layer {
        Layer::Activation(ActivationLayer::new(function))
    }

    pub fn flatten() -> Layer {
        Layer::Flatten(Flatten::default())
    }

    pub fn forward<R: Rng + ?Sized>(&mut self, input: Tensor, phase: Phase, rng: &mut R) -> Tensor {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::MaxPool2d(l) => l.forward(input),
            Layer::Dropout(l) => match phase {
                Phase::Train => l.forward_train(input, rng),
                Phase::Infer => l.forward_infer(input),
            },
            Layer::Flatten(l) => {
                let n = input.len();
                l.input_shape = input.shape.clone();
                input.reshape(&[n])
            }
            Layer::Dense(l) => l.forward(input),
            Layer::Activation(l) => l.forward(input),
        }
    }

    /// Propagates ∂L/∂output back to ∂L/∂input, accumulating parameter
    /// gradients on the way.
    pub fn backward(&mut self, grad: Tensor) -> Tensor {
        match self {
            Layer::Conv2d(l) => l.backward(grad),
            Layer::MaxPool2d(l) => l.backward(grad),
            Layer::Dropout(l) => l.backward(grad),
            Layer::Flatten(l) => grad.reshape(&l.input_shape),
            Layer::Dense(l) => l.backward(grad),
            Layer::Activation(l) => l.backward(grad),
        }
    }

    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        match self {
            Layer::Conv2d(l) => l.output_shape(input),
            Layer::MaxPool2d(l) => l.output_shape(input),
            Layer::Flatten(_) => Ok(vec![input.iter().product()]),
            Layer::Dense(l) => l.output_shape(input),
            Layer::Dropout(_) | Layer::Activation(_) => Ok(input.to_vec()),
        }
    }

    pub fn zero_grad(&mut self) {
        match self {
            Layer::Conv2d(l) => l.zero_grad(),
            Layer::Dense(l) => l.zero_grad(),
            _ => {}
        }
    }

    /// Trainable tensors paired with their accumulated gradients.
    pub fn params_mut(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        match self {
            Layer::Conv2d(l) => l.params_mut(),
            Layer::Dense(l) => l.params_mut(),
            _ => Vec::new(),
        }
    }

    pub fn params(&self) -> Vec<&Tensor> {
        match self {
            Layer::Conv2d(l) => l.params(),
            Layer::Dense(l) => l.params(),
            _ => Vec::new(),
        }
    }

    /// Short human-readable description, e.g. `Conv2D 32 3x3 same`.
    pub fn describe(&self) -> String {
        match self {
            Layer::Conv2d(l) => format!(
                "Conv2D {} {}x{} {}",
                l.out_channels,
                l.kernel.0,
                l.kernel.1,
                match l.padding { Padding::Same => "same", Padding::Valid => "valid" }
            ),
            Layer::MaxPool2d(l) => format!("MaxPooling2D {}x{}", l.pool.0, l.pool.1),
            Layer::Dropout(l) => format!("Dropout {}", l.rate),
            Layer::Flatten(_) => "Flatten".to_string(),
            Layer::Dense(l) => format!("Dense {}", l.size),
            Layer::Activation(l) => format!("Activation {}", l.function),
        }
    }
}
