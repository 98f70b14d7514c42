use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{CnnError, Result};
use crate::math::tensor::Tensor;

/// Fully connected layer: `y = W·x + b`. The activation is a separate layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub input_size: usize,
    pub size: usize,
    /// `[size, input_size]`
    pub weights: Tensor,
    /// `[size]`
    pub biases: Tensor,
    #[serde(skip)]
    grad_w: Tensor,
    #[serde(skip)]
    grad_b: Tensor,
    #[serde(skip)]
    input: Tensor,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(input_size: usize, size: usize, rng: &mut R) -> Dense {
        Dense {
            input_size,
            size,
            weights: Tensor::glorot_uniform(&[size, input_size], input_size, size, rng),
            biases: Tensor::zeros(&[size]),
            grad_w: Tensor::zeros(&[size, input_size]),
            grad_b: Tensor::zeros(&[size]),
            input: Tensor::default(),
        }
    }

    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        if input != [self.input_size] {
            return Err(CnnError::Shape(format!(
                "dense layer expects [{}], got {:?}",
                self.input_size, input
            )));
        }
        Ok(vec![self.size])
    }

    pub fn forward(&mut self, input: Tensor) -> Tensor {
        assert_eq!(input.len(), self.input_size, "dense input size mismatch");
        let data = (0..self.size)
            .map(|o| {
                let row = &self.weights.data[o * self.input_size..(o + 1) * self.input_size];
                self.biases.data[o] + row.iter().zip(&input.data).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect();
        self.input = input;
        Tensor::from_vec(&[self.size], data)
    }

    /// `grad` is ∂L/∂y. Accumulates ∂L/∂W = grad ⊗ x and ∂L/∂b = grad,
    /// returns ∂L/∂x = Wᵀ·grad.
    pub fn backward(&mut self, grad: Tensor) -> Tensor {
        if self.grad_w.len() != self.weights.len() {
            self.zero_grad();
        }
        let mut grad_in = Tensor::zeros(&[self.input_size]);
        for o in 0..self.size {
            let g = grad.data[o];
            self.grad_b.data[o] += g;
            let base = o * self.input_size;
            for i in 0..self.input_size {
                self.grad_w.data[base + i] += g * self.input.data[i];
                grad_in.data[i] += g * self.weights.data[base + i];
            }
        }
        grad_in
    }

    pub fn zero_grad(&mut self) {
        self.grad_w = Tensor::zeros(&self.weights.shape);
        self.grad_b = Tensor::zeros(&self.biases.shape);
    }

    pub fn params_mut(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![(&mut self.weights, &self.grad_w), (&mut self.biases, &self.grad_b)]
    }

    pub fn params(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.biases]
    }
}
