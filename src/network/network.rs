use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use std::fmt::Write as _;

use crate::error::{CnnError, Result};
use crate::layers::{Layer, Phase};
use crate::math::tensor::Tensor;

fn default_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

/// A linear stack of layers fed one `[C, H, W]` sample at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequential {
    pub input_shape: Vec<usize>,
    pub layers: Vec<Layer>,
    output_shape: Vec<usize>,
    /// Drives dropout masks.
    #[serde(skip, default = "default_rng")]
    rng: ChaCha8Rng,
}

impl Sequential {
    pub fn new(input_shape: &[usize], seed: u64) -> Sequential {
        Sequential {
            input_shape: input_shape.to_vec(),
            layers: Vec::new(),
            output_shape: input_shape.to_vec(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Appends a layer after checking it accepts the current output shape.
    pub fn push(&mut self, layer: Layer) -> Result<&mut Self> {
        self.output_shape = layer.output_shape(&self.output_shape)?;
        self.layers.push(layer);
        Ok(self)
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Forward pass; in `Phase::Train` every layer keeps what it needs for
    /// `backward`.
    pub fn forward(&mut self, input: Tensor, phase: Phase) -> Tensor {
        assert_eq!(input.shape, self.input_shape, "network input shape mismatch");
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.forward(current, phase, &mut self.rng);
        }
        current
    }

    pub fn predict(&mut self, input: Tensor) -> Tensor {
        self.forward(input, Phase::Infer)
    }

    /// Back-propagates ∂L/∂output through every layer, accumulating gradients.
    pub fn backward(&mut self, grad: Tensor) {
        let mut delta = grad;
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(delta);
        }
    }

    pub fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Layer::zero_grad);
    }

    pub fn params_mut(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        self.layers.iter_mut().flat_map(|l| l.params_mut()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().flat_map(|l| l.params()).map(Tensor::len).sum()
    }

    /// Copies of every trainable tensor, in layer order.
    pub fn export_weights(&self) -> Vec<Tensor> {
        self.layers.iter().flat_map(|l| l.params()).cloned().collect()
    }

    /// Overwrites trainable tensors with `weights` as produced by
    /// `export_weights` on a network of identical architecture.
    pub fn import_weights(&mut self, weights: Vec<Tensor>) -> Result<()> {
        let mut targets: Vec<&mut Tensor> = self.params_mut().into_iter().map(|(p, _)| p).collect();
        if targets.len() != weights.len() {
            return Err(CnnError::Shape(format!(
                "weight file holds {} tensors, network has {}",
                weights.len(),
                targets.len()
            )));
        }
        for (i, (target, source)) in targets.iter().zip(&weights).enumerate() {
            if target.shape != source.shape {
                return Err(CnnError::Shape(format!(
                    "weight tensor {} has shape {:?}, network expects {:?}",
                    i, source.shape, target.shape
                )));
            }
        }
        for (target, source) in targets.iter_mut().zip(weights) {
            **target = source;
        }
        Ok(())
    }

    /// One line per layer with its output shape.
    pub fn summary(&self) -> Vec<String> {
        let mut shape = self.input_shape.clone();
        let mut lines = vec![format!("Input {:?}", shape)];
        for layer in &self.layers {
            if let Ok(next) = layer.output_shape(&shape) {
                shape = next;
            }
            lines.push(format!("{} -> {:?}", layer.describe(), shape));
        }
        lines.push(format!("Trainable parameters: {}", self.parameter_count()));
        lines
    }

    /// Graphviz description of the layer stack.
    pub fn to_dot(&self, name: &str) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", name.replace('"', "'"));
        let _ = writeln!(dot, "    node [shape=record];");
        let _ = writeln!(dot, "    n0 [label=\"Input|{:?}\"];", self.input_shape);
        let mut shape = self.input_shape.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            if let Ok(next) = layer.output_shape(&shape) {
                shape = next;
            }
            let _ = writeln!(dot, "    n{} [label=\"{}|{:?}\"];", i + 1, layer.describe(), shape);
            let _ = writeln!(dot, "    n{} -> n{};", i, i + 1);
        }
        dot.push_str("}\n");
        dot
    }
}
