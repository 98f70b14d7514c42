use serde::{Serialize, Deserialize};

use crate::error::{CnnError, Result};
use crate::math::tensor::Tensor;

/// Non-overlapping max pooling (stride = window). Trailing rows/columns that
/// do not fill a whole window are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub pool: (usize, usize),
    #[serde(skip)]
    input_shape: Vec<usize>,
    /// Flat input index of the maximum for every output element.
    #[serde(skip)]
    switches: Vec<usize>,
}

impl MaxPool2d {
    pub fn new(pool: (usize, usize)) -> MaxPool2d {
        MaxPool2d { pool, input_shape: Vec::new(), switches: Vec::new() }
    }

    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        let (ph, pw) = self.pool;
        if input.len() != 3 {
            return Err(CnnError::Shape(format!("max pooling expects [C, H, W], got {:?}", input)));
        }
        let (oh, ow) = (input[1] / ph, input[2] / pw);
        if oh == 0 || ow == 0 {
            return Err(CnnError::Shape(format!(
                "pool {}x{} collapses input {}x{} to nothing",
                ph, pw, input[1], input[2]
            )));
        }
        Ok(vec![input[0], oh, ow])
    }

    pub fn forward(&mut self, input: Tensor) -> Tensor {
        let (c, h, w) = (input.shape[0], input.shape[1], input.shape[2]);
        let (ph, pw) = self.pool;
        let (oh, ow) = (h / ph, w / pw);

        let mut out = Tensor::zeros(&[c, oh, ow]);
        self.switches = vec![0; c * oh * ow];
        for ci in 0..c {
            for y in 0..oh {
                for x in 0..ow {
                    let mut best = f64::NEG_INFINITY;
                    let mut best_idx = 0;
                    for dy in 0..ph {
                        for dx in 0..pw {
                            let i = (ci * h + y * ph + dy) * w + x * pw + dx;
                            if input.data[i] > best {
                                best = input.data[i];
                                best_idx = i;
                            }
                        }
                    }
                    let o = (ci * oh + y) * ow + x;
                    out.data[o] = best;
                    self.switches[o] = best_idx;
                }
            }
        }

        self.input_shape = input.shape;
        out
    }

    /// Routes each output gradient to the input element that won the max.
    pub fn backward(&mut self, grad: Tensor) -> Tensor {
        let mut grad_in = Tensor::zeros(&self.input_shape);
        for (o, &i) in self.switches.iter().enumerate() {
            grad_in.data[i] += grad.data[o];
        }
        grad_in
    }
}
