use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{CnnError, Result};
use crate::math::tensor::Tensor;

/// Border handling of a stride-1 convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    /// Zero-pad so the output has the input's spatial size.
    Same,
    /// No padding; the output shrinks by `kernel - 1`.
    Valid,
}

/// 2-D convolution (cross-correlation) over `[C, H, W]` inputs, stride 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: (usize, usize),
    pub padding: Padding,
    /// `[out, in, kh, kw]`
    pub weights: Tensor,
    /// `[out]`
    pub bias: Tensor,
    #[serde(skip)]
    grad_w: Tensor,
    #[serde(skip)]
    grad_b: Tensor,
    #[serde(skip)]
    input: Tensor,
}

impl Conv2d {
    /// Glorot-uniform kernels, zero bias.
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        padding: Padding,
        rng: &mut R,
    ) -> Conv2d {
        let (kh, kw) = kernel;
        let weights = Tensor::glorot_uniform(
            &[out_channels, in_channels, kh, kw],
            in_channels * kh * kw,
            out_channels * kh * kw,
            rng,
        );
        Conv2d::with_kernels(weights, padding)
    }

    /// Uses a fixed `[out, in, kh, kw]` kernel bank as the initial weights.
    pub fn with_kernels(weights: Tensor, padding: Padding) -> Conv2d {
        assert_eq!(weights.shape.len(), 4, "kernel bank must be [out, in, kh, kw]");
        let (out_channels, in_channels) = (weights.shape[0], weights.shape[1]);
        let kernel = (weights.shape[2], weights.shape[3]);
        Conv2d {
            in_channels,
            out_channels,
            kernel,
            padding,
            bias: Tensor::zeros(&[out_channels]),
            grad_w: Tensor::zeros(&weights.shape),
            grad_b: Tensor::zeros(&[out_channels]),
            weights,
            input: Tensor::default(),
        }
    }

    /// `(out_h, out_w, pad_top, pad_left)` for an `h × w` input.
    fn geometry(&self, h: usize, w: usize) -> (usize, usize, usize, usize) {
        let (kh, kw) = self.kernel;
        match self.padding {
            Padding::Same => (h, w, (kh - 1) / 2, (kw - 1) / 2),
            Padding::Valid => (h + 1 - kh, w + 1 - kw, 0, 0),
        }
    }

    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        if input.len() != 3 || input[0] != self.in_channels {
            return Err(CnnError::Shape(format!(
                "conv2d expects [{}, H, W], got {:?}",
                self.in_channels, input
            )));
        }
        let (kh, kw) = self.kernel;
        if self.padding == Padding::Valid && (input[1] < kh || input[2] < kw) {
            return Err(CnnError::Shape(format!(
                "conv2d kernel {}x{} does not fit input {}x{}",
                kh, kw, input[1], input[2]
            )));
        }
        let (oh, ow, _, _) = self.geometry(input[1], input[2]);
        Ok(vec![self.out_channels, oh, ow])
    }

    pub fn forward(&mut self, input: Tensor) -> Tensor {
        let (c, h, w) = (input.shape[0], input.shape[1], input.shape[2]);
        assert_eq!(c, self.in_channels, "conv2d input channel mismatch");
        let (kh, kw) = self.kernel;
        let (oh, ow, pt, pl) = self.geometry(h, w);

        let mut out = Tensor::zeros(&[self.out_channels, oh, ow]);
        for o in 0..self.out_channels {
            for y in 0..oh {
                for x in 0..ow {
                    let mut sum = self.bias.data[o];
                    for ci in 0..c {
                        for ky in 0..kh {
                            let iy = (y + ky) as isize - pt as isize;
                            if iy < 0 || iy >= h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = (x + kx) as isize - pl as isize;
                                if ix < 0 || ix >= w as isize {
                                    continue;
                                }
                                let i = (ci * h + iy as usize) * w + ix as usize;
                                let k = ((o * c + ci) * kh + ky) * kw + kx;
                                sum += input.data[i] * self.weights.data[k];
                            }
                        }
                    }
                    out.data[(o * oh + y) * ow + x] = sum;
                }
            }
        }

        self.input = input;
        out
    }

    /// Accumulates kernel/bias gradients and returns ∂L/∂input.
    pub fn backward(&mut self, grad: Tensor) -> Tensor {
        if self.grad_w.len() != self.weights.len() {
            self.zero_grad();
        }
        let (c, h, w) = (self.input.shape[0], self.input.shape[1], self.input.shape[2]);
        let (kh, kw) = self.kernel;
        let (oh, ow, pt, pl) = self.geometry(h, w);

        let mut grad_in = Tensor::zeros(&self.input.shape);
        for o in 0..self.out_channels {
            for y in 0..oh {
                for x in 0..ow {
                    let g = grad.data[(o * oh + y) * ow + x];
                    if g == 0.0 {
                        continue;
                    }
                    self.grad_b.data[o] += g;
                    for ci in 0..c {
                        for ky in 0..kh {
                            let iy = (y + ky) as isize - pt as isize;
                            if iy < 0 || iy >= h as isize {
                                continue;
                            }
                            for kx in 0..kw {
                                let ix = (x + kx) as isize - pl as isize;
                                if ix < 0 || ix >= w as isize {
                                    continue;
                                }
                                let i = (ci * h + iy as usize) * w + ix as usize;
                                let k = ((o * c + ci) * kh + ky) * kw + kx;
                                self.grad_w.data[k] += g * self.input.data[i];
                                grad_in.data[i] += g * self.weights.data[k];
                            }
                        }
                    }
                }
            }
        }
        grad_in
    }

    pub fn zero_grad(&mut self) {
        self.grad_w = Tensor::zeros(&self.weights.shape);
        self.grad_b = Tensor::zeros(&self.bias.shape);
    }

    pub fn params_mut(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![(&mut self.weights, &self.grad_w), (&mut self.bias, &self.grad_b)]
    }

    pub fn params(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.bias]
    }
}
