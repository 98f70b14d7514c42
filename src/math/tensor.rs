use rand::Rng;
use serde::{Serialize, Deserialize};
use std::ops::{Add, Sub};

/// Dense row-major tensor.
///
/// Images are stored channel-first (`[C, H, W]`), activations between dense
/// layers as `[N]`, convolution kernels as `[O, I, KH, KW]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Wraps `data` with the given shape.
    ///
    /// # Panics
    /// Panics if `data.len()` is not the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Tensor {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "Tensor data length does not match shape {:?}",
            shape
        );
        Tensor { shape: shape.to_vec(), data }
    }

    /// Glorot (Xavier) uniform initialization: U(-l, l) with
    /// l = sqrt(6 / (fan_in + fan_out)).
    pub fn glorot_uniform<R: Rng + ?Sized>(
        shape: &[usize],
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Tensor {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let mut res = Tensor::zeros(shape);
        for x in res.data.iter_mut() {
            *x = rng.gen_range(-limit..=limit);
        }
        res
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Same data, new shape. Panics if the element counts differ.
    pub fn reshape(self, shape: &[usize]) -> Tensor {
        Tensor::from_vec(shape, self.data)
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|x| x * factor)
    }

    pub fn dot(&self, rhs: &Tensor) -> f64 {
        assert_eq!(self.len(), rhs.len(), "Tensors are of incorrect sizes");
        self.data.iter().zip(rhs.data.iter()).map(|(a, b)| a * b).sum()
    }

    /// Index of the largest element; 0 for an empty tensor.
    pub fn argmax(&self) -> usize {
        argmax(&self.data)
    }

    /// Zeroes every element in place, keeping the shape.
    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = 0.0);
    }
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

impl Add for Tensor {
    type Output = Tensor;

    fn add(self, rhs: Self) -> Self::Output {
        if self.shape != rhs.shape {
            panic!("Tensors are of incorrect sizes")
        }
        let data = self.data.iter().zip(rhs.data.iter()).map(|(a, b)| a + b).collect();
        Tensor { shape: self.shape, data }
    }
}

impl Sub for Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.shape != rhs.shape {
            panic!("Tensors are of incorrect sizes")
        }
        let data = self.data.iter().zip(rhs.data.iter()).map(|(a, b)| a - b).collect();
        Tensor { shape: self.shape, data }
    }
}
