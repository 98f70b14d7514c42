use serde::{Serialize, Deserialize};
use std::f64::consts::{FRAC_PI_2, PI};

use crate::math::tensor::Tensor;

/// Parameters of an oriented Gabor filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaborParams {
    /// Standard deviation of the Gaussian envelope.
    pub sigma: f64,
    /// Orientation of the normal to the stripes, in radians.
    pub theta: f64,
    /// Wavelength of the sinusoidal factor.
    pub lambda: f64,
    /// Spatial aspect ratio.
    pub gamma: f64,
    /// Phase offset.
    pub psi: f64,
}

impl Default for GaborParams {
    fn default() -> Self {
        GaborParams {
            sigma: 1.0,
            theta: 1.0,
            lambda: 0.5,
            gamma: 0.3,
            psi: FRAC_PI_2,
        }
    }
}

/// Builds a single `kh × kw` Gabor kernel, row-major.
///
/// The kernel is sampled on the integer grid `[-kw/2, kw/2] × [-kh/2, kh/2]`
/// (the OpenCV `getGaborKernel` convention, flipped so index 0 is the
/// largest coordinate). Even sizes produce one extra row/column on that
/// grid, which is cropped.
pub fn gabor_kernel(kh: usize, kw: usize, params: GaborParams) -> Vec<f64> {
    let xmax = (kw / 2) as i64;
    let ymax = (kh / 2) as i64;
    let sigma_x = params.sigma;
    let sigma_y = params.sigma / params.gamma;
    let ex = -0.5 / (sigma_x * sigma_x);
    let ey = -0.5 / (sigma_y * sigma_y);
    let cscale = 2.0 * PI / params.lambda;
    let (s, c) = params.theta.sin_cos();

    let mut kernel = vec![0.0; kh * kw];
    for row in 0..kh {
        for col in 0..kw {
            let y = (ymax - row as i64) as f64;
            let x = (xmax - col as i64) as f64;
            let xr = x * c + y * s;
            let yr = -x * s + y * c;
            kernel[row * kw + col] =
                (ex * xr * xr + ey * yr * yr).exp() * (cscale * xr + params.psi).cos();
        }
    }
    kernel
}

/// A `[out, in, kh, kw]` kernel bank with the same Gabor filter in every slot.
pub fn gabor_bank(
    out_channels: usize,
    in_channels: usize,
    kh: usize,
    kw: usize,
    params: GaborParams,
) -> Tensor {
    let kernel = gabor_kernel(kh, kw, params);
    let data = std::iter::repeat(kernel)
        .take(out_channels * in_channels)
        .flatten()
        .collect();
    Tensor::from_vec(&[out_channels, in_channels, kh, kw], data)
}
