use crate::math::tensor::Tensor;

/// Stochastic gradient descent with momentum, optional Nesterov lookahead
/// and inverse-time learning-rate decay.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub decay: f64,
    pub nesterov: bool,
    iterations: u64,
    velocities: Vec<Vec<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64, decay: f64, nesterov: bool) -> Sgd {
        Sgd { learning_rate, momentum, decay, nesterov, iterations: 0, velocities: Vec::new() }
    }

    /// Learning rate for the next update: `lr / (1 + decay · iterations)`.
    pub fn current_learning_rate(&self) -> f64 {
        self.learning_rate / (1.0 + self.decay * self.iterations as f64)
    }

    /// Applies one update. `grad_scale` turns summed batch gradients into means.
    pub fn step(&mut self, params: Vec<(&mut Tensor, &Tensor)>, grad_scale: f64) {
        if self.velocities.len() != params.len() {
            self.velocities = params.iter().map(|(p, _)| vec![0.0; p.len()]).collect();
        }
        let lr = self.current_learning_rate();
        for ((param, grad), velocity) in params.into_iter().zip(self.velocities.iter_mut()) {
            for ((p, g), v) in param.data.iter_mut().zip(&grad.data).zip(velocity.iter_mut()) {
                let g = g * grad_scale;
                *v = self.momentum * *v - lr * g;
                if self.nesterov {
                    *p += self.momentum * *v - lr * g;
                } else {
                    *p += *v;
                }
            }
        }
        self.iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plain_sgd_steps_against_gradient() {
        let mut sgd = Sgd::new(0.1, 0.0, 0.0, false);
        let mut p = Tensor::from_vec(&[2], vec![1.0, -1.0]);
        let g = Tensor::from_vec(&[2], vec![2.0, -4.0]);
        sgd.step(vec![(&mut p, &g)], 0.5);
        assert_relative_eq!(p.data[0], 0.9);
        assert_relative_eq!(p.data[1], -0.8);
    }

    #[test]
    fn momentum_accumulates() {
        let mut sgd = Sgd::new(1.0, 0.5, 0.0, false);
        let mut p = Tensor::from_vec(&[1], vec![0.0]);
        let g = Tensor::from_vec(&[1], vec![1.0]);
        sgd.step(vec![(&mut p, &g)], 1.0);
        sgd.step(vec![(&mut p, &g)], 1.0);
        // v1 = -1, v2 = -1.5
        assert_relative_eq!(p.data[0], -2.5);
    }

    #[test]
    fn decay_shrinks_learning_rate() {
        let mut sgd = Sgd::new(0.1, 0.9, 1.0, true);
        let mut p = Tensor::from_vec(&[1], vec![0.0]);
        let g = Tensor::from_vec(&[1], vec![0.0]);
        sgd.step(vec![(&mut p, &g)], 1.0);
        assert_relative_eq!(sgd.current_learning_rate(), 0.05);
    }
}
