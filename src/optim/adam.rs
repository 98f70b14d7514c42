use crate::math::tensor::Tensor;

/// Adam with bias-corrected step size.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    iterations: u64,
    first_moments: Vec<Vec<f64>>,
    second_moments: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Adam {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            iterations: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    pub fn step(&mut self, params: Vec<(&mut Tensor, &Tensor)>, grad_scale: f64) {
        if self.first_moments.len() != params.len() {
            self.first_moments = params.iter().map(|(p, _)| vec![0.0; p.len()]).collect();
            self.second_moments = self.first_moments.clone();
        }
        self.iterations += 1;
        let t = self.iterations as i32;
        let lr_t = self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));

        let moments = self.first_moments.iter_mut().zip(self.second_moments.iter_mut());
        for ((param, grad), (m, v)) in params.into_iter().zip(moments) {
            for (i, p) in param.data.iter_mut().enumerate() {
                let g = grad.data[i] * grad_scale;
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                *p -= lr_t * m[i] / (v[i].sqrt() + self.epsilon);
            }
        }
    }
}
