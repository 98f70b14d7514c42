use crate::loss::bce::EPS;

/// Categorical cross-entropy over a probability vector.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// L = -Σ y·log(p)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        predicted.iter().zip(expected.iter())
            .map(|(&p, y)| -y * p.clamp(EPS, 1.0).ln())
            .sum()
    }

    /// ∂L/∂p = -y / p. The softmax layer applies its own Jacobian.
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected.iter())
            .map(|(&p, y)| -y / p.clamp(EPS, 1.0))
            .collect()
    }
}
