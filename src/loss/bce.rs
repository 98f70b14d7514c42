/// Binary cross-entropy averaged over the output units.
pub struct BceLoss;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
pub const EPS: f64 = 1e-7;

fn clip(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

impl BceLoss {
    /// Scalar BCE: -mean(y·log(p) + (1-y)·log(1-p))
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(&p, y)| {
                let p = clip(p);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>() / n
    }

    /// ∂L/∂p = (p - y) / (p·(1 - p)·n)
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(&p, y)| {
                let p = clip(p);
                (p - y) / (p * (1.0 - p) * n)
            })
            .collect()
    }
}
