use serde::{Serialize, Deserialize};

use crate::loss::{bce::BceLoss, cross_entropy::CrossEntropyLoss, mse::MseLoss};

/// Selects the training objective. Stored in model metadata under the
/// conventional names (`binary_crossentropy`, `categorical_crossentropy`, `mse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LossType {
    #[default]
    #[serde(rename = "binary_crossentropy")]
    BinaryCrossEntropy,
    #[serde(rename = "categorical_crossentropy")]
    CategoricalCrossEntropy,
    #[serde(rename = "mse")]
    MeanSquaredError,
}

impl LossType {
    pub fn loss(&self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            LossType::BinaryCrossEntropy => BceLoss::loss(predicted, expected),
            LossType::CategoricalCrossEntropy => CrossEntropyLoss::loss(predicted, expected),
            LossType::MeanSquaredError => MseLoss::loss(predicted, expected),
        }
    }

    pub fn derivative(&self, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        match self {
            LossType::BinaryCrossEntropy => BceLoss::derivative(predicted, expected),
            LossType::CategoricalCrossEntropy => CrossEntropyLoss::derivative(predicted, expected),
            LossType::MeanSquaredError => MseLoss::derivative(predicted, expected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [LossType; 3] = [
        LossType::BinaryCrossEntropy,
        LossType::CategoricalCrossEntropy,
        LossType::MeanSquaredError,
    ];

    #[test]
    fn derivatives_match_numeric() {
        let p = [0.3, 0.7];
        let y = [0.0, 1.0];
        let eps = 1e-7;
        for loss in ALL {
            let analytic = loss.derivative(&p, &y);
            for i in 0..2 {
                let mut plus = p;
                plus[i] += eps;
                let mut minus = p;
                minus[i] -= eps;
                let numeric = (loss.loss(&plus, &y) - loss.loss(&minus, &y)) / (2.0 * eps);
                assert_relative_eq!(analytic[i], numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn perfect_prediction_is_near_zero() {
        for loss in ALL {
            assert!(loss.loss(&[0.0, 1.0], &[0.0, 1.0]) < 1e-6);
        }
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&LossType::BinaryCrossEntropy).unwrap(),
            "\"binary_crossentropy\""
        );
        let parsed: LossType = serde_json::from_str("\"mse\"").unwrap();
        assert_eq!(parsed, LossType::MeanSquaredError);
    }
}
