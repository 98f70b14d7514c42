use serde::{Serialize, Deserialize};

/// Binary confusion counts. Serialized as `[tn, fp, fn, tp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u64; 4]", into = "[u64; 4]")]
pub struct ConfusionMatrix {
    pub tn: u64,
    pub fp: u64,
    pub fn_: u64,
    pub tp: u64,
}

impl From<[u64; 4]> for ConfusionMatrix {
    fn from([tn, fp, fn_, tp]: [u64; 4]) -> Self {
        ConfusionMatrix { tn, fp, fn_, tp }
    }
}

impl From<ConfusionMatrix> for [u64; 4] {
    fn from(m: ConfusionMatrix) -> Self {
        [m.tn, m.fp, m.fn_, m.tp]
    }
}

impl ConfusionMatrix {
    /// Counts outcomes treating class `positive` as the positive class and
    /// every other class as negative.
    pub fn from_predictions(truth: &[usize], predicted: &[usize], positive: usize) -> ConfusionMatrix {
        let mut m = ConfusionMatrix::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == positive, p == positive) {
                (false, false) => m.tn += 1,
                (false, true) => m.fp += 1,
                (true, false) => m.fn_ += 1,
                (true, true) => m.tp += 1,
            }
        }
        m
    }

    pub fn total(&self) -> u64 {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => (self.tp + self.tn) as f64 / n as f64,
        }
    }

    /// `tp / (tp + fp)`; 1.0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        match self.tp + self.fp {
            0 => 1.0,
            d => self.tp as f64 / d as f64,
        }
    }

    /// `tp / (tp + fn)`; 1.0 when there were no positives.
    pub fn recall(&self) -> f64 {
        match self.tp + self.fn_ {
            0 => 1.0,
            d => self.tp as f64 / d as f64,
        }
    }

    /// Harmonic mean of precision and recall, `2tp / (2tp + fp + fn)`.
    ///
    /// 1.0 when there are no false positives or negatives, 0.0 when there
    /// are errors but no true positives.
    pub fn score(&self) -> f64 {
        let errors = self.fp + self.fn_;
        if errors == 0 {
            return 1.0;
        }
        let tp2 = 2 * self.tp;
        tp2 as f64 / (tp2 + errors) as f64
    }
}
