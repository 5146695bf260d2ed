//! Post-hoc probability calibration for an already-fitted classifier.
//!
//! Platt scaling on the classifier's logits: the calibrator is fitted on a
//! held-out dataset (freshly simulated by the caller) while the underlying
//! classifier stays frozen, the "prefit" arrangement.

use ndarray::{Array1, Array2};

use crate::models::classifier_trait::Classifier;
use crate::stats::clip_prob;

/// Sigmoid recalibration `p' = sigmoid(a * logit(p) + b)`.
#[derive(Debug, Clone)]
pub struct SigmoidCalibrator {
    a: f64,
    b: f64,
}

impl Default for SigmoidCalibrator {
    fn default() -> Self {
        SigmoidCalibrator { a: 1.0, b: 0.0 }
    }
}

impl SigmoidCalibrator {
    /// Fit the slope and intercept by gradient descent on the log-loss of
    /// the calibration labels.
    pub fn fit(probs: &Array1<f64>, y: &Array1<f64>) -> Self {
        let logits: Vec<f64> = probs.iter().map(|&p| logit(p)).collect();
        let n = logits.len().max(1) as f64;
        let mut a = 1.0f64;
        let mut b = 0.0f64;
        let lr = 0.1;

        for _ in 0..1000 {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            for (&logit_i, &yi) in logits.iter().zip(y.iter()) {
                let p = sigmoid(a * logit_i + b);
                let diff = p - yi;
                grad_a += diff * logit_i;
                grad_b += diff;
            }
            a -= lr * grad_a / n;
            b -= lr * grad_b / n;
        }

        SigmoidCalibrator { a, b }
    }

    /// Map raw classifier probabilities to calibrated ones.
    pub fn calibrate(&self, probs: &Array1<f64>) -> Array1<f64> {
        probs.mapv(|p| sigmoid(self.a * logit(p) + self.b))
    }

    pub fn params(&self) -> (f64, f64) {
        (self.a, self.b)
    }
}

/// Fit a calibrator for `clf` on held-out inputs and labels, leaving the
/// classifier untouched.
pub fn fit_on(
    clf: &dyn Classifier,
    x_calibration: &Array2<f64>,
    y_calibration: &Array1<f64>,
) -> SigmoidCalibrator {
    let probs = clf.predict_proba(x_calibration);
    SigmoidCalibrator::fit(&probs, y_calibration)
}

fn logit(p: f64) -> f64 {
    let p = clip_prob(p);
    (p / (1.0 - p)).ln()
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn identity_when_already_calibrated() {
        // labels drawn to match the stated probabilities closely
        let probs = Array1::from_vec(vec![0.1, 0.1, 0.9, 0.9, 0.5, 0.5]);
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let cal = SigmoidCalibrator::fit(&probs, &y);
        let out = cal.calibrate(&probs);
        for (p, q) in probs.iter().zip(out.iter()) {
            assert!((p - q).abs() < 0.15, "{} -> {}", p, q);
        }
    }

    #[test]
    fn corrects_overconfident_scores() {
        // classifier says 0.99/0.01 but labels are only ~0.75 consistent
        let probs = Array1::from_vec(vec![
            0.99, 0.99, 0.99, 0.99, 0.01, 0.01, 0.01, 0.01,
        ]);
        let y = Array1::from_vec(vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let cal = SigmoidCalibrator::fit(&probs, &y);
        let out = cal.calibrate(&probs);
        assert!(out[0] < 0.99, "high side should be pulled down: {}", out[0]);
        assert!(out[4] > 0.01, "low side should be pulled up: {}", out[4]);
    }

    #[test]
    fn monotone_in_input_probability() {
        let probs = Array1::from_vec(vec![0.2, 0.2, 0.8, 0.8]);
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        let cal = SigmoidCalibrator::fit(&probs, &y);
        let out = cal.calibrate(&Array1::from_vec(vec![0.1, 0.5, 0.9]));
        assert!(out[0] < out[1] && out[1] < out[2]);
    }
}
