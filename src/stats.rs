//! Probability and likelihood-ratio helpers shared by models, scans, and the
//! active learner.

use ndarray::Array1;

/// Floor/ceiling applied to classifier probabilities before converting them
/// to ratios, so that `p / (1 - p)` stays finite.
pub const PROB_EPS: f64 = 1e-12;

/// Clamp a probability into the open interval (0, 1).
pub fn clip_prob(p: f64) -> f64 {
    p.max(PROB_EPS).min(1.0 - PROB_EPS)
}

/// Convert a class-1 probability into a likelihood-ratio estimate
/// `r = p / (1 - p)`.
pub fn estimated_likelihood_ratio(probs: &Array1<f64>) -> Array1<f64> {
    probs.mapv(|p| {
        let p = clip_prob(p);
        p / (1.0 - p)
    })
}

/// Logarithm of [`estimated_likelihood_ratio`].
pub fn estimated_log_likelihood_ratio(probs: &Array1<f64>) -> Array1<f64> {
    probs.mapv(|p| {
        let p = clip_prob(p);
        p.ln() - (1.0 - p).ln()
    })
}

/// The probability the optimal classifier assigns to class 1 given the two
/// model densities: `l1 / (l0 + l1)`.
pub fn ideal_classifier_probs(l0: &Array1<f64>, l1: &Array1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(l0.len());
    for (i, (&a, &b)) in l0.iter().zip(l1.iter()).enumerate() {
        out[i] = b / (a + b);
    }
    out
}

/// Binary cross-entropy of predicted probabilities against 0/1 labels.
pub fn log_loss(probs: &Array1<f64>, y: &Array1<f64>) -> f64 {
    let n = probs.len().max(1) as f64;
    probs
        .iter()
        .zip(y.iter())
        .map(|(&p, &yi)| {
            let p = clip_prob(p);
            -(yi * p.ln() + (1.0 - yi) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

pub fn mean_squared_error(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let n = a.len().max(1) as f64;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        / n
}

/// Numerically stable `ln(sum(exp(vals)))`.
pub fn logsumexp(vals: &[f64]) -> f64 {
    let m = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if m.is_infinite() {
        return m;
    }
    m + vals.iter().map(|&v| (v - m).exp()).sum::<f64>().ln()
}
