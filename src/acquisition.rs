//! Acquisition scoring over a classifier's Monte-Carlo predictive samples.
//!
//! Each scorer maps a (mc_samples, n_examples) stack of class-1 probabilities
//! to one score per example; the learner averages those into a single utility
//! value per trialed parameter.

use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::stats::clip_prob;

/// Selection policy / acquisition scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acquisition {
    /// Uniform choice among untrialed grid points; no scoring involved.
    Random,
    /// Entropy of the mean predictive probability.
    Entropy,
    /// Variance of the probability across Monte-Carlo samples.
    Variance,
    /// Standard deviation of the probability across Monte-Carlo samples.
    Std,
    /// Mutual information between prediction and model posterior:
    /// `H(mean p) - mean H(p)`.
    Bald,
}

impl FromStr for Acquisition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(Acquisition::Random),
            "entropy" => Ok(Acquisition::Entropy),
            "variance" => Ok(Acquisition::Variance),
            "std" => Ok(Acquisition::Std),
            "bald" => Ok(Acquisition::Bald),
            other => Err(Error::UnknownAcquisition(other.to_string())),
        }
    }
}

impl Acquisition {
    /// Per-example scores for a (mc_samples, n_examples) probability stack.
    ///
    /// # Panics
    ///
    /// [`Acquisition::Random`] carries no scoring rule; the learner selects
    /// uniformly instead of calling `score`, and calling it anyway panics.
    pub fn score(&self, mc_probs: &Array2<f64>) -> Array1<f64> {
        match self {
            Acquisition::Random => {
                panic!("the random policy has no acquisition score")
            }
            Acquisition::Entropy => {
                let mean = mc_probs.mean_axis(Axis(0)).expect("non-empty sample stack");
                mean.mapv(binary_entropy)
            }
            Acquisition::Variance => column_variance(mc_probs),
            Acquisition::Std => column_variance(mc_probs).mapv(f64::sqrt),
            Acquisition::Bald => {
                let mean = mc_probs.mean_axis(Axis(0)).expect("non-empty sample stack");
                let mean_entropy = mc_probs
                    .mapv(binary_entropy)
                    .mean_axis(Axis(0))
                    .expect("non-empty sample stack");
                mean.mapv(binary_entropy) - mean_entropy
            }
        }
    }
}

fn binary_entropy(p: f64) -> f64 {
    let p = clip_prob(p);
    -(p * p.ln() + (1.0 - p) * (1.0 - p).ln())
}

fn column_variance(mc_probs: &Array2<f64>) -> Array1<f64> {
    let n = mc_probs.nrows().max(1) as f64;
    let mean = mc_probs.mean_axis(Axis(0)).expect("non-empty sample stack");
    let mut var = Array1::zeros(mc_probs.ncols());
    for row in mc_probs.rows() {
        for (c, &v) in row.iter().enumerate() {
            let d = v - mean[c];
            var[c] += d * d;
        }
    }
    var / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn parse_known_names() {
        assert_eq!("entropy".parse::<Acquisition>().unwrap(), Acquisition::Entropy);
        assert_eq!("Random".parse::<Acquisition>().unwrap(), Acquisition::Random);
        assert_eq!("BALD".parse::<Acquisition>().unwrap(), Acquisition::Bald);
    }

    #[test]
    fn unknown_name_is_config_error() {
        let err = "certainty".parse::<Acquisition>().unwrap_err();
        assert!(matches!(err, Error::UnknownAcquisition(_)));
    }

    #[test]
    fn entropy_peaks_at_half() {
        let certain = array![[0.99], [0.99]];
        let unsure = array![[0.5], [0.5]];
        let s_certain = Acquisition::Entropy.score(&certain);
        let s_unsure = Acquisition::Entropy.score(&unsure);
        assert!(s_unsure[0] > s_certain[0]);
    }

    #[test]
    fn variance_zero_for_constant_samples() {
        let stack = array![[0.3, 0.7], [0.3, 0.7], [0.3, 0.7]];
        let v = Acquisition::Variance.score(&stack);
        assert!(v.iter().all(|&x| x.abs() < 1e-12));
        let s = Acquisition::Std.score(&stack);
        assert!(s.iter().all(|&x| x.abs() < 1e-12));
    }

    #[test]
    #[should_panic(expected = "no acquisition score")]
    fn random_policy_refuses_to_score() {
        Acquisition::Random.score(&array![[0.5]]);
    }

    #[test]
    fn bald_positive_under_disagreement() {
        let stack = array![[0.05, 0.5], [0.95, 0.5]];
        let b = Acquisition::Bald.score(&stack);
        assert!(b[0] > 0.1, "disagreeing members should carry information");
        assert!(b[1].abs() < 1e-9, "agreeing members carry none");
    }
}
