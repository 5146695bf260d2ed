use ndarray::{Array1, Array2};
use rand::rngs::StdRng;

/// Training diagnostics returned by every refit and recorded in the active
/// learner's train history.
#[derive(Debug, Clone, Copy)]
pub struct FitSummary {
    /// Binary cross-entropy on the training set after fitting.
    pub train_loss: f64,
    pub n_examples: usize,
}

/// The probabilistic-classifier contract the ratio models are built on.
///
/// `y` uses 0/1 labels (0 = reference-model draw, 1 = alternate-model draw);
/// `predict_proba` returns the class-1 probability per example.
pub trait Classifier {
    /// Full (re)train on the given examples.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> FitSummary;

    /// Class-1 probability, one entry per row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64>;

    /// Human readable name for the model.
    fn name(&self) -> &str {
        "classifier"
    }

    /// Capability probe: a classifier that can draw posterior predictive
    /// samples returns itself here. Plain classifiers return `None` and the
    /// acquisition-guided policy rejects them up front.
    fn as_bayesian(&self) -> Option<&dyn BayesianClassifier> {
        None
    }
}

/// Extension for classifiers with a posterior over predictions.
pub trait BayesianClassifier: Classifier {
    /// Draw `mc_samples` stochastic predictive-probability vectors; the
    /// result has shape (mc_samples, n_examples).
    fn sample_predictive(&self, x: &Array2<f64>, mc_samples: usize, rng: &mut StdRng)
        -> Array2<f64>;
}
