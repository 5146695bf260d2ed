use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{BayesianClassifier, Classifier, FitSummary};
use crate::models::gbdt::GbdtClassifier;
use crate::stats::log_loss;

/// Bootstrap ensemble of GBDT members.
///
/// Each member trains on a bootstrap resample of the data, so the spread of
/// member predictions approximates a predictive posterior; this is the
/// crate's Bayesian classifier for the acquisition-guided policy.
pub struct EnsembleClassifier {
    members: Vec<GbdtClassifier>,
    params: ModelConfig,
}

impl EnsembleClassifier {
    pub fn new(params: ModelConfig) -> Self {
        EnsembleClassifier {
            members: Vec::new(),
            params,
        }
    }

    fn member_config(&self) -> (usize, u64, ModelConfig) {
        let ModelType::Ensemble {
            n_members,
            max_depth,
            num_boost_round,
            seed,
        } = &self.params.model_type
        else {
            panic!(
                "expected ModelType::Ensemble params, got {:?}",
                self.params.model_type
            );
        };
        let base = ModelConfig {
            learning_rate: self.params.learning_rate,
            model_type: ModelType::Gbdt {
                max_depth: *max_depth,
                num_boost_round: *num_boost_round,
                training_optimization_level: 2,
            },
        };
        (*n_members, *seed, base)
    }

    fn member_predictions(&self, x: &Array2<f64>) -> Array2<f64> {
        assert!(
            !self.members.is_empty(),
            "predict_proba called before fit"
        );
        let mut preds = Array2::zeros((self.members.len(), x.nrows()));
        for (i, member) in self.members.iter().enumerate() {
            preds.row_mut(i).assign(&member.predict_proba(x));
        }
        preds
    }
}

impl Classifier for EnsembleClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> FitSummary {
        let (n_members, seed, base) = self.member_config();
        let n = x.nrows();
        self.members.clear();

        for m in 0..n_members {
            // per-member stream keeps resamples independent of member count
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(m as u64));
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let x_boot = x.select(Axis(0), &indices);
            let y_boot = y.select(Axis(0), &indices);

            let mut member = GbdtClassifier::new(base.clone());
            member.fit(&x_boot, &y_boot);
            self.members.push(member);
        }

        FitSummary {
            train_loss: log_loss(&self.predict_proba(x), y),
            n_examples: n,
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        self.member_predictions(x)
            .mean_axis(Axis(0))
            .expect("ensemble has at least one member")
    }

    fn name(&self) -> &str {
        "gbdt-ensemble"
    }

    fn as_bayesian(&self) -> Option<&dyn BayesianClassifier> {
        Some(self)
    }
}

impl BayesianClassifier for EnsembleClassifier {
    fn sample_predictive(
        &self,
        x: &Array2<f64>,
        mc_samples: usize,
        rng: &mut StdRng,
    ) -> Array2<f64> {
        let member_preds = self.member_predictions(x);
        let mut out = Array2::zeros((mc_samples, x.nrows()));
        for s in 0..mc_samples {
            let pick = rng.gen_range(0..member_preds.nrows());
            out.row_mut(s).assign(&member_preds.row(pick));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensemble_config(n_members: usize) -> ModelConfig {
        ModelConfig {
            learning_rate: 0.1,
            model_type: ModelType::Ensemble {
                n_members,
                max_depth: 3,
                num_boost_round: 20,
                seed: 42,
            },
        }
    }

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = (i as f64) * 0.01;
            rows.push(-1.5 - jitter);
            labels.push(0.0);
            rows.push(1.5 + jitter);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((60, 1), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn exposes_bayesian_capability() {
        let clf = EnsembleClassifier::new(ensemble_config(3));
        assert!(clf.as_bayesian().is_some());
    }

    #[test]
    fn predictive_samples_have_requested_shape() {
        let (x, y) = toy_data();
        let mut clf = EnsembleClassifier::new(ensemble_config(5));
        clf.fit(&x, &y);
        let mut rng = StdRng::seed_from_u64(1);
        let samples = clf.as_bayesian().unwrap().sample_predictive(&x, 17, &mut rng);
        assert_eq!(samples.dim(), (17, 60));
        assert!(samples.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn mean_prediction_separates_classes() {
        let (x, y) = toy_data();
        let mut clf = EnsembleClassifier::new(ensemble_config(5));
        let summary = clf.fit(&x, &y);
        assert_eq!(summary.n_examples, 60);
        let probs = clf.predict_proba(&x);
        for (p, &label) in probs.iter().zip(y.iter()) {
            assert_eq!(*p > 0.5, label > 0.5, "p = {} for label {}", p, label);
        }
    }

    #[test]
    fn refit_replaces_members() {
        let (x, y) = toy_data();
        let mut clf = EnsembleClassifier::new(ensemble_config(4));
        clf.fit(&x, &y);
        clf.fit(&x, &y);
        assert_eq!(clf.members.len(), 4);
    }
}
