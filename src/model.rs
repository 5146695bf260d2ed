//! Ratio models: classifier wrappers that turn class-1 probabilities into
//! likelihood-ratio estimates.
//!
//! A model owns its classifier and the fixed reference parameter `theta_0`.
//! It is stateless with respect to the dataset: every `fit` is a full
//! retrain, and `predict` has no hidden mutable state.

use anyhow::Context;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;

use crate::dataset::{parameterized_input, RatioDataset, UnparameterizedRatioDataset};
use crate::dataset::DatasetOptions;
use crate::error::{Error, Result};
use crate::grid::ParamIterator;
use crate::models::calibration::{self, SigmoidCalibrator};
use crate::models::classifier_trait::{Classifier, FitSummary};
use crate::preprocessing::{fit_scaler, transform_all, Scaler};
use crate::simulate::SimulatorFactory;
use crate::stats::{estimated_likelihood_ratio, estimated_log_likelihood_ratio};

/// Broadcast one parameter vector across `n` rows.
pub fn stack_repeat(theta: &Array1<f64>, n: usize) -> Array2<f64> {
    let mut out = Array2::zeros((n, theta.len()));
    for mut row in out.rows_mut() {
        row.assign(theta);
    }
    out
}

/// Ratio model parameterized by the alternate theta: the classifier input is
/// `[x | theta_1]` so one model covers the whole parameter space.
pub struct SinglyParameterizedRatioModel {
    theta_0: Array1<f64>,
    clf: Box<dyn Classifier>,
    scaler: Option<Scaler>,
    normalize_input: bool,
}

impl SinglyParameterizedRatioModel {
    pub fn new(theta_0: Array1<f64>, clf: Box<dyn Classifier>) -> Self {
        Self::with_normalization(theta_0, clf, true)
    }

    pub fn with_normalization(
        theta_0: Array1<f64>,
        clf: Box<dyn Classifier>,
        normalize_input: bool,
    ) -> Self {
        SinglyParameterizedRatioModel {
            theta_0,
            clf,
            scaler: None,
            normalize_input,
        }
    }

    pub fn theta_0(&self) -> &Array1<f64> {
        &self.theta_0
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.clf.as_ref()
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    /// Apply the fitted input transform, if any, to a raw joint input. The
    /// acquisition path uses this before drawing predictive samples.
    pub fn transform_input(&self, input: &Array2<f64>) -> Array2<f64> {
        match &self.scaler {
            Some(sc) => transform_all(input, sc),
            None => input.clone(),
        }
    }

    /// Full retrain on the dataset: refits the scaler and the classifier.
    pub fn fit(&mut self, dataset: &RatioDataset) -> FitSummary {
        let raw = dataset.build_input();
        let input = if self.normalize_input {
            let sc = fit_scaler(&raw);
            let transformed = transform_all(&raw, &sc);
            self.scaler = Some(sc);
            transformed
        } else {
            raw
        };
        self.clf.fit(&input, &dataset.y)
    }

    /// Likelihood ratio (or its log) of each row of `x` at the paired
    /// alternate parameter.
    pub fn predict(&self, x: &Array2<f64>, theta_1s: &Array2<f64>, log: bool) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x, theta_1s)?;
        Ok(if log {
            estimated_log_likelihood_ratio(&probs)
        } else {
            estimated_likelihood_ratio(&probs)
        })
    }

    /// Class-1 probability of each row of `x` at the paired alternate
    /// parameter.
    pub fn predict_proba(&self, x: &Array2<f64>, theta_1s: &Array2<f64>) -> Result<Array1<f64>> {
        if x.nrows() != theta_1s.nrows() {
            return Err(Error::LengthMismatch {
                expected: x.nrows(),
                got: theta_1s.nrows(),
            });
        }
        let input = self.transform_input(&parameterized_input(x, theta_1s));
        Ok(self.clf.predict_proba(&input))
    }

    /// Class-1 probabilities for every example in a dataset.
    pub fn predict_proba_dataset(&self, dataset: &RatioDataset) -> Array1<f64> {
        let input = self.transform_input(&dataset.build_input());
        self.clf.predict_proba(&input)
    }

    /// Predict through a freshly fitted calibration layer.
    ///
    /// A calibration dataset is simulated at `theta` with the same contract
    /// as the training data; the underlying classifier stays frozen
    /// ("prefit") and only the calibrator is fitted on the held-out draws.
    /// Returns the calibrated prediction together with the fitted
    /// calibrator.
    pub fn calibrated_predict(
        &self,
        x: &Array2<f64>,
        theta: &Array1<f64>,
        n_samples_per_theta: usize,
        factory: &dyn SimulatorFactory,
        log: bool,
        rng: &mut StdRng,
    ) -> anyhow::Result<(Array1<f64>, SigmoidCalibrator)> {
        let opts = DatasetOptions {
            include_nllr: false,
            include_log_probs: false,
            shuffle: true,
        };
        let calibration_ds = RatioDataset::from_simulator(
            factory,
            &self.theta_0,
            &ParamIterator::single(theta.clone()),
            n_samples_per_theta,
            opts,
            rng,
        )
        .context("simulating the calibration dataset")?;

        let cal_input = self.transform_input(&calibration_ds.build_input());
        let calibrator = calibration::fit_on(self.clf.as_ref(), &cal_input, &calibration_ds.y);

        let theta_1s = stack_repeat(theta, x.nrows());
        let raw_probs = self.predict_proba(x, &theta_1s)?;
        let probs = calibrator.calibrate(&raw_probs);

        let pred = if log {
            estimated_log_likelihood_ratio(&probs)
        } else {
            estimated_likelihood_ratio(&probs)
        };
        Ok((pred, calibrator))
    }
}

/// Ratio model for one fixed `(theta_0, theta_1)` pair; the classifier sees
/// only the features.
pub struct UnparameterizedRatioModel {
    theta_0: Array1<f64>,
    theta_1: Array1<f64>,
    clf: Box<dyn Classifier>,
    scaler: Option<Scaler>,
    normalize_input: bool,
}

impl UnparameterizedRatioModel {
    pub fn new(theta_0: Array1<f64>, theta_1: Array1<f64>, clf: Box<dyn Classifier>) -> Self {
        UnparameterizedRatioModel {
            theta_0,
            theta_1,
            clf,
            scaler: None,
            normalize_input: true,
        }
    }

    pub fn theta_0(&self) -> &Array1<f64> {
        &self.theta_0
    }

    pub fn theta_1(&self) -> &Array1<f64> {
        &self.theta_1
    }

    pub fn fit(&mut self, dataset: &UnparameterizedRatioDataset) -> FitSummary {
        let raw = dataset.build_input();
        let input = if self.normalize_input {
            let sc = fit_scaler(&raw);
            let transformed = transform_all(&raw, &sc);
            self.scaler = Some(sc);
            transformed
        } else {
            raw
        };
        self.clf.fit(&input, &dataset.y)
    }

    pub fn predict(&self, x: &Array2<f64>, log: bool) -> Array1<f64> {
        let probs = self.predict_proba(x);
        if log {
            estimated_log_likelihood_ratio(&probs)
        } else {
            estimated_likelihood_ratio(&probs)
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        let input = match &self.scaler {
            Some(sc) => transform_all(x, sc),
            None => x.clone(),
        };
        self.clf.predict_proba(&input)
    }
}
