//! The active-learning loop: decide where on the parameter grid to simulate
//! next, grow the dataset there, and refit the ratio model.
//!
//! Selection is either uniform over untrialed grid points or
//! acquisition-guided: utilities scored on the accumulated data feed a fresh
//! Gaussian-process surrogate whose upper confidence bound is maximized over
//! the untrialed points.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::acquisition::Acquisition;
use crate::config::LearnerConfig;
use crate::dataset::{parameterized_input, DatasetOptions, RatioDataset};
use crate::error::Error;
use crate::gp::{GaussianProcess, GpConfig};
use crate::grid::{ParamGrid, ParamIterator};
use crate::model::{stack_repeat, SinglyParameterizedRatioModel};
use crate::simulate::SimulatorFactory;
use crate::stats::{ideal_classifier_probs, mean_squared_error};

/// One refit of the ratio model after acquiring a new parameter point.
#[derive(Debug, Clone, Serialize)]
pub struct TrainRecord {
    pub step: usize,
    pub theta: Vec<f64>,
    pub n_examples: usize,
    pub train_loss: f64,
}

/// Held-out probability error against the exact classifier, when a test
/// dataset with densities was supplied.
#[derive(Debug, Clone, Serialize)]
pub struct TestRecord {
    pub step: usize,
    pub mse: f64,
}

/// Acquisition utilities evaluated at a set of parameter points.
#[derive(Debug, Clone, Serialize)]
pub struct UtilitySeries {
    pub thetas: Vec<Vec<f64>>,
    pub values: Vec<f64>,
}

/// Everything the selection policy saw at one step: the per-theta training
/// utilities the surrogate was fitted on, the surrogate's posterior mean over
/// the whole grid, and (in validation mode) the same utilities recomputed on
/// the full-grid dataset.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionRecord {
    pub step: usize,
    pub training: UtilitySeries,
    pub predicted: UtilitySeries,
    pub validation: Option<UtilitySeries>,
}

/// Sequentially grows a [`RatioDataset`] by simulating at the grid point the
/// acquisition policy considers most informative, refitting the ratio model
/// after every addition.
pub struct ActiveLearner {
    config: LearnerConfig,
    theta_0: Array1<f64>,
    factory: Box<dyn SimulatorFactory>,
    param_grid: ParamGrid,
    trialed_mask: Array1<bool>,
    dataset: RatioDataset,
    ratio_model: SinglyParameterizedRatioModel,
    test_dataset: Option<RatioDataset>,
    full_dataset: Option<RatioDataset>,
    train_history: Vec<TrainRecord>,
    test_history: Vec<TestRecord>,
    acquisition_history: Vec<AcquisitionRecord>,
    rng: StdRng,
    step_count: usize,
}

impl ActiveLearner {
    /// Simulates the initial dataset at `theta_1_iterator`, fits the model
    /// once, and marks those points as trialed on the grid.
    ///
    /// `test_dataset`, if given, must carry log densities so the classifier
    /// can be scored against the exact one.
    pub fn new(
        factory: Box<dyn SimulatorFactory>,
        theta_0: Array1<f64>,
        theta_1_iterator: &ParamIterator,
        param_grid: ParamGrid,
        mut ratio_model: SinglyParameterizedRatioModel,
        config: LearnerConfig,
        test_dataset: Option<RatioDataset>,
    ) -> Result<Self> {
        if let Some(test) = &test_dataset {
            if test.log_prob_0.is_none() || test.log_prob_1.is_none() {
                return Err(Error::MissingLogProbs.into());
            }
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let dataset = RatioDataset::from_simulator(
            factory.as_ref(),
            &theta_0,
            theta_1_iterator,
            config.n_samples_per_theta,
            DatasetOptions::default(),
            &mut rng,
        )
        .context("failed to simulate the initial dataset")?;

        let trialed_mask = param_grid.trialed_mask(theta_1_iterator);

        let full_dataset = if config.validation_mode {
            Some(
                RatioDataset::from_simulator(
                    factory.as_ref(),
                    &theta_0,
                    param_grid.points(),
                    config.n_samples_per_theta,
                    DatasetOptions::default(),
                    &mut rng,
                )
                .context("failed to simulate the full-grid validation dataset")?,
            )
        } else {
            None
        };

        let summary = ratio_model.fit(&dataset);
        info!(
            "initial fit on {} examples, train loss {:.4}",
            summary.n_examples, summary.train_loss
        );

        Ok(ActiveLearner {
            config,
            theta_0,
            factory,
            param_grid,
            trialed_mask,
            dataset,
            ratio_model,
            test_dataset,
            full_dataset,
            train_history: Vec::new(),
            test_history: Vec::new(),
            acquisition_history: Vec::new(),
            rng,
            step_count: 0,
        })
    }

    /// Runs `n_iter` acquisition steps.
    pub fn fit(&mut self, n_iter: usize) -> Result<()> {
        for i in 0..n_iter {
            info!("active learning iteration {}/{}", i + 1, n_iter);
            self.step()?;
        }
        Ok(())
    }

    /// Picks the next grid point, simulates a fresh batch there, refits, and
    /// returns the chosen flat grid index.
    pub fn step(&mut self) -> Result<usize> {
        if self.remaining_count() == 0 {
            bail!("every grid point has already been trialed");
        }

        let idx = match self.config.acquisition {
            Acquisition::Random => self.choose_random(),
            _ => self.choose_by_acquisition()?,
        };
        // The policy must never hand back a point that already holds data.
        assert!(
            !self.trialed_mask[idx],
            "selection returned already-trialed grid index {}",
            idx
        );
        let next_theta = self.param_grid.get(idx).clone();
        info!("acquiring {} examples at theta = {}", self.config.n_samples_per_theta, next_theta);

        let fragment = RatioDataset::from_simulator(
            self.factory.as_ref(),
            &self.theta_0,
            &ParamIterator::single(next_theta.clone()),
            self.config.n_samples_per_theta,
            DatasetOptions::default(),
            &mut self.rng,
        )
        .with_context(|| format!("failed to simulate at theta = {}", next_theta))?;
        self.dataset.append(&fragment)?;
        self.dataset.shuffle(&mut self.rng);

        let summary = self.ratio_model.fit(&self.dataset);
        self.step_count += 1;
        self.train_history.push(TrainRecord {
            step: self.step_count,
            theta: next_theta.to_vec(),
            n_examples: summary.n_examples,
            train_loss: summary.train_loss,
        });
        debug!(
            "refit on {} examples, train loss {:.4}",
            summary.n_examples, summary.train_loss
        );

        if let Some(test) = &self.test_dataset {
            let mse = held_out_mse(&self.ratio_model, test);
            debug!("held-out probability mse {:.6}", mse);
            self.test_history.push(TestRecord {
                step: self.step_count,
                mse,
            });
        }

        self.trialed_mask[idx] = true;
        Ok(idx)
    }

    fn choose_random(&mut self) -> usize {
        let untrialed: Vec<usize> = self
            .trialed_mask
            .iter()
            .enumerate()
            .filter(|(_, &t)| !t)
            .map(|(i, _)| i)
            .collect();
        untrialed[self.rng.gen_range(0..untrialed.len())]
    }

    /// Scores the trialed points on the accumulated data, fits a surrogate to
    /// those utilities, and takes the UCB argmax over the untrialed grid.
    fn choose_by_acquisition(&mut self) -> Result<usize> {
        let (train_thetas, train_utilities) = marginalised_acquisition(
            &self.ratio_model,
            self.config.acquisition,
            self.config.mc_samples,
            &self.dataset,
            &mut self.rng,
        )?;

        let gp_config = self.gp_config();
        let gp = GaussianProcess::fit(&train_thetas, &train_utilities, &gp_config, &mut self.rng)
            .context("surrogate fit over acquisition utilities failed")?;
        let grid_array = self.param_grid.array();
        let (mean, std) = gp.predict(&grid_array);

        let mut ucb = &mean + &std.mapv(|s| self.config.ucb_kappa * s);
        for (i, &trialed) in self.trialed_mask.iter().enumerate() {
            if trialed {
                ucb[i] = f64::NEG_INFINITY;
            }
        }
        let (best, _) = ucb
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv {
                    (i, v)
                } else {
                    (bi, bv)
                }
            });

        let validation = match &self.full_dataset {
            Some(full) => {
                let (thetas, values) = marginalised_acquisition(
                    &self.ratio_model,
                    self.config.acquisition,
                    self.config.mc_samples,
                    full,
                    &mut self.rng,
                )?;
                Some(UtilitySeries {
                    thetas: rows_to_vecs(&thetas),
                    values: values.to_vec(),
                })
            }
            None => None,
        };
        self.acquisition_history.push(AcquisitionRecord {
            step: self.step_count + 1,
            training: UtilitySeries {
                thetas: rows_to_vecs(&train_thetas),
                values: train_utilities.to_vec(),
            },
            predicted: UtilitySeries {
                thetas: rows_to_vecs(&grid_array),
                values: mean.to_vec(),
            },
            validation,
        });

        Ok(best)
    }

    /// Default surrogate length scales are a tenth of the grid range per
    /// dimension, so the kernel resolves neighbouring grid points.
    fn gp_config(&self) -> GpConfig {
        let mut config = self.config.gp.clone().unwrap_or_default();
        if config.length_scales.is_none() {
            let scales = self
                .param_grid
                .linspaces()
                .iter()
                .map(|axis| {
                    let lo = axis.iter().cloned().fold(f64::INFINITY, f64::min);
                    let hi = axis.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    ((hi - lo) / 10.0).max(1e-6)
                })
                .collect();
            config.length_scales = Some(scales);
        }
        config
    }

    fn remaining_count(&self) -> usize {
        self.trialed_mask.iter().filter(|&&t| !t).count()
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn dataset(&self) -> &RatioDataset {
        &self.dataset
    }

    pub fn ratio_model(&self) -> &SinglyParameterizedRatioModel {
        &self.ratio_model
    }

    pub fn trialed_mask(&self) -> &Array1<bool> {
        &self.trialed_mask
    }

    pub fn all_thetas(&self) -> Array2<f64> {
        self.param_grid.array()
    }

    pub fn trialed_thetas(&self) -> Array2<f64> {
        self.select_thetas(true)
    }

    pub fn remaining_thetas(&self) -> Array2<f64> {
        self.select_thetas(false)
    }

    pub fn train_history(&self) -> &[TrainRecord] {
        &self.train_history
    }

    pub fn test_history(&self) -> &[TestRecord] {
        &self.test_history
    }

    pub fn acquisition_history(&self) -> &[AcquisitionRecord] {
        &self.acquisition_history
    }

    fn select_thetas(&self, trialed: bool) -> Array2<f64> {
        let rows: Vec<usize> = self
            .trialed_mask
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == trialed)
            .map(|(i, _)| i)
            .collect();
        self.param_grid.array().select(Axis(0), &rows)
    }
}

/// Mean acquisition score per distinct `theta_1` in the dataset, driven by
/// Monte Carlo predictive samples from the classifier.
fn marginalised_acquisition(
    model: &SinglyParameterizedRatioModel,
    acquisition: Acquisition,
    mc_samples: usize,
    dataset: &RatioDataset,
    rng: &mut StdRng,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let bayesian = model
        .classifier()
        .as_bayesian()
        .ok_or_else(|| Error::NotBayesian(model.classifier().name().to_string()))?;

    let groups = dataset.group_by_theta_1();
    let dim = groups.first().map(|(theta, _)| theta.len()).unwrap_or(0);
    let mut thetas = Array2::zeros((groups.len(), dim));
    let mut utilities = Array1::zeros(groups.len());
    for (g, (theta, rows)) in groups.iter().enumerate() {
        let x = dataset.x.select(Axis(0), rows);
        let theta_1s = stack_repeat(theta, x.nrows());
        let input = model.transform_input(&parameterized_input(&x, &theta_1s));
        let samples = bayesian.sample_predictive(&input, mc_samples, rng);
        let scores = acquisition.score(&samples);
        thetas.row_mut(g).assign(theta);
        utilities[g] = scores.mean().unwrap_or(0.0);
    }
    Ok((thetas, utilities))
}

/// Mean squared error of predicted class-1 probabilities against the exact
/// classifier derived from the dataset's log densities.
fn held_out_mse(model: &SinglyParameterizedRatioModel, dataset: &RatioDataset) -> f64 {
    let probs = model.predict_proba_dataset(dataset);
    let l0 = dataset
        .log_prob_0
        .as_ref()
        .expect("test dataset carries log densities")
        .mapv(f64::exp);
    let l1 = dataset
        .log_prob_1
        .as_ref()
        .expect("test dataset carries log densities")
        .mapv(f64::exp);
    let ideal = ideal_classifier_probs(&l0, &l1);
    mean_squared_error(&probs, &ideal)
}

fn rows_to_vecs(arr: &Array2<f64>) -> Vec<Vec<f64>> {
    arr.rows().into_iter().map(|r| r.to_vec()).collect()
}
