//! Labeled datasets for ratio estimation, built from simulator draws at two
//! parameter values.
//!
//! Label 0 marks examples drawn at the reference parameter `theta_0`, label 1
//! examples drawn at an alternate parameter. The dataset grows by appending
//! and is reshuffled by the active-learning loop after every growth step; it
//! is never shrunk.

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::grid::ParamIterator;
use crate::simulate::SimulatorFactory;

/// Build the joint classifier input for the singly parameterized model:
/// features and alternate parameters concatenated along the feature axis.
pub fn parameterized_input(x: &Array2<f64>, theta_1s: &Array2<f64>) -> Array2<f64> {
    concatenate(Axis(1), &[x.view(), theta_1s.view()])
        .expect("x and theta_1s must have the same number of rows")
}

/// What to attach to a dataset beyond features and labels.
#[derive(Debug, Clone, Copy)]
pub struct DatasetOptions {
    /// Attach per-example `-(log p1(x) - log p0(x))`.
    pub include_nllr: bool,
    /// Attach the raw per-example log densities under both models.
    pub include_log_probs: bool,
    /// Apply a random permutation after construction.
    pub shuffle: bool,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions {
            include_nllr: true,
            include_log_probs: false,
            shuffle: true,
        }
    }
}

impl DatasetOptions {
    pub fn with_log_probs() -> Self {
        DatasetOptions {
            include_log_probs: true,
            ..Default::default()
        }
    }
}

/// Singly parameterized ratio dataset: one fixed reference parameter, one
/// alternate parameter per example.
#[derive(Debug, Clone)]
pub struct RatioDataset {
    pub x: Array2<f64>,
    pub theta_0s: Array2<f64>,
    pub theta_1s: Array2<f64>,
    pub y: Array1<f64>,
    pub nllr: Option<Array1<f64>>,
    pub log_prob_0: Option<Array1<f64>>,
    pub log_prob_1: Option<Array1<f64>>,
}

impl RatioDataset {
    /// Assemble a dataset from already-materialized arrays, enforcing the
    /// equal-length invariant across every per-example array.
    pub fn new(
        x: Array2<f64>,
        theta_0s: Array2<f64>,
        theta_1s: Array2<f64>,
        y: Array1<f64>,
        nllr: Option<Array1<f64>>,
        log_prob_0: Option<Array1<f64>>,
        log_prob_1: Option<Array1<f64>>,
    ) -> Result<Self> {
        let n = x.nrows();
        check_len(theta_0s.nrows(), n)?;
        check_len(theta_1s.nrows(), n)?;
        check_len(y.len(), n)?;
        for arr in [&nllr, &log_prob_0, &log_prob_1].into_iter().flatten() {
            check_len(arr.len(), n)?;
        }
        Ok(RatioDataset {
            x,
            theta_0s,
            theta_1s,
            y,
            nllr,
            log_prob_0,
            log_prob_1,
        })
    }

    /// Draw a labeled dataset from the simulator: `n_samples_per_theta *
    /// len(theta_1_iterator)` reference examples (label 0) and, per alternate
    /// theta, `n_samples_per_theta` examples at that theta (label 1).
    ///
    /// When densities are requested, all four log-density blocks are
    /// evaluated independently: reference and alternate model, each on both
    /// the reference-drawn and alternate-drawn examples.
    pub fn from_simulator(
        factory: &dyn SimulatorFactory,
        theta_0: &Array1<f64>,
        theta_1_iterator: &ParamIterator,
        n_samples_per_theta: usize,
        opts: DatasetOptions,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if theta_1_iterator.is_empty() || n_samples_per_theta == 0 {
            return Err(Error::EmptyGrid);
        }
        let m = theta_1_iterator.len();
        let n = n_samples_per_theta;
        let need_densities = opts.include_nllr || opts.include_log_probs;

        let sim0 = factory.simulator(theta_0);
        let x0 = sim0.sample(n * m, rng);
        let x_dim = x0.ncols();
        let theta_dim = theta_0.len();

        let mut x1 = Array2::zeros((n * m, x_dim));
        let mut theta_1s_half = Array2::zeros((n * m, theta_dim));
        let mut ll0_x0 = Array1::zeros(n * m);
        let mut ll1_x0 = Array1::zeros(n * m);
        let mut ll0_x1 = Array1::zeros(n * m);
        let mut ll1_x1 = Array1::zeros(n * m);

        for (i, theta_1) in theta_1_iterator.iter().enumerate() {
            if theta_1.len() != theta_dim {
                return Err(Error::ShapeMismatch(format!(
                    "theta_1 has {} dimensions, theta_0 has {}",
                    theta_1.len(),
                    theta_dim
                )));
            }
            let sim1 = factory.simulator(theta_1);
            let start = i * n;
            let stop = (i + 1) * n;

            let block = sim1.sample(n, rng);
            x1.slice_mut(ndarray::s![start..stop, ..]).assign(&block);
            for row in start..stop {
                theta_1s_half.row_mut(row).assign(theta_1);
            }

            if need_densities {
                let x0_block = x0.slice(ndarray::s![start..stop, ..]).to_owned();
                ll0_x0
                    .slice_mut(ndarray::s![start..stop])
                    .assign(&sim0.log_prob(&x0_block));
                ll1_x0
                    .slice_mut(ndarray::s![start..stop])
                    .assign(&sim1.log_prob(&x0_block));
                ll0_x1
                    .slice_mut(ndarray::s![start..stop])
                    .assign(&sim0.log_prob(&block));
                ll1_x1
                    .slice_mut(ndarray::s![start..stop])
                    .assign(&sim1.log_prob(&block));
            }
        }

        let x = concatenate(Axis(0), &[x0.view(), x1.view()]).expect("feature widths agree");
        let y = concatenate(
            Axis(0),
            &[
                Array1::zeros(n * m).view(),
                Array1::ones(n * m).view(),
            ],
        )
        .expect("label blocks agree");
        let theta_1s = concatenate(Axis(0), &[theta_1s_half.view(), theta_1s_half.view()])
            .expect("parameter widths agree");
        let mut theta_0s = Array2::zeros((2 * n * m, theta_dim));
        for mut row in theta_0s.rows_mut() {
            row.assign(theta_0);
        }

        let (log_prob_0, log_prob_1, nllr) = if need_densities {
            let lp0 = concatenate(Axis(0), &[ll0_x0.view(), ll0_x1.view()]).unwrap();
            let lp1 = concatenate(Axis(0), &[ll1_x0.view(), ll1_x1.view()]).unwrap();
            let nllr = opts.include_nllr.then(|| -(&lp1 - &lp0));
            if opts.include_log_probs {
                (Some(lp0), Some(lp1), nllr)
            } else {
                (None, None, nllr)
            }
        } else {
            (None, None, None)
        };

        let mut ds = RatioDataset::new(x, theta_0s, theta_1s, y, nllr, log_prob_0, log_prob_1)?;
        if opts.shuffle {
            ds.shuffle(rng);
        }
        Ok(ds)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Joint classifier input for every example.
    pub fn build_input(&self) -> Array2<f64> {
        parameterized_input(&self.x, &self.theta_1s)
    }

    /// Apply one random permutation consistently across every per-example
    /// array.
    pub fn shuffle(&mut self, rng: &mut StdRng) {
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.shuffle(rng);

        self.x = self.x.select(Axis(0), &perm);
        self.theta_0s = self.theta_0s.select(Axis(0), &perm);
        self.theta_1s = self.theta_1s.select(Axis(0), &perm);
        self.y = self.y.select(Axis(0), &perm);
        for arr in [&mut self.nllr, &mut self.log_prob_0, &mut self.log_prob_1]
            .into_iter()
            .flatten()
        {
            *arr = arr.select(Axis(0), &perm);
        }
    }

    /// Append another dataset; the result's arrays are the elementwise
    /// concatenation of the operands' arrays. Optional arrays survive only
    /// when present on both operands.
    pub fn append(&mut self, other: &RatioDataset) -> Result<()> {
        if self.x.ncols() != other.x.ncols() || self.theta_1s.ncols() != other.theta_1s.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "cannot append ({}, {}) columns onto ({}, {})",
                other.x.ncols(),
                other.theta_1s.ncols(),
                self.x.ncols(),
                self.theta_1s.ncols()
            )));
        }

        self.x = concatenate(Axis(0), &[self.x.view(), other.x.view()]).unwrap();
        self.theta_0s =
            concatenate(Axis(0), &[self.theta_0s.view(), other.theta_0s.view()]).unwrap();
        self.theta_1s =
            concatenate(Axis(0), &[self.theta_1s.view(), other.theta_1s.view()]).unwrap();
        self.y = concatenate(Axis(0), &[self.y.view(), other.y.view()]).unwrap();

        self.nllr = concat_optional(&self.nllr, &other.nllr);
        self.log_prob_0 = concat_optional(&self.log_prob_0, &other.log_prob_0);
        self.log_prob_1 = concat_optional(&self.log_prob_1, &other.log_prob_1);
        Ok(())
    }

    /// Unique alternate parameter values present in the dataset, in first-seen
    /// order, with the row indices carrying each value.
    pub fn group_by_theta_1(&self) -> Vec<(Array1<f64>, Vec<usize>)> {
        let mut groups: Vec<(Array1<f64>, Vec<usize>)> = Vec::new();
        for (row_idx, row) in self.theta_1s.rows().into_iter().enumerate() {
            match groups
                .iter_mut()
                .find(|(theta, _)| theta.iter().zip(row.iter()).all(|(a, b)| a == b))
            {
                Some((_, rows)) => rows.push(row_idx),
                None => groups.push((row.to_owned(), vec![row_idx])),
            }
        }
        groups
    }
}

/// Ratio dataset for a single fixed pair `(theta_0, theta_1)`; the model
/// input carries no parameter columns.
#[derive(Debug, Clone)]
pub struct UnparameterizedRatioDataset {
    pub theta_0: Array1<f64>,
    pub theta_1: Array1<f64>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub nllr: Option<Array1<f64>>,
}

impl UnparameterizedRatioDataset {
    pub fn from_simulator(
        factory: &dyn SimulatorFactory,
        theta_0: &Array1<f64>,
        theta_1: &Array1<f64>,
        n_samples_per_theta: usize,
        opts: DatasetOptions,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if n_samples_per_theta == 0 {
            return Err(Error::EmptyGrid);
        }
        let sim0 = factory.simulator(theta_0);
        let sim1 = factory.simulator(theta_1);
        let x0 = sim0.sample(n_samples_per_theta, rng);
        let x1 = sim1.sample(n_samples_per_theta, rng);

        let nllr = if opts.include_nllr {
            let lp0 = concatenate(Axis(0), &[sim0.log_prob(&x0).view(), sim0.log_prob(&x1).view()])
                .unwrap();
            let lp1 = concatenate(Axis(0), &[sim1.log_prob(&x0).view(), sim1.log_prob(&x1).view()])
                .unwrap();
            Some(-(&lp1 - &lp0))
        } else {
            None
        };

        let x = concatenate(Axis(0), &[x0.view(), x1.view()]).unwrap();
        let y = concatenate(
            Axis(0),
            &[
                Array1::zeros(n_samples_per_theta).view(),
                Array1::ones(n_samples_per_theta).view(),
            ],
        )
        .unwrap();

        let mut ds = UnparameterizedRatioDataset {
            theta_0: theta_0.clone(),
            theta_1: theta_1.clone(),
            x,
            y,
            nllr,
        };
        if opts.shuffle {
            ds.shuffle(rng);
        }
        Ok(ds)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn build_input(&self) -> Array2<f64> {
        self.x.clone()
    }

    pub fn shuffle(&mut self, rng: &mut StdRng) {
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.shuffle(rng);
        self.x = self.x.select(Axis(0), &perm);
        self.y = self.y.select(Axis(0), &perm);
        if let Some(nllr) = &mut self.nllr {
            *nllr = nllr.select(Axis(0), &perm);
        }
    }
}

fn check_len(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(Error::LengthMismatch { expected, got });
    }
    Ok(())
}

fn concat_optional(a: &Option<Array1<f64>>, b: &Option<Array1<f64>>) -> Option<Array1<f64>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(concatenate(Axis(0), &[a.view(), b.view()]).unwrap()),
        _ => None,
    }
}
