//! Simulator collaborators: anything that can draw i.i.d. samples at a fixed
//! parameter and evaluate the per-example log-density.
//!
//! The learner and the dataset constructors only see the `Simulator` and
//! `SimulatorFactory` traits; the concrete distributions here are the ones
//! used by the tests and by the exact/validation paths.

use ndarray::{Array1, Array2};
use rand::distributions::Distribution as RandDistribution;
use rand::rngs::StdRng;
use rand::Rng;
use statrs::distribution::{Continuous, Normal};

use crate::stats::logsumexp;

/// A distribution at a fixed parameter value.
pub trait Simulator {
    /// Draw `n` i.i.d. examples, one per row.
    fn sample(&self, n: usize, rng: &mut StdRng) -> Array2<f64>;

    /// Per-example log-density for every row of `x`.
    fn log_prob(&self, x: &Array2<f64>) -> Array1<f64>;
}

/// Maps a parameter vector to the simulator at that parameter.
pub trait SimulatorFactory {
    fn simulator(&self, theta: &Array1<f64>) -> Box<dyn Simulator>;
}

impl<F> SimulatorFactory for F
where
    F: Fn(&Array1<f64>) -> Box<dyn Simulator>,
{
    fn simulator(&self, theta: &Array1<f64>) -> Box<dyn Simulator> {
        self(theta)
    }
}

/// Univariate Gaussian, theta = `[mean]` (unit scale) or `[mean, std]`.
pub struct GaussianSimulator {
    dist: Normal,
}

impl GaussianSimulator {
    pub fn new(theta: &Array1<f64>) -> Self {
        let mean = theta[0];
        let std = if theta.len() > 1 { theta[1] } else { 1.0 };
        GaussianSimulator {
            dist: Normal::new(mean, std).expect("scale must be positive and finite"),
        }
    }
}

impl Simulator for GaussianSimulator {
    fn sample(&self, n: usize, rng: &mut StdRng) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |_| self.dist.sample(rng))
    }

    fn log_prob(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::from_shape_fn(x.nrows(), |i| self.dist.ln_pdf(x[[i, 0]]))
    }
}

/// Three-component univariate Gaussian mixture with mixing controlled by a
/// single parameter `gamma`:
///
/// weights `[0.5 (1 - gamma), 0.5 (1 - gamma), gamma]` over components
/// `N(-2, 0.75)`, `N(0, 2)`, `N(1, 0.5)`.
pub struct TripleMixture {
    weights: [f64; 3],
    components: [Normal; 3],
}

impl TripleMixture {
    pub fn new(theta: &Array1<f64>) -> Self {
        let gamma = theta[0];
        TripleMixture {
            weights: [0.5 * (1.0 - gamma), 0.5 * (1.0 - gamma), gamma],
            components: [
                Normal::new(-2.0, 0.75).unwrap(),
                Normal::new(0.0, 2.0).unwrap(),
                Normal::new(1.0, 0.5).unwrap(),
            ],
        }
    }

    /// The closure form expected by [`SimulatorFactory`] call sites.
    pub fn factory() -> impl Fn(&Array1<f64>) -> Box<dyn Simulator> {
        |theta: &Array1<f64>| Box::new(TripleMixture::new(theta)) as Box<dyn Simulator>
    }
}

impl Simulator for TripleMixture {
    fn sample(&self, n: usize, rng: &mut StdRng) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |_| {
            let u: f64 = rng.gen();
            let mut acc = 0.0;
            let mut k = self.components.len() - 1;
            for (i, &w) in self.weights.iter().enumerate() {
                acc += w;
                if u < acc {
                    k = i;
                    break;
                }
            }
            self.components[k].sample(rng)
        })
    }

    fn log_prob(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::from_shape_fn(x.nrows(), |i| {
            let v = x[[i, 0]];
            let terms: Vec<f64> = self
                .weights
                .iter()
                .zip(self.components.iter())
                .map(|(&w, comp)| {
                    if w > 0.0 {
                        w.ln() + comp.ln_pdf(v)
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect();
            logsumexp(&terms)
        })
    }
}
