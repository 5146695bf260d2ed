//! Gaussian-process surrogate over the acquisition surface.
//!
//! Kernel: `signal_var * RBF(fixed per-dimension length scales) + white
//! noise`. The length scales are not optimized; the signal and noise
//! variances are fitted by maximizing the log marginal likelihood with
//! random restarts. Targets are standardized before fitting and the
//! prediction is mapped back.

use anyhow::{anyhow, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Surrogate configuration. `length_scales: None` falls back to the
/// per-dimension standard deviation of the training inputs; the active
/// learner always passes (grid range) / 10 per dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpConfig {
    pub length_scales: Option<Vec<f64>>,
    pub n_restarts: usize,
    pub normalize_y: bool,
    /// Extra observation-noise floor added to the kernel diagonal. Zero by
    /// default; the fitted white-noise term carries the observation noise.
    pub jitter: f64,
}

impl Default for GpConfig {
    fn default() -> Self {
        GpConfig {
            length_scales: None,
            n_restarts: 5,
            normalize_y: true,
            jitter: 0.0,
        }
    }
}

/// A fitted Gaussian-process regressor.
pub struct GaussianProcess {
    x_train: Vec<Vec<f64>>,
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    alpha: DVector<f64>,
    length_scales: Vec<f64>,
    signal_var: f64,
    noise_var: f64,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    /// Fit the surrogate to `(x, y)` pairs. Rebuilt from scratch on every
    /// call; there is no incremental update.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: &GpConfig, rng: &mut StdRng) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(anyhow!(
                "GP needs matching non-empty training arrays, got {} inputs and {} targets",
                n,
                y.len()
            ));
        }

        let x_train: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let d = x.ncols();

        let length_scales = match &config.length_scales {
            Some(ls) => {
                if ls.len() != d {
                    return Err(anyhow!(
                        "{} length scales for {}-dimensional inputs",
                        ls.len(),
                        d
                    ));
                }
                ls.clone()
            }
            None => column_std(&x_train, d),
        };

        let (y_mean, y_std) = if config.normalize_y {
            standardization_params(y)
        } else {
            (0.0, 1.0)
        };
        let y_scaled: Vec<f64> = y.iter().map(|&v| (v - y_mean) / y_std).collect();

        let (signal_var, noise_var) =
            optimize_variances(&x_train, &y_scaled, &length_scales, config, rng);

        let (cholesky, alpha) = factorize(
            &x_train,
            &y_scaled,
            &length_scales,
            signal_var,
            noise_var,
            config.jitter,
        )
        .ok_or_else(|| anyhow!("kernel matrix is not positive definite"))?;

        Ok(GaussianProcess {
            x_train,
            cholesky,
            alpha,
            length_scales,
            signal_var,
            noise_var,
            y_mean,
            y_std,
        })
    }

    /// Posterior mean and standard deviation at every row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = x.nrows();
        let mut mean = Array1::zeros(n);
        let mut std = Array1::zeros(n);

        for (i, row) in x.rows().into_iter().enumerate() {
            let point: Vec<f64> = row.to_vec();
            let k_star = DVector::from_fn(self.x_train.len(), |j, _| {
                rbf(&point, &self.x_train[j], &self.length_scales, self.signal_var)
            });
            let m = k_star.dot(&self.alpha);
            let v = self.cholesky.solve(&k_star);
            let prior_var = self.signal_var + self.noise_var;
            let var = (prior_var - k_star.dot(&v)).max(0.0);

            mean[i] = m * self.y_std + self.y_mean;
            std[i] = var.sqrt() * self.y_std;
        }
        (mean, std)
    }

    pub fn signal_variance(&self) -> f64 {
        self.signal_var
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_var
    }
}

fn rbf(a: &[f64], b: &[f64], length_scales: &[f64], signal_var: f64) -> f64 {
    let mut r2 = 0.0;
    for i in 0..a.len() {
        let d = (a[i] - b[i]) / length_scales[i];
        r2 += d * d;
    }
    signal_var * (-0.5 * r2).exp()
}

fn kernel_matrix(
    x: &[Vec<f64>],
    length_scales: &[f64],
    signal_var: f64,
    noise_var: f64,
    jitter: f64,
) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        let k = rbf(&x[i], &x[j], length_scales, signal_var);
        if i == j {
            k + noise_var + jitter
        } else {
            k
        }
    })
}

fn factorize(
    x: &[Vec<f64>],
    y: &[f64],
    length_scales: &[f64],
    signal_var: f64,
    noise_var: f64,
    jitter: f64,
) -> Option<(nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>, DVector<f64>)> {
    // escalate jitter only if the factorization fails outright
    let mut extra = jitter;
    for _ in 0..6 {
        let k = kernel_matrix(x, length_scales, signal_var, noise_var, extra);
        if let Some(chol) = nalgebra::linalg::Cholesky::new(k) {
            let y_vec = DVector::from_column_slice(y);
            let alpha = chol.solve(&y_vec);
            return Some((chol, alpha));
        }
        extra = if extra == 0.0 { 1e-10 } else { extra * 100.0 };
    }
    None
}

fn log_marginal_likelihood(
    x: &[Vec<f64>],
    y: &[f64],
    length_scales: &[f64],
    signal_var: f64,
    noise_var: f64,
    jitter: f64,
) -> Option<f64> {
    let (chol, alpha) = factorize(x, y, length_scales, signal_var, noise_var, jitter)?;
    let y_vec = DVector::from_column_slice(y);
    let n = y.len() as f64;
    let log_det: f64 = (0..y.len()).map(|i| chol.l_dirty()[(i, i)].ln()).sum();
    Some(-0.5 * y_vec.dot(&alpha) - log_det - 0.5 * n * (2.0 * std::f64::consts::PI).ln())
}

/// Fit the signal and noise variances by restarted coordinate descent on the
/// log marginal likelihood. The RBF length scales stay fixed.
fn optimize_variances(
    x: &[Vec<f64>],
    y: &[f64],
    length_scales: &[f64],
    config: &GpConfig,
    rng: &mut StdRng,
) -> (f64, f64) {
    let mut best = (1.0, 1e-3);
    let mut best_lml = log_marginal_likelihood(x, y, length_scales, best.0, best.1, config.jitter)
        .unwrap_or(f64::NEG_INFINITY);

    for restart in 0..config.n_restarts.max(1) {
        // first restart starts from unit signal / small noise, the rest are
        // random draws in log space
        let (mut log_s, mut log_n): (f64, f64) = if restart == 0 {
            (0.0, -6.0)
        } else {
            (rng.gen_range(-2.0..2.0), rng.gen_range(-9.0..0.0))
        };

        let mut lml = log_marginal_likelihood(
            x,
            y,
            length_scales,
            log_s.exp(),
            log_n.exp(),
            config.jitter,
        )
        .unwrap_or(f64::NEG_INFINITY);

        for &step in &[1.0f64, 0.3, 0.1] {
            let mut improved = true;
            while improved {
                improved = false;
                for param in 0..2 {
                    for delta in [step, -step] {
                        let (s, n) = if param == 0 {
                            (log_s + delta, log_n)
                        } else {
                            (log_s, log_n + delta)
                        };
                        let candidate = log_marginal_likelihood(
                            x,
                            y,
                            length_scales,
                            s.exp(),
                            n.exp(),
                            config.jitter,
                        )
                        .unwrap_or(f64::NEG_INFINITY);
                        if candidate > lml {
                            lml = candidate;
                            log_s = s;
                            log_n = n;
                            improved = true;
                        }
                    }
                }
            }
        }

        if lml > best_lml {
            best_lml = lml;
            best = (log_s.exp(), log_n.exp());
        }
    }

    best
}

fn column_std(x: &[Vec<f64>], d: usize) -> Vec<f64> {
    let n = x.len() as f64;
    (0..d)
        .map(|j| {
            let mean = x.iter().map(|row| row[j]).sum::<f64>() / n;
            let var = x.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
            var.sqrt().max(0.01)
        })
        .collect()
}

fn standardization_params(y: &Array1<f64>) -> (f64, f64) {
    let n = y.len() as f64;
    let mean = y.sum() / n;
    let var = y.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt().max(1e-12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn fit_sine() -> (GaussianProcess, Array2<f64>) {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64 / 11.0);
        let y = Array1::from_shape_fn(12, |i| (2.0 * std::f64::consts::PI * i as f64 / 11.0).sin());
        let config = GpConfig {
            length_scales: Some(vec![0.1]),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let gp = GaussianProcess::fit(&x, &y, &config, &mut rng).unwrap();
        (gp, x)
    }

    #[test]
    fn interpolates_training_points() {
        let (gp, x) = fit_sine();
        let (mean, _) = gp.predict(&x);
        for i in 0..x.nrows() {
            let truth = (2.0 * std::f64::consts::PI * x[[i, 0]]).sin();
            assert!(
                (mean[i] - truth).abs() < 0.2,
                "mean {} vs {} at {}",
                mean[i],
                truth,
                x[[i, 0]]
            );
        }
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let (gp, _) = fit_sine();
        let (_, std_near) = gp.predict(&array![[0.5]]);
        let (_, std_far) = gp.predict(&array![[3.0]]);
        assert!(std_far[0] > std_near[0]);
    }

    #[test]
    fn rejects_empty_training_set() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::<f64>::zeros((0, 1));
        let y = Array1::<f64>::zeros(0);
        assert!(GaussianProcess::fit(&x, &y, &GpConfig::default(), &mut rng).is_err());
    }

    #[test]
    fn constant_targets_are_handled() {
        let x = Array2::from_shape_fn((5, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(5, 2.0);
        let mut rng = StdRng::seed_from_u64(5);
        let gp = GaussianProcess::fit(&x, &y, &GpConfig::default(), &mut rng).unwrap();
        let (mean, _) = gp.predict(&array![[2.5]]);
        assert!((mean[0] - 2.0).abs() < 0.5);
    }
}
