//! Parameter scans: turn per-point ratio predictions into a profile of the
//! negative log-likelihood ratio over a grid and report the MLE.
//!
//! Three variants share the profile/MLE reduction and differ only in how the
//! per-point ratio is obtained: direct model prediction, per-theta calibrated
//! prediction, or exact simulator densities.

use anyhow::{ensure, Result};
use log::debug;
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;

use crate::grid::ParamGrid;
use crate::model::{stack_repeat, SinglyParameterizedRatioModel};
use crate::simulate::SimulatorFactory;

/// Profile of the summed negative log-likelihood ratio over a grid, in the
/// grid's mesh shape, plus the minimizing parameter.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub nllr: ArrayD<f64>,
    pub mle: Array1<f64>,
}

/// Scan using the model's direct predictions. `n_batches` controls how many
/// grid chunks the joint input is assembled in, for memory control; 1 builds
/// a single `len(grid) * len(x_true)` input.
pub fn param_scan(
    model: &SinglyParameterizedRatioModel,
    x_true: &Array2<f64>,
    param_grid: &ParamGrid,
    n_batches: usize,
) -> Result<ScanResult> {
    ensure!(!param_grid.is_empty(), "parameter grid has no points");
    ensure!(x_true.nrows() > 0, "observed dataset is empty");

    let n_obs = x_true.nrows();
    let chunk_size = param_grid.len().div_ceil(n_batches.max(1));
    let mut nllr = Vec::with_capacity(param_grid.len());

    let thetas: Vec<_> = param_grid.points().iter().collect();
    for chunk in thetas.chunks(chunk_size) {
        let mut x_rep = Array2::zeros((chunk.len() * n_obs, x_true.ncols()));
        let mut theta_1s = Array2::zeros((chunk.len() * n_obs, chunk[0].len()));
        for (i, theta) in chunk.iter().enumerate() {
            let start = i * n_obs;
            x_rep
                .slice_mut(ndarray::s![start..start + n_obs, ..])
                .assign(x_true);
            theta_1s
                .slice_mut(ndarray::s![start..start + n_obs, ..])
                .assign(&stack_repeat(theta, n_obs));
        }

        let logr = model.predict(&x_rep, &theta_1s, true)?;
        for i in 0..chunk.len() {
            let segment = logr.slice(ndarray::s![i * n_obs..(i + 1) * n_obs]);
            nllr.push(-segment.sum());
        }
    }

    finish_scan(nllr, param_grid)
}

/// Scan through a per-theta calibration layer: every grid point gets a fresh
/// calibration simulation before prediction.
pub fn calibrated_param_scan(
    model: &SinglyParameterizedRatioModel,
    x_true: &Array2<f64>,
    param_grid: &ParamGrid,
    factory: &dyn SimulatorFactory,
    n_samples_per_theta: usize,
    rng: &mut StdRng,
) -> Result<ScanResult> {
    ensure!(!param_grid.is_empty(), "parameter grid has no points");
    ensure!(x_true.nrows() > 0, "observed dataset is empty");

    let mut nllr = Vec::with_capacity(param_grid.len());
    for (i, theta) in param_grid.points().iter().enumerate() {
        debug!("calibrated scan point {}/{}", i + 1, param_grid.len());
        let (logr, _) =
            model.calibrated_predict(x_true, theta, n_samples_per_theta, factory, true, rng)?;
        nllr.push(-logr.sum());
    }

    finish_scan(nllr, param_grid)
}

/// Ground-truth scan from simulator densities; bypasses the learned model
/// entirely and is used for validation and comparison.
pub fn exact_param_scan(
    factory: &dyn SimulatorFactory,
    x_true: &Array2<f64>,
    param_grid: &ParamGrid,
    theta_0: &Array1<f64>,
) -> Result<ScanResult> {
    ensure!(!param_grid.is_empty(), "parameter grid has no points");
    ensure!(x_true.nrows() > 0, "observed dataset is empty");

    let log_prob_0 = factory.simulator(theta_0).log_prob(x_true);
    let nllr: Vec<f64> = param_grid
        .points()
        .iter()
        .map(|theta| {
            let log_prob_theta = factory.simulator(theta).log_prob(x_true);
            -(&log_prob_theta - &log_prob_0).sum()
        })
        .collect();

    finish_scan(nllr, param_grid)
}

fn finish_scan(nllr: Vec<f64>, param_grid: &ParamGrid) -> Result<ScanResult> {
    let argmin = nllr
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .expect("non-empty profile");
    let mle = param_grid.get(argmin).clone();

    let profile = Array1::from_vec(nllr)
        .into_shape(IxDyn(&param_grid.mesh_shape()))
        .expect("profile length equals grid size");

    Ok(ScanResult { nllr: profile, mle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{GaussianSimulator, Simulator};
    use ndarray::array;
    use rand::SeedableRng;

    fn flat_view(profile: &ArrayD<f64>) -> Array1<f64> {
        Array1::from_iter(profile.iter().copied())
    }

    fn gaussian_factory() -> impl Fn(&Array1<f64>) -> Box<dyn Simulator> {
        |theta: &Array1<f64>| Box::new(GaussianSimulator::new(theta)) as Box<dyn Simulator>
    }

    #[test]
    fn exact_scan_recovers_gaussian_mean() {
        let factory = gaussian_factory();
        let mut rng = StdRng::seed_from_u64(21);
        let truth = array![0.5];
        let x_true = factory(&truth).sample(400, &mut rng);

        let grid = ParamGrid::new(&[(-1.0, 1.0)], 9).unwrap();
        let result = exact_param_scan(&factory, &x_true, &grid, &array![0.0]).unwrap();

        assert_eq!(result.nllr.shape(), &[9][..]);
        assert!(
            (result.mle[0] - 0.5).abs() < 0.3,
            "exact MLE {} should be near 0.5",
            result.mle[0]
        );
    }

    #[test]
    fn exact_scan_mle_is_profile_argmin() {
        let factory = gaussian_factory();
        let mut rng = StdRng::seed_from_u64(22);
        let x_true = factory(&array![0.0]).sample(100, &mut rng);

        let grid = ParamGrid::new(&[(-1.0, 1.0)], 11).unwrap();
        let result = exact_param_scan(&factory, &x_true, &grid, &array![0.0]).unwrap();

        let flat = flat_view(&result.nllr);
        let argmin = flat
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(result.mle, *grid.get(argmin));
    }

    #[test]
    fn empty_observations_rejected() {
        let factory = gaussian_factory();
        let grid = ParamGrid::new(&[(-1.0, 1.0)], 3).unwrap();
        let x_true = Array2::<f64>::zeros((0, 1));
        assert!(exact_param_scan(&factory, &x_true, &grid, &array![0.0]).is_err());
    }

    #[test]
    fn two_dimensional_profile_shape() {
        let factory = |theta: &Array1<f64>| {
            Box::new(GaussianSimulator::new(theta)) as Box<dyn Simulator>
        };
        let mut rng = StdRng::seed_from_u64(23);
        let x_true = factory(&array![0.0, 1.0]).sample(50, &mut rng);

        let grid = ParamGrid::new(&[(-1.0, 1.0), (0.5, 2.0)], vec![4, 6]).unwrap();
        let result = exact_param_scan(&factory, &x_true, &grid, &array![0.0, 1.0]).unwrap();
        assert_eq!(result.nllr.shape(), grid.mesh_shape().as_slice());
        assert_eq!(result.nllr.shape(), grid.meshgrid()[0].shape());
    }
}
