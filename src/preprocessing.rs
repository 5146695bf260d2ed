//! Input standardization shared by the ratio models.
//!
//! The fitted `Scaler` is part of a model's state: the acquisition path
//! re-applies the same transform before drawing predictive samples from the
//! classifier.

use ndarray::Array2;

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-12;
}

/// Fit a `Scaler` from a matrix where rows are examples and columns are
/// features.
pub fn fit_scaler(x: &Array2<f64>) -> Scaler {
    let (nrows, ncols) = x.dim();
    assert!(nrows > 0 && ncols > 0, "fit_scaler requires non-empty matrix");

    let nrows_f = nrows as f64;
    let mut mean = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, &v) in row.iter().enumerate() {
            mean[c] += v;
        }
    }
    for v in mean.iter_mut() {
        *v /= nrows_f;
    }

    let mut var = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, &v) in row.iter().enumerate() {
            let d = v - mean[c];
            var[c] += d * d;
        }
    }
    for v in var.iter_mut() {
        *v = (*v / nrows_f).sqrt().max(Scaler::MIN_STD);
    }

    Scaler { mean, std: var }
}

/// Transform all rows using the provided `Scaler`, returning a new matrix.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Array2<f64> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (*v - sc.mean[c]) / sc.std[c];
        }
    }
    out
}
