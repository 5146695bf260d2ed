//! Parameter iterators and grids over simulator parameter space.
//!
//! A `ParamIterator` is an ordered sequence of fixed-width parameter vectors.
//! `ParamGrid` is the Cartesian product of per-dimension linear spaces, with
//! the first dimension outermost (slowest-varying), and exposes the
//! mesh-grid view used to reshape flat scan results back to N-D.

use ndarray::{Array1, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;

use crate::error::{Error, Result};
use crate::simulate::Simulator;

/// An ordered, indexable sequence of parameter vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamIterator {
    values: Vec<Array1<f64>>,
}

impl ParamIterator {
    pub fn new(values: Vec<Array1<f64>>) -> Self {
        ParamIterator { values }
    }

    /// A single-point iterator, used when simulating at one chosen theta.
    pub fn single(theta: Array1<f64>) -> Self {
        ParamIterator {
            values: vec![theta],
        }
    }

    /// The same theta repeated `n` times.
    pub fn repeat(theta: Array1<f64>, n: usize) -> Self {
        ParamIterator {
            values: std::iter::repeat(theta).take(n).collect(),
        }
    }

    /// Draw `n` parameter vectors from a distribution over parameter space;
    /// each sampled row becomes one theta.
    pub fn sampled(dist: &dyn Simulator, n: usize, rng: &mut StdRng) -> Self {
        let draws = dist.sample(n, rng);
        ParamIterator {
            values: draws.rows().into_iter().map(|r| r.to_owned()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Array1<f64>> {
        self.values.iter()
    }

    pub fn get(&self, index: usize) -> &Array1<f64> {
        &self.values[index]
    }

    /// Stack all parameter vectors into a (len, dim) matrix.
    pub fn array(&self) -> Array2<f64> {
        let dim = self.values.first().map(|v| v.len()).unwrap_or(0);
        let mut out = Array2::zeros((self.values.len(), dim));
        for (i, theta) in self.values.iter().enumerate() {
            out.row_mut(i).assign(theta);
        }
        out
    }
}

impl std::ops::Index<usize> for ParamIterator {
    type Output = Array1<f64>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl<'a> IntoIterator for &'a ParamIterator {
    type Item = &'a Array1<f64>;
    type IntoIter = std::slice::Iter<'a, Array1<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Number of grid points per dimension: one shared count or one per dimension.
#[derive(Debug, Clone)]
pub enum GridSize {
    Shared(usize),
    PerDim(Vec<usize>),
}

impl From<usize> for GridSize {
    fn from(n: usize) -> Self {
        GridSize::Shared(n)
    }
}

impl From<Vec<usize>> for GridSize {
    fn from(nums: Vec<usize>) -> Self {
        GridSize::PerDim(nums)
    }
}

/// Cartesian product of per-dimension inclusive linear spaces.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    linspaces: Vec<Array1<f64>>,
    points: ParamIterator,
}

impl ParamGrid {
    pub fn new<S: Into<GridSize>>(bounds: &[(f64, f64)], num: S) -> Result<Self> {
        if bounds.is_empty() {
            return Err(Error::EmptyGrid);
        }
        let nums = match num.into() {
            GridSize::Shared(n) => vec![n; bounds.len()],
            GridSize::PerDim(nums) => {
                if nums.len() != bounds.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "{} point counts for {} bound pairs",
                        nums.len(),
                        bounds.len()
                    )));
                }
                nums
            }
        };
        if nums.iter().any(|&n| n == 0) {
            return Err(Error::EmptyGrid);
        }

        let linspaces: Vec<Array1<f64>> = bounds
            .iter()
            .zip(nums.iter())
            .map(|(&(lo, hi), &n)| linspace(lo, hi, n))
            .collect();
        let points = cartesian_product(&linspaces);

        Ok(ParamGrid {
            linspaces,
            points: ParamIterator::new(points),
        })
    }

    pub fn linspaces(&self) -> &[Array1<f64>] {
        &self.linspaces
    }

    pub fn points(&self) -> &ParamIterator {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.linspaces.len()
    }

    pub fn get(&self, index: usize) -> &Array1<f64> {
        self.points.get(index)
    }

    pub fn array(&self) -> Array2<f64> {
        self.points.array()
    }

    /// Shape of the N-D mesh view: one axis per dimension, in grid order.
    pub fn mesh_shape(&self) -> Vec<usize> {
        self.linspaces.iter().map(|l| l.len()).collect()
    }

    /// Per-dimension coordinate grids, `ij`-indexed: axis k of every grid
    /// corresponds to dimension k, so a flat product-ordered array reshapes
    /// directly to `mesh_shape()` without any axis swap.
    pub fn meshgrid(&self) -> Vec<ArrayD<f64>> {
        let shape = self.mesh_shape();
        self.linspaces
            .iter()
            .enumerate()
            .map(|(dim, linspace)| {
                ArrayD::from_shape_fn(IxDyn(&shape), |idx| linspace[idx[dim]])
            })
            .collect()
    }

    /// Derive the trialed mask: entry i is true iff grid point i equals, on
    /// every dimension, at least one vector in `sampled`.
    ///
    /// Matching is exact floating-point equality. Parameter values that were
    /// not drawn from this grid's own coordinate set will not set any entry.
    pub fn trialed_mask(&self, sampled: &ParamIterator) -> Array1<bool> {
        let mut mask = Array1::from_elem(self.points.len(), false);
        for (i, point) in self.points.iter().enumerate() {
            for theta in sampled.iter() {
                if theta.len() == point.len() && theta.iter().zip(point.iter()).all(|(a, b)| a == b)
                {
                    mask[i] = true;
                    break;
                }
            }
        }
        mask
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Array1<f64> {
    if n == 1 {
        return Array1::from_vec(vec![lo]);
    }
    let step = (hi - lo) / (n - 1) as f64;
    Array1::from_shape_fn(n, |i| lo + step * i as f64)
}

fn cartesian_product(linspaces: &[Array1<f64>]) -> Vec<Array1<f64>> {
    let total: usize = linspaces.iter().map(|l| l.len()).product();
    let ndim = linspaces.len();
    let mut out = Vec::with_capacity(total);
    let mut counters = vec![0usize; ndim];

    for _ in 0..total {
        let theta = Array1::from_shape_fn(ndim, |d| linspaces[d][counters[d]]);
        out.push(theta);

        // odometer increment, last dimension fastest-varying
        for d in (0..ndim).rev() {
            counters[d] += 1;
            if counters[d] < linspaces[d].len() {
                break;
            }
            counters[d] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn linspace_endpoints_inclusive() {
        let grid = ParamGrid::new(&[(0.0, 1.0)], 5).unwrap();
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        assert_eq!(grid.len(), 5);
        for (point, want) in grid.points().iter().zip(expected.iter()) {
            assert_eq!(point[0], *want);
        }
    }

    #[test]
    fn product_order_first_dim_outermost() {
        let grid = ParamGrid::new(&[(0.0, 1.0), (10.0, 11.0)], 2).unwrap();
        let points: Vec<_> = grid.points().iter().cloned().collect();
        assert_eq!(points[0], array![0.0, 10.0]);
        assert_eq!(points[1], array![0.0, 11.0]);
        assert_eq!(points[2], array![1.0, 10.0]);
        assert_eq!(points[3], array![1.0, 11.0]);
    }

    #[test]
    fn meshgrid_shape_matches_mesh_shape() {
        let grid = ParamGrid::new(&[(0.0, 1.0), (0.0, 2.0)], vec![3, 5]).unwrap();
        let mesh = grid.meshgrid();
        assert_eq!(mesh.len(), 2);
        assert_eq!(mesh[0].shape(), &[3, 5][..]);
        assert_eq!(mesh[1].shape(), grid.mesh_shape().as_slice());
    }

    #[test]
    fn meshgrid_agrees_with_flat_product_order() {
        let grid = ParamGrid::new(&[(0.0, 1.0), (0.0, 2.0)], vec![3, 5]).unwrap();
        let mesh = grid.meshgrid();
        for (flat, theta) in grid.points().iter().enumerate() {
            let i = flat / 5;
            let j = flat % 5;
            assert_eq!(mesh[0][[i, j]], theta[0]);
            assert_eq!(mesh[1][[i, j]], theta[1]);
        }
    }

    #[test]
    fn trialed_mask_exact_match_only() {
        let grid = ParamGrid::new(&[(0.0, 1.0)], 5).unwrap();
        let sampled = ParamIterator::new(vec![array![0.5]]);
        let mask = grid.trialed_mask(&sampled);
        assert_eq!(mask.to_vec(), vec![false, false, true, false, false]);

        // off-grid value sets nothing
        let off = ParamIterator::new(vec![array![0.51]]);
        assert!(grid.trialed_mask(&off).iter().all(|&m| !m));
    }

    #[test]
    fn per_dim_count_mismatch_is_an_error() {
        assert!(ParamGrid::new(&[(0.0, 1.0)], vec![2, 3]).is_err());
        assert!(ParamGrid::new(&[], 3).is_err());
        assert!(ParamGrid::new(&[(0.0, 1.0)], 0).is_err());
    }

    #[test]
    fn sampled_iterator_draws_one_theta_per_row() {
        use crate::simulate::GaussianSimulator;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(31);
        let dist = GaussianSimulator::new(&array![0.0, 2.0]);
        let thetas = ParamIterator::sampled(&dist, 12, &mut rng);
        assert_eq!(thetas.len(), 12);
        assert!(thetas.iter().all(|t| t.len() == 1));
        // draws from a continuous distribution should not repeat
        assert_ne!(thetas.get(0), thetas.get(1));
    }

    #[test]
    fn single_point_dimension() {
        let grid = ParamGrid::new(&[(2.0, 5.0)], 1).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.get(0)[0], 2.0);
    }
}
