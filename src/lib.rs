//! ratio-estimation: likelihood-ratio estimation with probabilistic
//! classifiers and active learning over a parameter grid.
//!
//! This crate turns an implicit simulator into an estimate of the likelihood
//! ratio r(x | theta_0, theta_1) by training a classifier to separate samples
//! drawn at the two parameter values. On top of that sit parameterized
//! datasets and models, an acquisition-driven active learner that decides
//! where on the parameter grid to simulate next, and parameter scans that
//! recover maximum-likelihood estimates from the fitted ratio.
//!
//! The design favors small, testable modules: simulators and classifiers are
//! trait objects, and every stochastic step takes an explicitly seeded RNG.
pub mod acquisition;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gp;
pub mod grid;
pub mod learner;
pub mod model;
pub mod models;
pub mod preprocessing;
pub mod scan;
pub mod simulate;
pub mod stats;
