use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::acquisition::Acquisition;
use crate::gp::GpConfig;

/// Central configuration for classifier models.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported classifier types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    /// Gradient-boosted decision trees; probabilistic but not Bayesian.
    Gbdt {
        max_depth: u32,
        num_boost_round: u32,
        training_optimization_level: u8,
    },
    /// Bootstrap ensemble of GBDT members; supports predictive sampling.
    Ensemble {
        n_members: usize,
        max_depth: u32,
        num_boost_round: u32,
        seed: u64,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Gbdt {
            max_depth: 4,
            num_boost_round: 50,
            training_optimization_level: 2,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            "ensemble" => Ok(ModelType::Ensemble {
                n_members: 10,
                max_depth: 4,
                num_boost_round: 50,
                seed: 0,
            }),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f64, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Configuration for the active-learning loop.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LearnerConfig {
    /// Fresh examples simulated per parameter value, both initially and at
    /// every step.
    pub n_samples_per_theta: usize,
    pub acquisition: Acquisition,
    /// Exploration coefficient in `ucb = mean + kappa * std`.
    pub ucb_kappa: f64,
    /// Predictive samples drawn per input when scoring acquisitions.
    pub mc_samples: usize,
    /// Eagerly build a full-grid dataset for ground-truth acquisition
    /// diagnostics. Does not affect fitting or selection.
    pub validation_mode: bool,
    /// Seed for the learner-owned RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Surrogate overrides; `None` uses the default kernel with length
    /// scales fixed to (grid range) / 10 per dimension.
    pub gp: Option<GpConfig>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            n_samples_per_theta: 100,
            acquisition: Acquisition::Entropy,
            ucb_kappa: 1.0,
            mc_samples: 100,
            validation_mode: false,
            seed: None,
            gp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_from_str() {
        assert!(matches!(
            "gbdt".parse::<ModelType>().unwrap(),
            ModelType::Gbdt { .. }
        ));
        assert!(matches!(
            "ENSEMBLE".parse::<ModelType>().unwrap(),
            ModelType::Ensemble { .. }
        ));
        assert!("forest".parse::<ModelType>().is_err());
    }

    #[test]
    fn learner_config_default_is_acquisition_guided() {
        let config = LearnerConfig::default();
        assert_eq!(config.acquisition, Acquisition::Entropy);
        assert!(config.gp.is_none());
    }
}
