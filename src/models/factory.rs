use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::Classifier;
use crate::models::ensemble::EnsembleClassifier;
use crate::models::gbdt::GbdtClassifier;

/// Build a boxed classifier from a `ModelConfig`.
/// Currently this is a thin factory implemented as a single function.
pub fn build_model(params: ModelConfig) -> Box<dyn Classifier> {
    match params.model_type {
        ModelType::Gbdt { .. } => Box::new(GbdtClassifier::new(params)),
        ModelType::Ensemble { .. } => Box::new(EnsembleClassifier::new(params)),
    }
}
