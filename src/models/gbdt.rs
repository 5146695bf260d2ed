use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{Classifier, FitSummary};
use crate::stats::{clip_prob, log_loss};

/// Gradient Boosting Decision Tree classifier.
///
/// Uses the log-likelihood loss; 0/1 labels are mapped to the -1/+1
/// convention the backend expects, and predictions come back as class-1
/// probabilities.
pub struct GbdtClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
}

impl GbdtClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GbdtClassifier {
            model: None,
            params,
        }
    }
}

impl Classifier for GbdtClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> FitSummary {
        let ModelType::Gbdt {
            max_depth,
            num_boost_round,
            training_optimization_level,
        } = &self.params.model_type
        else {
            panic!(
                "expected ModelType::Gbdt params, got {:?}",
                self.params.model_type
            );
        };

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.params.learning_rate as f32);
        config.set_max_depth(*max_depth);
        config.set_iterations(*num_boost_round as usize);
        config.set_training_optimization_level(*training_optimization_level);
        config.set_debug(false);
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);

        let mut train_data = DataVec::new();
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let signed = if label > 0.5 { 1.0 } else { -1.0 };
            train_data.push(Data::new_training_data(features, 1.0, signed, None));
        }
        gbdt.fit(&mut train_data);
        self.model = Some(gbdt);

        FitSummary {
            train_loss: log_loss(&self.predict_proba(x), y),
            n_examples: x.nrows(),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        let model = self
            .model
            .as_ref()
            .expect("predict_proba called before fit");
        let mut test_data = DataVec::new();
        for row in x.rows() {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            test_data.push(Data::new_test_data(features, None));
        }
        let predictions = model.predict(&test_data);
        Array1::from_iter(predictions.into_iter().map(|p| clip_prob(p as f64)))
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
