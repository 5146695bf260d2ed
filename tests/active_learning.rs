use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ratio_estimation::acquisition::Acquisition;
use ratio_estimation::config::{LearnerConfig, ModelConfig, ModelType};
use ratio_estimation::dataset::{DatasetOptions, RatioDataset};
use ratio_estimation::grid::{ParamGrid, ParamIterator};
use ratio_estimation::learner::ActiveLearner;
use ratio_estimation::model::SinglyParameterizedRatioModel;
use ratio_estimation::models::factory::build_model;
use ratio_estimation::simulate::{GaussianSimulator, Simulator, SimulatorFactory, TripleMixture};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gaussian_factory() -> Box<dyn SimulatorFactory> {
    Box::new(|theta: &Array1<f64>| Box::new(GaussianSimulator::new(theta)) as Box<dyn Simulator>)
}

fn ensemble_model(theta_0: f64, seed: u64) -> SinglyParameterizedRatioModel {
    let params = ModelConfig::new(
        0.3,
        ModelType::Ensemble {
            n_members: 4,
            max_depth: 3,
            num_boost_round: 10,
            seed,
        },
    );
    SinglyParameterizedRatioModel::new(Array1::from(vec![theta_0]), build_model(params))
}

fn learner(acquisition: Acquisition, validation_mode: bool) -> ActiveLearner {
    let grid = ParamGrid::new(&[(-1.0, 1.0)], 9).expect("valid grid");
    let initial = ParamIterator::new(vec![Array1::from(vec![-1.0]), Array1::from(vec![1.0])]);
    let config = LearnerConfig {
        n_samples_per_theta: 50,
        acquisition,
        mc_samples: 8,
        validation_mode,
        seed: Some(42),
        ..Default::default()
    };
    ActiveLearner::new(
        gaussian_factory(),
        Array1::from(vec![0.0]),
        &initial,
        grid,
        ensemble_model(0.0, 9),
        config,
        None,
    )
    .expect("learner construction")
}

#[test]
fn entropy_guided_run_grows_dataset_and_mask() {
    init_logging();
    let mut al = learner(Acquisition::Entropy, false);
    let n0 = al.dataset().len();
    al.fit(3).expect("three acquisition steps");

    assert_eq!(al.dataset().len(), n0 + 3 * 50);
    assert_eq!(al.trialed_mask().iter().filter(|&&t| t).count(), 5);
    assert_eq!(al.trialed_thetas().nrows(), 5);
    assert_eq!(al.remaining_thetas().nrows(), 4);
    assert_eq!(al.train_history().len(), 3);
    assert_eq!(al.acquisition_history().len(), 3);
}

#[test]
fn guided_selection_stays_off_trialed_points() {
    init_logging();
    let mut al = learner(Acquisition::Std, false);
    let mut chosen = std::collections::HashSet::new();
    // Two points were trialed at construction; indices 0 and 8.
    chosen.insert(0usize);
    chosen.insert(8usize);
    for _ in 0..5 {
        let idx = al.step().expect("step");
        assert!(chosen.insert(idx), "index {} selected twice", idx);
    }
}

#[test]
fn random_policy_records_no_acquisition_history() {
    init_logging();
    let mut al = learner(Acquisition::Random, false);
    al.fit(2).expect("two random steps");
    assert_eq!(al.train_history().len(), 2);
    assert!(al.acquisition_history().is_empty());
}

#[test]
fn validation_mode_records_full_grid_utilities() {
    init_logging();
    let mut al = learner(Acquisition::Variance, true);
    al.step().expect("one guided step");
    let record = &al.acquisition_history()[0];
    let validation = record.validation.as_ref().expect("validation utilities");
    // One utility per grid point; predictions cover the whole grid too.
    assert_eq!(validation.values.len(), 9);
    assert_eq!(record.predicted.values.len(), 9);
    assert_eq!(record.training.values.len(), 2);
}

#[test]
fn mixture_run_with_test_dataset_tracks_error() {
    init_logging();
    let factory: Box<dyn SimulatorFactory> = Box::new(TripleMixture::factory());
    let mut rng = StdRng::seed_from_u64(5);
    let test = RatioDataset::from_simulator(
        factory.as_ref(),
        &Array1::from(vec![0.05]),
        &ParamIterator::single(Array1::from(vec![0.5])),
        60,
        DatasetOptions::with_log_probs(),
        &mut rng,
    )
    .expect("test dataset");

    let grid = ParamGrid::new(&[(0.0, 1.0)], 6).expect("valid grid");
    let initial = ParamIterator::new(vec![Array1::from(vec![0.0]), Array1::from(vec![1.0])]);
    let config = LearnerConfig {
        n_samples_per_theta: 60,
        acquisition: Acquisition::Entropy,
        mc_samples: 8,
        seed: Some(3),
        ..Default::default()
    };
    let mut al = ActiveLearner::new(
        Box::new(TripleMixture::factory()),
        Array1::from(vec![0.05]),
        &initial,
        grid,
        ensemble_model(0.05, 17),
        config,
        Some(test),
    )
    .expect("learner construction");

    al.fit(2).expect("two steps");
    assert_eq!(al.test_history().len(), 2);
    for record in al.test_history() {
        assert!(record.mse.is_finite());
        assert!(record.mse >= 0.0);
    }
}

#[test]
fn non_bayesian_classifier_fails_guided_selection() {
    init_logging();
    let grid = ParamGrid::new(&[(-1.0, 1.0)], 5).expect("valid grid");
    let initial = ParamIterator::single(Array1::from(vec![-1.0]));
    let params = ModelConfig::default();
    let model =
        SinglyParameterizedRatioModel::new(Array1::from(vec![0.0]), build_model(params));
    let config = LearnerConfig {
        n_samples_per_theta: 40,
        acquisition: Acquisition::Entropy,
        mc_samples: 4,
        seed: Some(1),
        ..Default::default()
    };
    let mut al = ActiveLearner::new(
        gaussian_factory(),
        Array1::from(vec![0.0]),
        &initial,
        grid,
        model,
        config,
        None,
    )
    .expect("construction succeeds; the capability is only probed on step");
    assert!(al.step().is_err());
}
