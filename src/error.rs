use std::error::Error as StdError;
use std::fmt;

/// Construction-time failures for datasets, grids, and learner configuration.
#[derive(Debug)]
pub enum Error {
    /// Per-example arrays passed to a dataset constructor disagree in length.
    LengthMismatch { expected: usize, got: usize },
    /// An acquisition-function name that is not in the registry.
    UnknownAcquisition(String),
    /// A test dataset was supplied for ideal-classifier evaluation without
    /// the log probabilities required to compute the ideal probabilities.
    MissingLogProbs,
    /// The acquisition policy requires a Bayesian classifier but the model
    /// wraps a plain one.
    NotBayesian(String),
    /// A parameter grid with no points, or empty bounds.
    EmptyGrid,
    /// Arrays whose shapes cannot be combined as requested.
    ShapeMismatch(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LengthMismatch { expected, got } => write!(
                f,
                "per-example arrays have different lengths: expected {}, got {}",
                expected, got
            ),
            Error::UnknownAcquisition(name) => write!(
                f,
                "unknown acquisition function '{}'; expected one of: random, entropy, variance, std, bald",
                name
            ),
            Error::MissingLogProbs => write!(
                f,
                "test dataset must carry log probabilities; build it with DatasetOptions::with_log_probs"
            ),
            Error::NotBayesian(name) => write!(
                f,
                "classifier '{}' does not support predictive sampling; \
                 acquisition-guided selection needs a Bayesian classifier",
                name
            ),
            Error::EmptyGrid => write!(f, "parameter grid has no points"),
            Error::ShapeMismatch(msg) => write!(f, "shape mismatch: {}", msg),
        }
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;
