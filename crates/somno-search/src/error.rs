use somno_lib::PipelineError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    #[error("parameter {0} is required but was not set")]
    MissingParameter(String),
    #[error("parameter {name} has the wrong type")]
    WrongType { name: String },
    #[error("parameter {name} has no choice {value:?}")]
    UnknownChoice { name: String, value: String },
    #[error("need at least 2 folds, got {0}")]
    TooFewFolds(usize),
    #[error("{samples} samples cannot be split into {folds} folds")]
    NotEnoughSamples { samples: usize, folds: usize },
    #[error("test fraction must lie strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),
    #[error("split left the {0} side empty")]
    EmptySplit(&'static str),
    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },
    #[error("explore probability must lie in [0, 1], got {0}")]
    InvalidExplore(f64),
    #[error("trial budget must be at least 1")]
    EmptyBudget,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
