//! Cross-validated search over sleep-stage classification pipelines.

pub mod config;
pub mod cv;
pub mod engine;
pub mod error;
pub mod space;
pub mod strategy;

pub use config::{read_config, SearchSettings, StrategyKind};
pub use cv::{stratified_split, StratifiedKFold};
pub use engine::{SearchEngine, SearchOutcome, TrialResult, TrialStatus};
pub use error::SearchError;
pub use strategy::{AdaptiveSearch, GridSearch, RandomSearch, SearchStrategy};
