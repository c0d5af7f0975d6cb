use crate::error::SearchError;
use crate::strategy::{AdaptiveSearch, GridSearch, RandomSearch, SearchStrategy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Random,
    Grid,
    Adaptive,
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(StrategyKind::Random),
            "grid" => Ok(StrategyKind::Grid),
            "adaptive" => Ok(StrategyKind::Adaptive),
            other => anyhow::bail!("unknown search strategy {other:?}"),
        }
    }
}

/// Search settings as read from a TOML file. Missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub strategy: StrategyKind,
    pub trials: usize,
    pub folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
    /// PSG channel indices fed to the feature extractor.
    pub channels: Vec<usize>,
    pub grid_levels: usize,
    pub warmup: usize,
    pub explore: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Random,
            trials: 50,
            folds: 5,
            test_fraction: 0.2,
            seed: 0,
            channels: vec![0],
            grid_levels: 3,
            warmup: 10,
            explore: 0.2,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<(), SearchError> {
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.explore) {
            return Err(SearchError::InvalidExplore(self.explore));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(SearchError::InvalidFraction(self.test_fraction));
        }
        Ok(())
    }

    pub fn build_strategy(&self) -> Result<Box<dyn SearchStrategy>, SearchError> {
        self.validate()?;
        Ok(match self.strategy {
            StrategyKind::Random => Box::new(RandomSearch::new(self.seed)),
            StrategyKind::Grid => Box::new(GridSearch::new(self.grid_levels)),
            StrategyKind::Adaptive => {
                Box::new(AdaptiveSearch::new(self.warmup, self.explore, self.seed))
            }
        })
    }
}

pub fn read_config(path: &Path) -> Result<SearchSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read search config {}", path.display()))?;
    let settings: SearchSettings = toml::from_str(&contents)
        .with_context(|| format!("parsing search config {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid search config {}", path.display()))?;
    Ok(settings)
}
