use crate::cv::{Fold, StratifiedKFold};
use crate::error::SearchError;
use crate::space::{decode, ParamSet, SearchSpace};
use crate::strategy::SearchStrategy;
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use somno_lib::features::{BandDivisions, BandpassFeatureExtractor};
use somno_lib::pipeline::{accuracy, DataShape, Pipeline, PipelineConfiguration};
use somno_lib::{EpochWindow, PipelineError};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub params: ParamSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PipelineConfiguration>,
    #[serde(default)]
    pub fold_accuracy: Vec<f64>,
    /// `1 - mean(fold accuracy)`; failed trials score the worst value, 1.0.
    pub error: f64,
    #[serde(flatten)]
    pub status: TrialStatus,
}

impl TrialResult {
    pub fn is_completed(&self) -> bool {
        self.status == TrialStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: TrialResult,
    pub history: Vec<TrialResult>,
}

/// Lowest error in `history`; the earliest trial wins a tie.
pub fn best_trial(history: &[TrialResult]) -> Option<&TrialResult> {
    history.iter().fold(None, |best, trial| match best {
        Some(best) if best.error <= trial.error => Some(best),
        _ => Some(trial),
    })
}

/// Scores pipeline configurations by stratified k-fold accuracy on a fixed set of windows.
///
/// Band features depend only on the divisions, so they are computed once per
/// divisions value and shared by every trial that reuses it.
pub struct SearchEngine<'a> {
    space: SearchSpace,
    windows: &'a [EpochWindow],
    labels: &'a [char],
    folds: Vec<Fold>,
    seed: u64,
    cache: HashMap<BandDivisions, Arc<DMatrix<f64>>>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        space: SearchSpace,
        windows: &'a [EpochWindow],
        labels: &'a [char],
        cv: StratifiedKFold,
    ) -> Result<Self, SearchError> {
        if windows.len() != labels.len() {
            return Err(SearchError::LabelCount {
                expected: windows.len(),
                got: labels.len(),
            });
        }
        let folds = cv.split(labels)?;
        Ok(Self {
            space,
            windows,
            labels,
            folds,
            seed: cv.seed,
            cache: HashMap::new(),
        })
    }

    /// Engine over the sleep-stage space sized for this data.
    pub fn sleep_stage(
        windows: &'a [EpochWindow],
        labels: &'a [char],
        cv: StratifiedKFold,
    ) -> Result<Self, SearchError> {
        let n_channels = windows.first().map(EpochWindow::n_channels).unwrap_or(0);
        let fold_size = labels.len() / cv.k.max(1);
        let min_features = n_channels * BandDivisions::default().n_sub_bands();
        Self::new(
            SearchSpace::sleep_stage(fold_size, min_features),
            windows,
            labels,
            cv,
        )
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    pub fn data_shape(&self) -> DataShape {
        DataShape {
            train_rows: self.folds.iter().map(|f| f.train.len()).min().unwrap_or(0),
            n_channels: self.windows.first().map(EpochWindow::n_channels).unwrap_or(0),
        }
    }

    /// Evaluate exactly `budget` proposals from `strategy`.
    pub fn run(
        &mut self,
        strategy: &mut dyn SearchStrategy,
        budget: usize,
    ) -> Result<SearchOutcome, SearchError> {
        if budget == 0 {
            return Err(SearchError::EmptyBudget);
        }
        info!(
            "{} search: {} trials, {} folds, {} windows",
            strategy.name(),
            budget,
            self.folds.len(),
            self.windows.len()
        );
        let mut history: Vec<TrialResult> = Vec::with_capacity(budget);
        for trial in 0..budget {
            let params = strategy.propose(&self.space, &history);
            let result = self.evaluate(trial, params);
            match &result.status {
                TrialStatus::Completed => {
                    info!("trial {}/{}: error {:.4}", trial + 1, budget, result.error)
                }
                TrialStatus::Failed { reason } => {
                    warn!("trial {}/{} failed: {}", trial + 1, budget, reason)
                }
            }
            history.push(result);
        }
        let best = best_trial(&history)
            .cloned()
            .ok_or(SearchError::EmptyBudget)?;
        Ok(SearchOutcome { best, history })
    }

    /// Cross-validate one parameter set. Failures are recorded, never raised.
    pub fn evaluate(&mut self, trial: usize, params: ParamSet) -> TrialResult {
        match self.cross_validate(&params) {
            Ok((config, fold_accuracy)) => {
                let mean = fold_accuracy.iter().sum::<f64>() / fold_accuracy.len().max(1) as f64;
                TrialResult {
                    trial,
                    params,
                    config: Some(config),
                    fold_accuracy,
                    error: 1.0 - mean,
                    status: TrialStatus::Completed,
                }
            }
            Err(err) => TrialResult {
                trial,
                config: decode(&params).ok(),
                params,
                fold_accuracy: Vec::new(),
                error: 1.0,
                status: TrialStatus::Failed {
                    reason: err.to_string(),
                },
            },
        }
    }

    fn cross_validate(
        &mut self,
        params: &ParamSet,
    ) -> Result<(PipelineConfiguration, Vec<f64>), SearchError> {
        let config = decode(params)?;
        config.validate(&self.data_shape())?;
        let features = self.features(config.divisions)?;
        let labels = self.labels;
        let seed = self.seed;
        let scores = self
            .folds
            .par_iter()
            .enumerate()
            .map(|(idx, fold)| {
                let pick = |rows: &[usize]| -> Vec<char> { rows.iter().map(|i| labels[*i]).collect() };
                let mut pipeline = Pipeline::build(&config, seed.wrapping_add(idx as u64));
                pipeline.fit_features(&features.select_rows(fold.train.iter()), &pick(&fold.train))?;
                let predicted = pipeline.predict_features(&features.select_rows(fold.test.iter()))?;
                Ok(accuracy(&predicted, &pick(&fold.test)))
            })
            .collect::<Result<Vec<f64>, PipelineError>>()?;
        Ok((config, scores))
    }

    fn features(&mut self, divisions: BandDivisions) -> Result<Arc<DMatrix<f64>>, PipelineError> {
        if let Some(cached) = self.cache.get(&divisions) {
            return Ok(Arc::clone(cached));
        }
        let extractor = BandpassFeatureExtractor::new(divisions);
        let width = extractor.n_features(self.data_shape().n_channels);
        let rows = self
            .windows
            .par_iter()
            .map(|window| extractor.extract(window))
            .collect::<Result<Vec<Vec<f64>>, PipelineError>>()?;
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(PipelineError::FeatureWidth {
                expected: width,
                got: row.len(),
            });
        }
        let matrix = Arc::new(DMatrix::from_fn(rows.len(), width, |r, c| rows[r][c]));
        debug!(
            "band features for {:?}: {} x {}",
            divisions,
            matrix.nrows(),
            matrix.ncols()
        );
        self.cache.insert(divisions, Arc::clone(&matrix));
        Ok(matrix)
    }
}
