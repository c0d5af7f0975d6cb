use super::{check_labels, check_width, model_error, n_classes, Classifier};
use crate::error::PipelineError;
use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

impl From<SplitCriterion> for SplitQuality {
    fn from(criterion: SplitCriterion) -> Self {
        match criterion {
            SplitCriterion::Gini => SplitQuality::Gini,
            SplitCriterion::Entropy => SplitQuality::Entropy,
        }
    }
}

/// Bagged decision trees voting by majority; each tree sees a bootstrap sample.
pub struct RandomForest {
    n_estimators: usize,
    criterion: SplitCriterion,
    max_depth: usize,
    seed: u64,
    trees: Vec<DecisionTree<f64, usize>>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn new(
        n_estimators: usize,
        criterion: SplitCriterion,
        max_depth: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_estimators,
            criterion,
            max_depth,
            seed,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), PipelineError> {
        check_labels(x, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::ZeroParameter {
                name: "n_estimators",
            });
        }
        if self.max_depth == 0 {
            return Err(PipelineError::ZeroParameter { name: "max_depth" });
        }
        let n = x.nrows();
        let targets = Array1::from(y.to_vec());
        let params = DecisionTree::<f64, usize>::params()
            .split_quality(self.criterion.into())
            .max_depth(Some(self.max_depth));
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees.clear();
        for _ in 0..self.n_estimators {
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let sample = Dataset::new(x.select(Axis(0), &rows), targets.select(Axis(0), &rows));
            self.trees.push(params.fit(&sample).map_err(model_error)?);
        }
        self.n_classes = n_classes(y);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, PipelineError> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted);
        }
        check_width(self.n_features, x)?;
        let mut votes = vec![vec![0usize; self.n_classes]; x.nrows()];
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(x);
            for (row, class) in predicted.iter().enumerate() {
                votes[row][*class] += 1;
            }
        }
        Ok(votes
            .iter()
            .map(|counts| {
                counts
                    .iter()
                    .enumerate()
                    .max_by_key(|(class, count)| (**count, std::cmp::Reverse(*class)))
                    .map_or(0, |(class, _)| class)
            })
            .collect())
    }
}
