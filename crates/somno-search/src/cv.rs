use crate::error::SearchError;
use log::warn;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K folds that keep each class's share of samples within one of even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub k: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self {
            k: 5,
            shuffle: true,
            seed: 0,
        }
    }
}

fn group_by_class(labels: &[char]) -> BTreeMap<char, Vec<usize>> {
    let mut classes: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        classes.entry(*label).or_default().push(idx);
    }
    classes
}

impl StratifiedKFold {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            shuffle: true,
            seed,
        }
    }

    pub fn split(&self, labels: &[char]) -> Result<Vec<Fold>, SearchError> {
        if self.k < 2 {
            return Err(SearchError::TooFewFolds(self.k));
        }
        if labels.len() < self.k {
            return Err(SearchError::NotEnoughSamples {
                samples: labels.len(),
                folds: self.k,
            });
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        // the dealing position carries over between classes so fold sizes stay even
        let mut next = 0usize;
        for (label, mut members) in group_by_class(labels) {
            if members.len() < self.k {
                warn!(
                    "class {:?} has {} samples, fewer than {} folds",
                    label,
                    members.len(),
                    self.k
                );
            }
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for idx in members {
                assignment[idx] = next % self.k;
                next += 1;
            }
        }
        Ok((0..self.k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|idx| assignment[*idx] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

/// Stratified hold-out split returning `(train, test)` indices in ascending order.
pub fn stratified_split(
    labels: &[char],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), SearchError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SearchError::InvalidFraction(test_fraction));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for (_, mut members) in group_by_class(labels) {
        members.shuffle(&mut rng);
        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        let (held_out, kept) = members.split_at(n_test.min(members.len()));
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }
    if train.is_empty() {
        return Err(SearchError::EmptySplit("train"));
    }
    if test.is_empty() {
        return Err(SearchError::EmptySplit("test"));
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
