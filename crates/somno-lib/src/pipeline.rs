use crate::error::PipelineError;
use crate::features::{BandDivisions, BandpassFeatureExtractor};
use crate::models::{
    to_array, Classifier, KNearestNeighbors, Kernel, Pca, RandomForest, SplitCriterion,
    StandardScaler, SupportVectorMachine, Transform, TruncatedSvd,
};
use crate::signal::EpochWindow;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    #[default]
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    None,
    Pca {
        components: usize,
    },
    TruncatedSvd {
        components: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierKind {
    Knn {
        neighbors: usize,
    },
    Svm {
        kernel: Kernel,
        c: f64,
    },
    RandomForest {
        n_estimators: usize,
        criterion: SplitCriterion,
        max_depth: usize,
    },
}

/// One concrete point of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub divisions: BandDivisions,
    #[serde(default)]
    pub normalizer: Normalizer,
    #[serde(default)]
    pub reduction: Reduction,
    pub classifier: ClassifierKind,
}

/// Sizes a configuration is checked against before it is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShape {
    /// Rows in the smallest training fold.
    pub train_rows: usize,
    pub n_channels: usize,
}

impl PipelineConfiguration {
    pub fn n_features(&self, n_channels: usize) -> usize {
        n_channels * self.divisions.n_sub_bands()
    }

    /// Reject sub-parameters that cannot work on data of this shape.
    pub fn validate(&self, shape: &DataShape) -> Result<(), PipelineError> {
        for (name, value) in [
            ("alpha_divs", self.divisions.alpha),
            ("beta_divs", self.divisions.beta),
            ("gamma_divs", self.divisions.gamma),
        ] {
            if value == 0 {
                return Err(PipelineError::ZeroParameter { name });
            }
        }
        let n_features = self.n_features(shape.n_channels);
        let component_limit = match self.reduction {
            Reduction::None => None,
            Reduction::Pca { components } => Some((components, n_features)),
            Reduction::TruncatedSvd { components } => {
                Some((components, n_features.min(shape.train_rows)))
            }
        };
        if let Some((components, limit)) = component_limit {
            check_count("components", components, limit)?;
        }
        match self.classifier {
            ClassifierKind::Knn { neighbors } => {
                check_count("n_neighbors", neighbors, shape.train_rows)?
            }
            ClassifierKind::Svm { kernel, c } => {
                check_positive("svm_c", c)?;
                if let Kernel::Rbf { gamma } = kernel {
                    check_positive("svm_gamma", gamma)?;
                }
            }
            ClassifierKind::RandomForest {
                n_estimators,
                max_depth,
                ..
            } => {
                check_count("n_estimators", n_estimators, usize::MAX)?;
                check_count("max_depth", max_depth, usize::MAX)?;
            }
        }
        Ok(())
    }
}

fn check_count(name: &'static str, value: usize, limit: usize) -> Result<(), PipelineError> {
    if value == 0 {
        return Err(PipelineError::ZeroParameter { name });
    }
    if value > limit {
        return Err(PipelineError::OutOfRange { name, value, limit });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> Result<(), PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidScalar { name, value })
    }
}

/// Maps stage symbols to dense class indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<char>,
}

impl LabelEncoder {
    pub fn fit(labels: &[char]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[char] {
        &self.classes
    }

    pub fn encode(&self, label: char) -> Option<usize> {
        self.classes.binary_search(&label).ok()
    }

    pub fn decode(&self, index: usize) -> Option<char> {
        self.classes.get(index).copied()
    }
}

/// Feature extraction, standardization, optional reduction and a classifier.
pub struct Pipeline {
    extractor: BandpassFeatureExtractor,
    normalizer: StandardScaler,
    reduction: Option<Box<dyn Transform>>,
    classifier: Box<dyn Classifier>,
    encoder: LabelEncoder,
}

impl Pipeline {
    /// Instantiate every stage of `config`. `seed` drives the forest's bootstrap.
    pub fn build(config: &PipelineConfiguration, seed: u64) -> Self {
        let normalizer = match config.normalizer {
            Normalizer::Standard => StandardScaler::default(),
        };
        let reduction: Option<Box<dyn Transform>> = match config.reduction {
            Reduction::None => None,
            Reduction::Pca { components } => Some(Box::new(Pca::new(components))),
            Reduction::TruncatedSvd { components } => {
                Some(Box::new(TruncatedSvd::new(components)))
            }
        };
        let classifier: Box<dyn Classifier> = match config.classifier {
            ClassifierKind::Knn { neighbors } => Box::new(KNearestNeighbors::new(neighbors)),
            ClassifierKind::Svm { kernel, c } => Box::new(SupportVectorMachine::new(kernel, c)),
            ClassifierKind::RandomForest {
                n_estimators,
                criterion,
                max_depth,
            } => Box::new(RandomForest::new(n_estimators, criterion, max_depth, seed)),
        };
        Self {
            extractor: BandpassFeatureExtractor::new(config.divisions),
            normalizer,
            reduction,
            classifier,
            encoder: LabelEncoder::default(),
        }
    }

    pub fn extractor(&self) -> &BandpassFeatureExtractor {
        &self.extractor
    }

    pub fn classes(&self) -> &[char] {
        self.encoder.classes()
    }

    pub fn fit(&mut self, windows: &[EpochWindow], labels: &[char]) -> Result<(), PipelineError> {
        let features = self.extractor.transform(windows)?;
        self.fit_features(&features, labels)
    }

    /// Fit every stage after feature extraction on precomputed band features.
    pub fn fit_features(
        &mut self,
        features: &DMatrix<f64>,
        labels: &[char],
    ) -> Result<(), PipelineError> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::LabelCount {
                expected: features.nrows(),
                got: labels.len(),
            });
        }
        self.encoder = LabelEncoder::fit(labels);
        let y: Vec<usize> = labels
            .iter()
            .filter_map(|label| self.encoder.encode(*label))
            .collect();
        let mut x = self.normalizer.fit_transform(&to_array(features))?;
        if let Some(reduction) = self.reduction.as_mut() {
            x = reduction.fit_transform(&x)?;
        }
        self.classifier.fit(&x, &y)
    }

    pub fn predict(&self, windows: &[EpochWindow]) -> Result<Vec<char>, PipelineError> {
        let features = self.extractor.transform(windows)?;
        self.predict_features(&features)
    }

    pub fn predict_features(&self, features: &DMatrix<f64>) -> Result<Vec<char>, PipelineError> {
        let mut x = self.normalizer.transform(&to_array(features))?;
        if let Some(reduction) = self.reduction.as_ref() {
            x = reduction.transform(&x)?;
        }
        let predicted = self.classifier.predict(&x)?;
        predicted
            .into_iter()
            .map(|index| self.encoder.decode(index).ok_or(PipelineError::NotFitted))
            .collect()
    }

    /// Fraction of windows whose predicted stage matches `labels`.
    pub fn score(&self, windows: &[EpochWindow], labels: &[char]) -> Result<f64, PipelineError> {
        let predicted = self.predict(windows)?;
        Ok(accuracy(&predicted, labels))
    }
}

pub fn accuracy(predicted: &[char], expected: &[char]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(a, b)| a == b)
        .count();
    correct as f64 / expected.len() as f64
}
