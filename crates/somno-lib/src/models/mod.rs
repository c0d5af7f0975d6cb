pub mod forest;
pub mod knn;
pub mod reduction;
pub mod scaler;
pub mod svm;

use crate::error::PipelineError;
use nalgebra::DMatrix;
use ndarray::Array2;
use std::fmt::Display;

pub use forest::{RandomForest, SplitCriterion};
pub use knn::KNearestNeighbors;
pub use reduction::{Pca, TruncatedSvd};
pub use scaler::StandardScaler;
pub use svm::{Kernel, SupportVectorMachine};

/// Unsupervised matrix-to-matrix step (rows are samples).
pub trait Transform: Send {
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), PipelineError>;
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError>;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Supervised step predicting class indices `0..n_classes`.
pub trait Classifier: Send {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), PipelineError>;
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, PipelineError>;
}

/// Copy a feature matrix into the row-major layout the model crates expect.
pub fn to_array(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

pub(crate) fn model_error(err: impl Display) -> PipelineError {
    PipelineError::Model(err.to_string())
}

pub(crate) fn n_classes(y: &[usize]) -> usize {
    y.iter().copied().max().map_or(0, |m| m + 1)
}

pub(crate) fn check_labels(x: &Array2<f64>, y: &[usize]) -> Result<(), PipelineError> {
    if x.nrows() == 0 {
        return Err(PipelineError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::LabelCount {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<(), PipelineError> {
    if x.ncols() != expected {
        return Err(PipelineError::FeatureWidth {
            expected,
            got: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_keeps_row_order() {
        let matrix = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = to_array(&matrix);
        assert_eq!(array.dim(), (2, 3));
        assert_eq!(array[[0, 2]], 3.0);
        assert_eq!(array[[1, 0]], 4.0);
    }
}
