use super::{check_width, model_error, Transform};
use crate::error::PipelineError;
use linfa::prelude::*;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::Array2;

/// Standardize columns to zero mean and unit variance.
#[derive(Default)]
pub struct StandardScaler {
    fitted: Option<(LinearScaler<f64>, usize)>,
}

impl Transform for StandardScaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }
        let dataset = DatasetBase::from(x.clone());
        let scaler = LinearScaler::standard()
            .fit(&dataset)
            .map_err(model_error)?;
        self.fitted = Some((scaler, x.ncols()));
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        let (scaler, width) = self.fitted.as_ref().ok_or(PipelineError::NotFitted)?;
        check_width(*width, x)?;
        Ok(scaler.transform(x.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Axis};

    #[test]
    fn columns_become_standard() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let mut scaler = StandardScaler::default();
        let z = scaler.fit_transform(&x).unwrap();
        let column = z.index_axis(Axis(1), 0);
        let mean0 = column.sum() / 4.0;
        let var0 = column.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!(mean0.abs() < 1e-9);
        assert!((var0 - 1.0).abs() < 1e-9);
        // constant column stays finite
        assert!(z.index_axis(Axis(1), 1).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn transform_before_fit_fails() {
        let scaler = StandardScaler::default();
        assert_eq!(
            scaler.transform(&Array2::zeros((1, 1))).unwrap_err(),
            PipelineError::NotFitted
        );
    }

    #[test]
    fn width_change_is_rejected() {
        let mut scaler = StandardScaler::default();
        scaler.fit(&Array2::ones((3, 2))).unwrap();
        assert_eq!(
            scaler.transform(&Array2::zeros((1, 3))).unwrap_err(),
            PipelineError::FeatureWidth {
                expected: 2,
                got: 3
            }
        );
    }
}
