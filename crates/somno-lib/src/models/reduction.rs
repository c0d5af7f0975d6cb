use super::{check_width, model_error, Transform};
use crate::error::PipelineError;
use linfa::prelude::*;
use linfa_reduction::Pca as PcaModel;
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

fn check_components(components: usize, limit: usize) -> Result<(), PipelineError> {
    if components == 0 {
        return Err(PipelineError::ZeroParameter { name: "components" });
    }
    if components > limit {
        return Err(PipelineError::OutOfRange {
            name: "components",
            value: components,
            limit,
        });
    }
    Ok(())
}

/// Principal component projection of centred data.
pub struct Pca {
    components: usize,
    fitted: Option<(PcaModel<f64>, usize)>,
}

impl Pca {
    pub fn new(components: usize) -> Self {
        Self {
            components,
            fitted: None,
        }
    }
}

impl Transform for Pca {
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), PipelineError> {
        if x.nrows() < 2 {
            return Err(PipelineError::EmptyTrainingSet);
        }
        check_components(self.components, x.ncols())?;
        let dataset = DatasetBase::from(x.clone());
        let model = PcaModel::params(self.components)
            .fit(&dataset)
            .map_err(model_error)?;
        self.fitted = Some((model, x.ncols()));
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        let (model, width) = self.fitted.as_ref().ok_or(PipelineError::NotFitted)?;
        check_width(*width, x)?;
        let embedded: Array2<f64> = model.predict(x);
        Ok(embedded)
    }
}

/// Projection onto the leading right singular vectors, without centring.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    components: usize,
    projection: Option<Array2<f64>>,
}

impl TruncatedSvd {
    pub fn new(components: usize) -> Self {
        Self {
            components,
            projection: None,
        }
    }
}

impl Transform for TruncatedSvd {
    fn fit(&mut self, x: &Array2<f64>) -> Result<(), PipelineError> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }
        check_components(self.components, x.nrows().min(x.ncols()))?;
        let matrix = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[[i, j]]);
        let svd = matrix.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| PipelineError::Decomposition("SVD returned no right vectors".into()))?;
        self.projection = Some(leading_rows(&v_t, &svd.singular_values, self.components));
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        let projection = self.projection.as_ref().ok_or(PipelineError::NotFitted)?;
        check_width(projection.nrows(), x)?;
        Ok(x.dot(projection))
    }
}

// columns of the result are the rows of `v_t` with the largest singular values
fn leading_rows(v_t: &DMatrix<f64>, singular: &DVector<f64>, k: usize) -> Array2<f64> {
    let mut order: Vec<usize> = (0..singular.len()).collect();
    order.sort_by(|&a, &b| singular[b].total_cmp(&singular[a]));
    let order = &order[..k.min(order.len())];
    Array2::from_shape_fn((v_t.ncols(), order.len()), |(feature, dst)| {
        v_t[(order[dst], feature)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_cloud() -> Array2<f64> {
        // points along (1, 1) with a little orthogonal noise
        Array2::from_shape_fn((20, 3), |(i, j)| {
            let t = i as f64 - 10.0;
            let noise = if i % 2 == 0 { 0.05 } else { -0.05 };
            match j {
                0 => t + noise,
                1 => t - noise,
                _ => 1.0,
            }
        })
    }

    #[test]
    fn pca_finds_dominant_direction() {
        let x = line_cloud();
        let mut pca = Pca::new(1);
        let z = pca.fit_transform(&x).unwrap();
        assert_eq!(z.ncols(), 1);
        let spread = z.iter().map(|v| v * v).sum::<f64>();
        // nearly all variance survives in one component
        let total: f64 = (0..20).map(|i| 2.0 * (i as f64 - 9.5).powi(2)).sum();
        assert!(spread / total > 0.95);
    }

    #[test]
    fn svd_reduces_width() {
        let x = line_cloud();
        let mut svd = TruncatedSvd::new(2);
        let z = svd.fit_transform(&x).unwrap();
        assert_eq!(z.dim(), (20, 2));
    }

    #[test]
    fn too_many_components_is_rejected() {
        let x = line_cloud();
        assert!(matches!(
            Pca::new(4).fit(&x),
            Err(PipelineError::OutOfRange { .. })
        ));
        assert!(matches!(
            TruncatedSvd::new(0).fit(&x),
            Err(PipelineError::ZeroParameter { .. })
        ));
    }
}
