use super::{check_labels, check_width, model_error, n_classes, Classifier};
use crate::error::PipelineError;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
}

/// One-vs-rest C-SVC; the class with the highest Platt probability wins.
pub struct SupportVectorMachine {
    kernel: Kernel,
    c: f64,
    models: Option<(Vec<Svm<f64, Pr>>, usize)>,
}

impl SupportVectorMachine {
    pub fn new(kernel: Kernel, c: f64) -> Self {
        Self {
            kernel,
            c,
            models: None,
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(PipelineError::InvalidScalar {
                name: "svm_c",
                value: self.c,
            });
        }
        if let Kernel::Rbf { gamma } = self.kernel {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(PipelineError::InvalidScalar {
                    name: "svm_gamma",
                    value: gamma,
                });
            }
        }
        Ok(())
    }

    fn fit_class(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        class: usize,
    ) -> Result<Svm<f64, Pr>, PipelineError> {
        let targets: Array1<bool> = y.iter().map(|label| *label == class).collect();
        let dataset = Dataset::new(x.clone(), targets);
        let params = Svm::<f64, Pr>::params().pos_neg_weights(self.c, self.c);
        let params = match self.kernel {
            Kernel::Linear => params.linear_kernel(),
            // exp(-gamma * d^2) is exp(-d^2 / eps)
            Kernel::Rbf { gamma } => params.gaussian_kernel(1.0 / gamma),
        };
        params.fit(&dataset).map_err(model_error)
    }
}

impl Classifier for SupportVectorMachine {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), PipelineError> {
        check_labels(x, y)?;
        self.validate()?;
        let classes = n_classes(y);
        // a single class needs no separating plane
        let models = if classes < 2 {
            Vec::new()
        } else {
            (0..classes)
                .map(|class| self.fit_class(x, y, class))
                .collect::<Result<Vec<_>, _>>()?
        };
        self.models = Some((models, x.ncols()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, PipelineError> {
        let (models, width) = self.models.as_ref().ok_or(PipelineError::NotFitted)?;
        check_width(*width, x)?;
        let scores: Vec<Array1<Pr>> = models.iter().map(|model| model.predict(x)).collect();
        Ok((0..x.nrows())
            .map(|row| argmax(scores.iter().map(|class| *class[row])))
            .collect())
    }
}

fn argmax(scores: impl Iterator<Item = f32>) -> usize {
    scores
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (idx, score)| {
            if score > best.1 {
                (idx, score)
            } else {
                best
            }
        })
        .0
}
