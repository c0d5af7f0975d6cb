use super::{check_labels, check_width, model_error, n_classes, Classifier};
use crate::error::PipelineError;
use linfa_nn::{distance::L2Dist, CommonNearestNeighbour, NearestNeighbour};
use ndarray::Array2;

/// Majority vote among the `k` nearest training rows (Euclidean, k-d tree).
///
/// Ties go to the class whose closest member is nearest.
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    k: usize,
    train: Option<(Array2<f64>, Vec<usize>)>,
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self { k, train: None }
    }
}

impl Classifier for KNearestNeighbors {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), PipelineError> {
        check_labels(x, y)?;
        if self.k == 0 {
            return Err(PipelineError::ZeroParameter { name: "n_neighbors" });
        }
        if self.k > x.nrows() {
            return Err(PipelineError::OutOfRange {
                name: "n_neighbors",
                value: self.k,
                limit: x.nrows(),
            });
        }
        self.train = Some((x.clone(), y.to_vec()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, PipelineError> {
        let (train, labels) = self.train.as_ref().ok_or(PipelineError::NotFitted)?;
        check_width(train.ncols(), x)?;
        // the index borrows the training rows, so it lives only for this call
        let index = CommonNearestNeighbour::KdTree
            .from_batch(train, L2Dist)
            .map_err(model_error)?;
        let mut votes = vec![0usize; n_classes(labels)];
        let mut out = Vec::with_capacity(x.nrows());
        for row in x.rows() {
            let nearest = index.k_nearest(row, self.k).map_err(model_error)?;
            votes.iter_mut().for_each(|v| *v = 0);
            for (_, idx) in &nearest {
                votes[labels[*idx]] += 1;
            }
            let top = votes.iter().copied().max().unwrap_or(0);
            let winner = nearest
                .iter()
                .map(|(_, idx)| labels[*idx])
                .find(|label| votes[*label] == top)
                .unwrap_or(0);
            out.push(winner);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1]
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn separates_clusters() {
        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(3);
        knn.fit(&x, &y).unwrap();
        let query = array![[0.2, 0.2], [4.8, 4.9]];
        assert_eq!(knn.predict(&query).unwrap(), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_training_set_is_rejected() {
        let (x, y) = two_clusters();
        let err = KNearestNeighbors::new(7).fit(&x, &y).unwrap_err();
        assert_eq!(
            err,
            PipelineError::OutOfRange {
                name: "n_neighbors",
                value: 7,
                limit: 6
            }
        );
    }

    #[test]
    fn tie_goes_to_nearest_class() {
        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(6);
        knn.fit(&x, &y).unwrap();
        let query = array![[4.0, 4.0]];
        assert_eq!(knn.predict(&query).unwrap(), vec![1]);
    }
}
