use crate::bounds::FrequencyBounds;
use crate::error::SegmentError;
use serde::{Deserialize, Serialize};

/// One hypnogram entry, already converted to sample offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub onset: usize,
    pub duration: usize,
    pub label: String,
}

impl Annotation {
    pub fn new(onset: usize, duration: usize, label: impl Into<String>) -> Self {
        Self {
            onset,
            duration,
            label: label.into(),
        }
    }
}

/// A labeled stage interval with the spectral range that is usable for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub start_index: usize,
    pub end_index: usize,
    pub min_freq: f64,
    pub max_freq: f64,
    pub label: char,
}

impl Epoch {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index == self.start_index
    }
}

/// Walks one recording's annotations and yields an [`Epoch`] per stage.
///
/// The last annotation is the end-of-recording marker and never produces an epoch.
/// Validation happens up front so the iterator itself cannot fail.
#[derive(Debug, Clone)]
pub struct StageSegmenter<'a> {
    stages: &'a [Annotation],
    bounds: FrequencyBounds,
    sample_rate: f64,
}

impl<'a> StageSegmenter<'a> {
    pub fn new(
        annotations: &'a [Annotation],
        bounds: FrequencyBounds,
        sample_rate: f64,
    ) -> Result<Self, SegmentError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SegmentError::InvalidSampleRate(sample_rate));
        }
        if annotations.len() < 2 {
            return Err(SegmentError::EmptyHypnogram(annotations.len()));
        }
        let stages = &annotations[..annotations.len() - 1];
        for (index, annotation) in stages.iter().enumerate() {
            if annotation.duration == 0 {
                return Err(SegmentError::NonPositiveDuration {
                    index,
                    label: annotation.label.clone(),
                });
            }
            if annotation.label.is_empty() {
                return Err(SegmentError::EmptyLabel { index });
            }
        }
        Ok(Self {
            stages,
            bounds,
            sample_rate,
        })
    }

    /// Number of epochs the segmenter yields.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Fresh iterator over the epochs, in annotation order.
    pub fn epochs(&self) -> Epochs<'a> {
        Epochs {
            stages: self.stages.iter(),
            bounds: self.bounds,
            sample_rate: self.sample_rate,
        }
    }
}

pub struct Epochs<'a> {
    stages: std::slice::Iter<'a, Annotation>,
    bounds: FrequencyBounds,
    sample_rate: f64,
}

impl Iterator for Epochs<'_> {
    type Item = Epoch;

    fn next(&mut self) -> Option<Epoch> {
        let annotation = self.stages.next()?;
        Some(segment_epoch(annotation, self.bounds, self.sample_rate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stages.size_hint()
    }
}

impl ExactSizeIterator for Epochs<'_> {}

fn segment_epoch(annotation: &Annotation, bounds: FrequencyBounds, sample_rate: f64) -> Epoch {
    // coarsest frequency a window of this length can resolve
    let duration_freq = sample_rate / annotation.duration as f64;
    let min_freq = bounds.min_freq.max(duration_freq).min(bounds.max_freq);
    let label = annotation.label.chars().last().unwrap_or('?');
    Epoch {
        start_index: annotation.onset,
        end_index: annotation.onset + annotation.duration,
        min_freq,
        max_freq: bounds.max_freq,
        label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: FrequencyBounds = FrequencyBounds {
        min_freq: 0.5,
        max_freq: 35.0,
    };

    fn synthetic() -> Vec<Annotation> {
        vec![
            Annotation::new(0, 100, "Sleep stage W"),
            Annotation::new(100, 30, "Sleep stage 1"),
            Annotation::new(130, 400, "Sleep stage R"),
            Annotation::new(530, 1, "Sleep stage ?"),
        ]
    }

    #[test]
    fn drops_terminal_marker() {
        let annotations = synthetic();
        let segmenter = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap();
        let epochs: Vec<_> = segmenter.epochs().collect();
        assert_eq!(epochs.len(), 3);
        assert_eq!(
            epochs.iter().map(|e| e.label).collect::<String>(),
            "W1R"
        );
    }

    #[test]
    fn indices_follow_durations() {
        let annotations = synthetic();
        let segmenter = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap();
        for (epoch, annotation) in segmenter.epochs().zip(&annotations) {
            assert_eq!(epoch.start_index, annotation.onset);
            assert_eq!(epoch.len(), annotation.duration);
            assert!(epoch.min_freq <= epoch.max_freq);
            assert!(epoch.min_freq >= BOUNDS.min_freq);
        }
    }

    #[test]
    fn short_epochs_raise_min_freq() {
        let annotations = synthetic();
        let segmenter = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap();
        let epochs: Vec<_> = segmenter.epochs().collect();
        assert!(epochs[1].min_freq >= 100.0 / 30.0);
        assert_eq!(epochs[0].min_freq, 1.0);
        // long epochs keep the recording floor
        assert_eq!(epochs[2].min_freq, 0.5);
        assert_eq!(epochs[2].max_freq, 35.0);
    }

    #[test]
    fn min_freq_does_not_leak_between_epochs() {
        let annotations = vec![
            Annotation::new(0, 10, "Sleep stage 2"),
            Annotation::new(10, 1000, "Sleep stage 3"),
            Annotation::new(1010, 0, "Sleep stage ?"),
        ];
        let segmenter = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap();
        let epochs: Vec<_> = segmenter.epochs().collect();
        assert_eq!(epochs[0].min_freq, 10.0);
        assert_eq!(epochs[1].min_freq, 0.5);
    }

    #[test]
    fn min_freq_monotone_in_duration() {
        let mut last = 0.0;
        for duration in (1..=500).rev() {
            let annotations = vec![
                Annotation::new(0, duration, "Sleep stage 2"),
                Annotation::new(duration, 1, "Sleep stage ?"),
            ];
            let epoch = StageSegmenter::new(&annotations, BOUNDS, 100.0)
                .unwrap()
                .epochs()
                .next()
                .unwrap();
            assert!(epoch.min_freq >= last);
            assert!(epoch.min_freq <= epoch.max_freq);
            last = epoch.min_freq;
        }
    }

    #[test]
    fn iterator_is_restartable() {
        let annotations = synthetic();
        let segmenter = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap();
        let first: Vec<_> = segmenter.epochs().collect();
        let second: Vec<_> = segmenter.epochs().collect();
        assert_eq!(first, second);
        assert_eq!(segmenter.epochs().len(), 3);
    }

    #[test]
    fn rejects_zero_duration() {
        let annotations = vec![
            Annotation::new(0, 0, "Sleep stage W"),
            Annotation::new(0, 1, "Sleep stage ?"),
        ];
        let err = StageSegmenter::new(&annotations, BOUNDS, 100.0).unwrap_err();
        assert!(matches!(err, SegmentError::NonPositiveDuration { index: 0, .. }));
    }

    #[test]
    fn rejects_tracks_without_stages() {
        assert_eq!(
            StageSegmenter::new(&[], BOUNDS, 100.0).unwrap_err(),
            SegmentError::EmptyHypnogram(0)
        );
        let only_marker = vec![Annotation::new(0, 30, "Sleep stage ?")];
        assert_eq!(
            StageSegmenter::new(&only_marker, BOUNDS, 100.0).unwrap_err(),
            SegmentError::EmptyHypnogram(1)
        );
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let annotations = synthetic();
        assert!(StageSegmenter::new(&annotations, BOUNDS, 0.0).is_err());
    }
}
