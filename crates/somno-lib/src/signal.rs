use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }

    /// Samples in `start..end`, clamped to the series length.
    pub fn window(&self, start: usize, end: usize) -> &[f64] {
        let end = end.min(self.data.len());
        let start = start.min(end);
        &self.data[start..end]
    }
}

/// Multi-channel signal slice for one epoch together with its usable spectral range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochWindow {
    pub sample_rate: f64,
    pub channels: Vec<Vec<f64>>,
    pub min_freq: f64,
    pub max_freq: f64,
}

impl EpochWindow {
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }
}
