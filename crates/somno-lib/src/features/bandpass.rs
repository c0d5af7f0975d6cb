use super::bands::{BandDivisions, SubBand};
use crate::error::PipelineError;
use crate::signal::EpochWindow;
use nalgebra::DMatrix;
use realfft::RealFftPlanner;

/// Per-channel, per-sub-band log power restricted to an epoch's usable range.
///
/// A sub-band that overlaps `[min_freq, max_freq]` only partly contributes the
/// overlapping bins. A sub-band entirely outside the range is reported as 0 so
/// every window produces `channels * n_sub_bands` features.
#[derive(Debug, Clone)]
pub struct BandpassFeatureExtractor {
    divisions: BandDivisions,
    sub_bands: Vec<SubBand>,
}

impl BandpassFeatureExtractor {
    pub fn new(divisions: BandDivisions) -> Self {
        Self {
            divisions,
            sub_bands: divisions.sub_bands(),
        }
    }

    pub fn divisions(&self) -> BandDivisions {
        self.divisions
    }

    pub fn sub_bands(&self) -> &[SubBand] {
        &self.sub_bands
    }

    pub fn n_features(&self, n_channels: usize) -> usize {
        n_channels * self.sub_bands.len()
    }

    /// Column names, channel-major.
    pub fn feature_names(&self, n_channels: usize) -> Vec<String> {
        (0..n_channels)
            .flat_map(|ch| {
                self.sub_bands
                    .iter()
                    .map(move |band| format!("ch{}_{}", ch, band.name()))
            })
            .collect()
    }

    pub fn extract(&self, window: &EpochWindow) -> Result<Vec<f64>, PipelineError> {
        let mut planner = RealFftPlanner::<f64>::new();
        self.extract_with(&mut planner, window)
    }

    fn extract_with(
        &self,
        planner: &mut RealFftPlanner<f64>,
        window: &EpochWindow,
    ) -> Result<Vec<f64>, PipelineError> {
        let mut out = Vec::with_capacity(self.n_features(window.n_channels()));
        for channel in &window.channels {
            let (freqs, powers) = periodogram(planner, channel, window.sample_rate)?;
            for band in &self.sub_bands {
                let low = band.low.max(window.min_freq);
                let high = band.high.min(window.max_freq);
                let power = if low < high {
                    mean_band_power(&freqs, &powers, low, high)
                } else {
                    0.0
                };
                out.push(power.ln_1p());
            }
        }
        Ok(out)
    }

    /// Feature matrix with one row per window.
    pub fn transform(&self, windows: &[EpochWindow]) -> Result<DMatrix<f64>, PipelineError> {
        let n_channels = windows.first().map(EpochWindow::n_channels).unwrap_or(0);
        let width = self.n_features(n_channels);
        let mut planner = RealFftPlanner::<f64>::new();
        let mut matrix = DMatrix::zeros(windows.len(), width);
        for (row, window) in windows.iter().enumerate() {
            let features = self.extract_with(&mut planner, window)?;
            if features.len() != width {
                return Err(PipelineError::FeatureWidth {
                    expected: width,
                    got: features.len(),
                });
            }
            for (col, value) in features.into_iter().enumerate() {
                matrix[(row, col)] = value;
            }
        }
        Ok(matrix)
    }
}

fn periodogram(
    planner: &mut RealFftPlanner<f64>,
    samples: &[f64],
    fs: f64,
) -> Result<(Vec<f64>, Vec<f64>), PipelineError> {
    let n = samples.len();
    if n == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<f64> = samples.iter().map(|x| x - mean).collect();
    let r2c = planner.plan_fft_forward(n);
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut spectrum)
        .map_err(|e| PipelineError::Spectrum(e.to_string()))?;
    let scale = 1.0 / n as f64;
    let mut freqs = Vec::with_capacity(spectrum.len());
    let mut powers = Vec::with_capacity(spectrum.len());
    for (k, val) in spectrum.iter().enumerate() {
        freqs.push(k as f64 * fs / n as f64);
        let power = if k == 0 || (n % 2 == 0 && k == n / 2) {
            val.norm_sqr()
        } else {
            2.0 * val.norm_sqr()
        } * scale;
        powers.push(power);
    }
    Ok((freqs, powers))
}

fn mean_band_power(freqs: &[f64], powers: &[f64], low: f64, high: f64) -> f64 {
    let (sum, count) = freqs
        .iter()
        .zip(powers)
        .filter(|(f, _)| **f >= low && **f < high)
        .fold((0.0, 0usize), |(sum, count), (_, p)| (sum + p, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
