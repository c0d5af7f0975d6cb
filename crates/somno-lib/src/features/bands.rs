use serde::{Deserialize, Serialize};

/// Canonical EEG rhythms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyBand {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl FrequencyBand {
    pub const ALL: [FrequencyBand; 5] = [
        FrequencyBand::Delta,
        FrequencyBand::Theta,
        FrequencyBand::Alpha,
        FrequencyBand::Beta,
        FrequencyBand::Gamma,
    ];

    /// Edges in Hz, lower inclusive, upper exclusive.
    pub fn range(self) -> (f64, f64) {
        match self {
            FrequencyBand::Delta => (0.0, 3.5),
            FrequencyBand::Theta => (4.0, 7.5),
            FrequencyBand::Alpha => (8.0, 13.0),
            FrequencyBand::Beta => (14.0, 30.0),
            FrequencyBand::Gamma => (30.0, 100.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FrequencyBand::Delta => "delta",
            FrequencyBand::Theta => "theta",
            FrequencyBand::Alpha => "alpha",
            FrequencyBand::Beta => "beta",
            FrequencyBand::Gamma => "gamma",
        }
    }
}

/// How many equal parts Alpha, Beta and Gamma are split into. Delta and Theta stay whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BandDivisions {
    pub alpha: usize,
    pub beta: usize,
    pub gamma: usize,
}

impl Default for BandDivisions {
    fn default() -> Self {
        Self {
            alpha: 1,
            beta: 1,
            gamma: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubBand {
    pub band: FrequencyBand,
    pub index: usize,
    pub low: f64,
    pub high: f64,
}

impl SubBand {
    pub fn name(&self) -> String {
        format!("{}_{}", self.band.name(), self.index)
    }
}

impl BandDivisions {
    pub fn divisions(&self, band: FrequencyBand) -> usize {
        match band {
            FrequencyBand::Delta | FrequencyBand::Theta => 1,
            FrequencyBand::Alpha => self.alpha,
            FrequencyBand::Beta => self.beta,
            FrequencyBand::Gamma => self.gamma,
        }
    }

    pub fn n_sub_bands(&self) -> usize {
        2 + self.alpha + self.beta + self.gamma
    }

    /// All sub-bands in ascending frequency order.
    pub fn sub_bands(&self) -> Vec<SubBand> {
        let mut out = Vec::with_capacity(self.n_sub_bands());
        for band in FrequencyBand::ALL {
            let (low, high) = band.range();
            let parts = self.divisions(band).max(1);
            let width = (high - low) / parts as f64;
            for index in 0..parts {
                out.push(SubBand {
                    band,
                    index,
                    low: low + width * index as f64,
                    high: low + width * (index + 1) as f64,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_bands_tile_each_band() {
        let divisions = BandDivisions {
            alpha: 2,
            beta: 4,
            gamma: 5,
        };
        let bands = divisions.sub_bands();
        assert_eq!(bands.len(), 13);
        assert_eq!(bands.len(), divisions.n_sub_bands());
        let alpha: Vec<_> = bands
            .iter()
            .filter(|b| b.band == FrequencyBand::Alpha)
            .collect();
        assert_eq!(alpha[0].low, 8.0);
        assert_eq!(alpha[0].high, 10.5);
        assert_eq!(alpha[1].high, 13.0);
        let gamma_last = bands.last().unwrap();
        assert!((gamma_last.high - 100.0).abs() < 1e-9);
        assert_eq!(gamma_last.name(), "gamma_4");
    }

    #[test]
    fn default_has_five_bands() {
        assert_eq!(BandDivisions::default().sub_bands().len(), 5);
    }
}
