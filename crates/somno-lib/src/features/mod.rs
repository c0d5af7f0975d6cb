pub mod bandpass;
pub mod bands;

pub use bandpass::BandpassFeatureExtractor;
pub use bands::{BandDivisions, FrequencyBand, SubBand};
