pub mod edf;
pub mod hypnogram;
