use thiserror::Error;

/// Failures while pairing signal and annotation files with subject rows.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error(
        "file counts disagree: {signals} signal files, {annotations} annotation files, {subjects} subject rows"
    )]
    CountMismatch {
        signals: usize,
        annotations: usize,
        subjects: usize,
    },
    #[error("{file}: no 3-digit subject code at offset {offset}")]
    MissingCode { file: String, offset: usize },
    #[error("{file}: no technician id at offset {offset}")]
    MissingTechnician { file: String, offset: usize },
    #[error("subject code {code} appears more than once among {role} files")]
    DuplicateCode { code: u16, role: &'static str },
    #[error("signal file {signal} (code {signal_code}) does not match annotation file {annotation} (code {annotation_code})")]
    CodeMismatch {
        signal: String,
        signal_code: u16,
        annotation: String,
        annotation_code: u16,
    },
}

/// Failures while turning an annotation track into epochs.
#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    #[error("annotation track has {0} entries; need at least one stage before the terminal marker")]
    EmptyHypnogram(usize),
    #[error("annotation {index} ({label:?}) has a non-positive duration")]
    NonPositiveDuration { index: usize, label: String },
    #[error("annotation {index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),
}

/// Configuration values that cannot be evaluated against the data at hand.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("{name} must be at least 1")]
    ZeroParameter { name: &'static str },
    #[error("{name} = {value} exceeds the limit of {limit} for this data")]
    OutOfRange {
        name: &'static str,
        value: usize,
        limit: usize,
    },
    #[error("{name} must be a positive finite number, got {value}")]
    InvalidScalar { name: &'static str, value: f64 },
    #[error("expected {expected} labels, got {got}")]
    LabelCount { expected: usize, got: usize },
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
    #[error("pipeline used before fit")]
    NotFitted,
    #[error("feature width changed from {expected} to {got}")]
    FeatureWidth { expected: usize, got: usize },
    #[error("decomposition failed: {0}")]
    Decomposition(String),
    #[error("model fit failed: {0}")]
    Model(String),
    #[error("spectrum failed: {0}")]
    Spectrum(String),
}
