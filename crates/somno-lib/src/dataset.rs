use crate::bounds::{extract_bounds, GlobalBounds};
use crate::io::{edf, hypnogram};
use crate::progress::ProgressReporter;
use crate::segment::{Annotation, StageSegmenter};
use crate::signal::EpochWindow;
use crate::subjects::SubjectNight;
use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// What the segmenter needs from one night: rate, prefilter text and stage track.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub sample_rate: f64,
    pub prefilter: String,
    pub annotations: Vec<Annotation>,
}

/// Loads the recording behind a subject-night.
pub trait RecordingSource {
    fn load(&self, night: &SubjectNight) -> Result<Recording>;
}

/// Reads PSG headers with `edf-reader` and hypnograms as EDF+ (or TSV).
#[derive(Debug, Clone)]
pub struct EdfRecordingSource {
    /// PSG channel whose sample rate and prefilter describe the recording.
    pub channel: usize,
}

impl Default for EdfRecordingSource {
    fn default() -> Self {
        Self { channel: 0 }
    }
}

impl RecordingSource for EdfRecordingSource {
    fn load(&self, night: &SubjectNight) -> Result<Recording> {
        let infos = edf::read_channel_infos(&night.psg_path)?;
        let info = infos.get(self.channel).ok_or_else(|| {
            anyhow!(
                "{} has {} channels; channel {} is out of range",
                night.psg_path.display(),
                infos.len(),
                self.channel
            )
        })?;
        let timed = hypnogram::read_annotations(&night.hypnogram_path)?;
        Ok(Recording {
            sample_rate: info.sample_rate,
            prefilter: info.prefilter.clone(),
            annotations: hypnogram::to_sample_annotations(&timed, info.sample_rate),
        })
    }
}

/// One epoch of the training table, flattened with its subject attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub subject: String,
    pub night: Option<String>,
    pub sex: String,
    pub lights_off_cos: f64,
    pub lights_off_sin: f64,
    pub technician: char,
    pub psg_filename: String,
    pub hypnogram_filename: String,
    pub start_index: usize,
    pub end_index: usize,
    /// Rate that turned annotation seconds into `start_index`/`end_index`.
    pub sample_rate: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub label: char,
    pub study: u8,
    /// Remaining subject-table columns; written after the fixed ones.
    #[serde(skip)]
    pub attributes: Vec<(String, String)>,
}

const COLUMNS: [&str; 15] = [
    "subject",
    "night",
    "sex",
    "lights_off_cos",
    "lights_off_sin",
    "technician",
    "psg_filename",
    "hypnogram_filename",
    "start_index",
    "end_index",
    "sample_rate",
    "min_freq",
    "max_freq",
    "label",
    "study",
];

impl DatasetRow {
    fn fields(&self) -> [String; 15] {
        [
            self.subject.clone(),
            self.night.clone().unwrap_or_default(),
            self.sex.clone(),
            self.lights_off_cos.to_string(),
            self.lights_off_sin.to_string(),
            self.technician.to_string(),
            self.psg_filename.clone(),
            self.hypnogram_filename.clone(),
            self.start_index.to_string(),
            self.end_index.to_string(),
            self.sample_rate.to_string(),
            self.min_freq.to_string(),
            self.max_freq.to_string(),
            self.label.to_string(),
            self.study.to_string(),
        ]
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Segment every night and concatenate the epochs, subject order then time order.
pub fn assemble<S>(
    nights: &[SubjectNight],
    source: &S,
    progress: Option<&ProgressReporter>,
) -> Result<Vec<DatasetRow>>
where
    S: RecordingSource + ?Sized,
{
    let mut rows = Vec::new();
    let n_nights = nights.len();
    for (night_idx, night) in nights.iter().enumerate() {
        let recording = source
            .load(night)
            .with_context(|| format!("loading {}", night.psg_filename()))?;
        let bounds = extract_bounds(
            &recording.prefilter,
            GlobalBounds::from_sample_rate(recording.sample_rate),
        );
        let segmenter = StageSegmenter::new(&recording.annotations, bounds, recording.sample_rate)
            .with_context(|| format!("segmenting {}", night.hypnogram_filename()))?;
        let n_stages = segmenter.len();
        let psg_filename = night.psg_filename();
        let hypnogram_filename = night.hypnogram_filename();
        for (stage_idx, epoch) in segmenter.epochs().enumerate() {
            if let Some(progress) = progress {
                progress.report(format!(
                    "processing night {}/{}, stage {}/{}",
                    night_idx + 1,
                    n_nights,
                    stage_idx + 1,
                    n_stages
                ));
            }
            rows.push(DatasetRow {
                subject: night.record.subject.clone(),
                night: night.record.night.clone(),
                sex: night.record.sex.clone(),
                lights_off_cos: night.record.lights_off.cos,
                lights_off_sin: night.record.lights_off.sin,
                technician: night.technician,
                psg_filename: psg_filename.clone(),
                hypnogram_filename: hypnogram_filename.clone(),
                start_index: epoch.start_index,
                end_index: epoch.end_index,
                sample_rate: recording.sample_rate,
                min_freq: epoch.min_freq,
                max_freq: epoch.max_freq,
                label: epoch.label,
                study: night.study.indicator(),
                attributes: night.record.attributes.clone(),
            });
        }
        info!(
            "{}: {} epochs, usable band {:.2}-{:.2} Hz",
            psg_filename, n_stages, bounds.min_freq, bounds.max_freq
        );
    }
    Ok(rows)
}

/// Write the table; attribute columns follow the first row's names.
pub fn write_csv(path: &Path, rows: &[DatasetRow]) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    let attribute_names: Vec<&str> = rows
        .first()
        .map(|row| row.attributes.iter().map(|(name, _)| name.as_str()).collect())
        .unwrap_or_default();
    let mut header: Vec<&str> = COLUMNS.to_vec();
    header.extend(&attribute_names);
    writer.write_record(&header)?;
    for row in rows {
        let fields = row.fields();
        let mut record: Vec<&str> = fields.iter().map(String::as_str).collect();
        record.extend(
            attribute_names
                .iter()
                .map(|name| row.attribute(name).unwrap_or("")),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv(path: &Path) -> Result<Vec<DatasetRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let attribute_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !COLUMNS.contains(name))
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let context = || format!("{}: row {}", path.display(), idx + 1);
        let record = record.with_context(context)?;
        let mut row: DatasetRow = record.deserialize(Some(&headers)).with_context(context)?;
        row.attributes = attribute_columns
            .iter()
            .map(|(col, name)| (name.clone(), record.get(*col).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Cut each row's signal slice out of its PSG file.
///
/// Every file is read once; windows come back in row order.
pub fn load_epoch_windows(
    rows: &[DatasetRow],
    recording_dir: &Path,
    channels: &[usize],
) -> Result<Vec<EpochWindow>> {
    let mut by_file: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        by_file.entry(row.psg_filename.as_str()).or_default().push(idx);
    }
    let mut windows: Vec<Option<EpochWindow>> = vec![None; rows.len()];
    for (file, indices) in by_file {
        let path = recording_dir.join(file);
        let series = edf::load_edf_channels(&path, channels)?;
        let fs = series[0].fs;
        let available = series[0].len();
        for idx in indices {
            let row = &rows[idx];
            if (row.sample_rate - fs).abs() > 1e-9 {
                bail!(
                    "{}: epochs were indexed at {} Hz but the loaded channels sample at {} Hz",
                    file,
                    row.sample_rate,
                    fs
                );
            }
            if row.start_index >= available {
                bail!(
                    "{}: epoch {}..{} starts past the end of the recording ({} samples)",
                    file,
                    row.start_index,
                    row.end_index,
                    available
                );
            }
            if row.end_index > available {
                warn!(
                    "{}: epoch {}..{} truncated to {} samples",
                    file, row.start_index, row.end_index, available
                );
            }
            windows[idx] = Some(EpochWindow {
                sample_rate: fs,
                channels: series
                    .iter()
                    .map(|ts| ts.window(row.start_index, row.end_index).to_vec())
                    .collect(),
                min_freq: row.min_freq,
                max_freq: row.max_freq,
            });
        }
    }
    windows
        .into_iter()
        .enumerate()
        .map(|(idx, window)| window.ok_or_else(|| anyhow!("row {} has no window", idx + 1)))
        .collect()
}
