use crate::segment::Annotation;
use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const ANNOTATION_LABEL: &str = "EDF Annotations";

/// An annotation as stored on disk, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedAnnotation {
    pub onset: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(alias = "trial_type", alias = "label")]
    pub description: String,
}

impl TimedAnnotation {
    /// Convert seconds to sample offsets at `fs`.
    pub fn to_samples(&self, fs: f64) -> Annotation {
        Annotation {
            onset: (self.onset * fs).round().max(0.0) as usize,
            duration: (self.duration * fs).round().max(0.0) as usize,
            label: self.description.clone(),
        }
    }
}

pub fn to_sample_annotations(timed: &[TimedAnnotation], fs: f64) -> Vec<Annotation> {
    timed.iter().map(|a| a.to_samples(fs)).collect()
}

fn ascii_field(bytes: &[u8], start: usize, width: usize) -> Result<String> {
    let slice = bytes
        .get(start..start + width)
        .ok_or_else(|| anyhow!("EDF header truncated at byte {start}"))?;
    Ok(String::from_utf8_lossy(slice).trim().to_string())
}

fn numeric_field<T: std::str::FromStr>(bytes: &[u8], start: usize, width: usize) -> Result<T> {
    let text = ascii_field(bytes, start, width)?;
    text.parse::<T>()
        .map_err(|_| anyhow!("EDF header field at byte {start} is not numeric: {text:?}"))
}

/// Decode the time-stamped annotation lists (TALs) of every `EDF Annotations` signal.
pub fn parse_edf_annotations(bytes: &[u8]) -> Result<Vec<TimedAnnotation>> {
    let header_bytes: usize = numeric_field(bytes, 184, 8)?;
    let n_records: i64 = numeric_field(bytes, 236, 8)?;
    let ns: usize = numeric_field(bytes, 252, 4)?;
    if header_bytes != 256 * (ns + 1) {
        bail!("EDF header size {header_bytes} does not match {ns} signals");
    }

    let mut labels = Vec::with_capacity(ns);
    for i in 0..ns {
        labels.push(ascii_field(bytes, 256 + 16 * i, 16)?);
    }
    // samples-per-record array starts after label(16) transducer(80) dimension(8)
    // four numeric ranges(4*8) and prefilter(80)
    let samples_offset = 256 + ns * (16 + 80 + 8 + 8 * 4 + 80);
    let mut samples_per_record = Vec::with_capacity(ns);
    for i in 0..ns {
        samples_per_record.push(numeric_field::<usize>(bytes, samples_offset + 8 * i, 8)?);
    }
    let annotation_signals: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label.as_str() == ANNOTATION_LABEL)
        .map(|(i, _)| i)
        .collect();
    if annotation_signals.is_empty() {
        bail!("file has no {ANNOTATION_LABEL:?} signal");
    }

    let record_bytes: usize = samples_per_record.iter().map(|n| n * 2).sum();
    if record_bytes == 0 {
        bail!("EDF data records are empty");
    }
    let available = (bytes.len().saturating_sub(header_bytes)) / record_bytes;
    let n_records = if n_records < 0 {
        available
    } else {
        (n_records as usize).min(available)
    };

    let mut out = Vec::new();
    for record in 0..n_records {
        let record_start = header_bytes + record * record_bytes;
        for &signal in &annotation_signals {
            let offset: usize = samples_per_record[..signal].iter().map(|n| n * 2).sum();
            let start = record_start + offset;
            let end = start + samples_per_record[signal] * 2;
            parse_tals(&bytes[start..end], &mut out)?;
        }
    }
    Ok(out)
}

fn parse_tals(block: &[u8], out: &mut Vec<TimedAnnotation>) -> Result<()> {
    for tal in block.split(|&b| b == 0).filter(|tal| !tal.is_empty()) {
        let mut parts = tal.split(|&b| b == 0x14);
        let timing = parts.next().unwrap_or_default();
        let mut timing = timing.split(|&b| b == 0x15);
        let onset = parse_seconds(timing.next().unwrap_or_default())
            .context("parsing TAL onset")?;
        let duration = match timing.next() {
            Some(text) if !text.is_empty() => parse_seconds(text).context("parsing TAL duration")?,
            _ => 0.0,
        };
        // empty texts are the per-record timekeeping entries
        for text in parts.filter(|text| !text.is_empty()) {
            out.push(TimedAnnotation {
                onset,
                duration,
                description: String::from_utf8_lossy(text).trim().to_string(),
            });
        }
    }
    Ok(())
}

fn parse_seconds(text: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(text)?.trim();
    text.parse::<f64>()
        .map_err(|_| anyhow!("not a time offset: {text:?}"))
}

/// Read an EDF+ hypnogram file.
pub fn read_edf_annotations(path: &Path) -> Result<Vec<TimedAnnotation>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_edf_annotations(&bytes).with_context(|| format!("decoding {}", path.display()))
}

/// Read a tab-separated `onset  duration  description` hypnogram (seconds).
pub fn read_tsv_annotations(path: &Path) -> Result<Vec<TimedAnnotation>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<TimedAnnotation>().enumerate() {
        out.push(row.with_context(|| format!("{}: annotation row {}", path.display(), idx + 1))?);
    }
    Ok(out)
}

/// Pick the reader from the file extension: `.tsv`/`.txt` are tabular, everything else EDF+.
pub fn read_annotations(path: &Path) -> Result<Vec<TimedAnnotation>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => {
            read_tsv_annotations(path)
        }
        _ => read_edf_annotations(path),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::edf_plus_bytes;
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_tals() {
        let bytes = edf_plus_bytes(&[
            (0.0, Some(30630.0), "Sleep stage W"),
            (30630.0, Some(120.0), "Sleep stage 1"),
            (30750.0, Some(390.0), "Sleep stage 2"),
            (31140.0, None, "Sleep stage ?"),
        ]);
        let annotations = parse_edf_annotations(&bytes).unwrap();
        assert_eq!(annotations.len(), 4);
        assert_eq!(annotations[0].description, "Sleep stage W");
        assert_eq!(annotations[1].onset, 30630.0);
        assert_eq!(annotations[2].duration, 390.0);
        assert_eq!(annotations[3].duration, 0.0);
    }

    #[test]
    fn converts_seconds_to_samples() {
        let timed = TimedAnnotation {
            onset: 30.0,
            duration: 0.3,
            description: "Sleep stage 2".into(),
        };
        let annotation = timed.to_samples(100.0);
        assert_eq!(annotation.onset, 3000);
        assert_eq!(annotation.duration, 30);
    }

    #[test]
    fn rejects_files_without_annotation_signal() {
        let mut bytes = edf_plus_bytes(&[(0.0, Some(1.0), "W")]);
        bytes[256..272].copy_from_slice(b"EEG Fpz-Cz      ");
        assert!(parse_edf_annotations(&bytes).is_err());
    }

    #[test]
    fn reads_tsv_hypnogram() {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "onset\tduration\tdescription").unwrap();
        writeln!(file, "0\t30\tSleep stage W").unwrap();
        writeln!(file, "30\t60\tSleep stage 2").unwrap();
        writeln!(file, "90\t0\tSleep stage ?").unwrap();
        let annotations = read_annotations(file.path()).unwrap();
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[1].description, "Sleep stage 2");
        let samples = to_sample_annotations(&annotations, 100.0);
        assert_eq!(samples[1].onset, 3000);
        assert_eq!(samples[1].duration, 6000);
    }
}
