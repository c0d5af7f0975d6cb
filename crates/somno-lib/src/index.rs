use crate::error::IndexError;
use crate::subjects::{Study, SubjectNight, SubjectRecord};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// How recording files are recognised inside a study directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub signal_marker: String,
    pub annotation_marker: String,
    /// Byte offset of the 3-digit subject code in a file name.
    pub code_offset: usize,
    /// Byte offset of the technician id in an annotation file name.
    pub technician_offset: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            signal_marker: "PSG".into(),
            annotation_marker: "Hypnogram".into(),
            code_offset: 3,
            technician_offset: 7,
        }
    }
}

const CODE_WIDTH: usize = 3;

fn subject_code(file: &str, offset: usize) -> Result<u16, IndexError> {
    file.get(offset..offset + CODE_WIDTH)
        .filter(|slice| slice.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|slice| slice.parse().ok())
        .ok_or_else(|| IndexError::MissingCode {
            file: file.to_string(),
            offset,
        })
}

fn sorted_by_code<'a>(
    files: Vec<&'a str>,
    offset: usize,
    role: &'static str,
) -> Result<Vec<(u16, &'a str)>, IndexError> {
    let mut coded = files
        .into_iter()
        .map(|file| subject_code(file, offset).map(|code| (code, file)))
        .collect::<Result<Vec<_>, _>>()?;
    coded.sort_by_key(|(code, _)| *code);
    let mut seen = HashSet::new();
    for (code, _) in &coded {
        if !seen.insert(*code) {
            return Err(IndexError::DuplicateCode { code: *code, role });
        }
    }
    Ok(coded)
}

/// Pair every subject row with its signal and annotation file.
///
/// `listing` holds bare file names from one study directory; `dir` is joined onto
/// them to build the paths. Subject rows must already be in code order.
pub fn index_recordings(
    dir: &Path,
    listing: &[String],
    subjects: &[SubjectRecord],
    study: Study,
    settings: &IndexSettings,
) -> Result<Vec<SubjectNight>, IndexError> {
    let signals: Vec<&str> = listing
        .iter()
        .map(String::as_str)
        .filter(|name| name.contains(settings.signal_marker.as_str()))
        .collect();
    let annotations: Vec<&str> = listing
        .iter()
        .map(String::as_str)
        .filter(|name| name.contains(settings.annotation_marker.as_str()))
        .collect();
    if signals.len() != annotations.len() || signals.len() != subjects.len() {
        return Err(IndexError::CountMismatch {
            signals: signals.len(),
            annotations: annotations.len(),
            subjects: subjects.len(),
        });
    }

    let signals = sorted_by_code(signals, settings.code_offset, "signal")?;
    let annotations = sorted_by_code(annotations, settings.code_offset, "annotation")?;

    let mut nights = Vec::with_capacity(subjects.len());
    for ((record, (signal_code, signal)), (annotation_code, annotation)) in
        subjects.iter().zip(&signals).zip(&annotations)
    {
        if signal_code != annotation_code {
            return Err(IndexError::CodeMismatch {
                signal: signal.to_string(),
                signal_code: *signal_code,
                annotation: annotation.to_string(),
                annotation_code: *annotation_code,
            });
        }
        let offset = settings.technician_offset;
        let technician = annotation
            .get(offset..offset + 1)
            .and_then(|slice| slice.chars().next())
            .ok_or_else(|| IndexError::MissingTechnician {
                file: annotation.to_string(),
                offset,
            })?;
        debug!("subject {} -> {} / {}", record.subject, signal, annotation);
        nights.push(SubjectNight {
            record: record.clone(),
            technician,
            study,
            psg_path: dir.join(signal),
            hypnogram_path: dir.join(annotation),
        });
    }
    info!("indexed {} {} nights in {}", nights.len(), study, dir.display());
    Ok(nights)
}

/// Plain file names in `dir`, sorted.
pub fn list_directory(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subjects::CircularTime;
    use std::path::PathBuf;

    fn subject(id: &str) -> SubjectRecord {
        SubjectRecord {
            subject: id.into(),
            night: Some("1".into()),
            sex: "F".into(),
            lights_off: CircularTime::from_hm(23, 0),
            attributes: Vec::new(),
        }
    }

    fn listing(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pairs_files_in_code_order() {
        let files = listing(&[
            "SC4021E0-PSG.edf",
            "SC4011EH-Hypnogram.edf",
            "SC4011E0-PSG.edf",
            "SC4021EC-Hypnogram.edf",
        ]);
        let subjects = vec![subject("1"), subject("2")];
        let nights = index_recordings(
            Path::new("data"),
            &files,
            &subjects,
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap();
        assert_eq!(nights.len(), 2);
        assert_eq!(nights[0].psg_path, PathBuf::from("data/SC4011E0-PSG.edf"));
        assert_eq!(nights[0].hypnogram_filename(), "SC4011EH-Hypnogram.edf");
        assert_eq!(nights[0].technician, 'H');
        assert_eq!(nights[1].technician, 'C');
        assert_eq!(nights[1].record.subject, "2");
    }

    #[test]
    fn count_mismatch_is_fatal() {
        let files = listing(&["SC4011E0-PSG.edf", "SC4011EH-Hypnogram.edf"]);
        let err = index_recordings(
            Path::new("."),
            &files,
            &[subject("1"), subject("2")],
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            IndexError::CountMismatch {
                signals: 1,
                annotations: 1,
                subjects: 2
            }
        );
    }

    #[test]
    fn misaligned_codes_are_fatal() {
        let files = listing(&[
            "SC4011E0-PSG.edf",
            "SC4021E0-PSG.edf",
            "SC4011EH-Hypnogram.edf",
            "SC4031EC-Hypnogram.edf",
        ]);
        let err = index_recordings(
            Path::new("."),
            &files,
            &[subject("1"), subject("2")],
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IndexError::CodeMismatch {
                signal_code: 21,
                annotation_code: 31,
                ..
            }
        ));
    }

    #[test]
    fn non_numeric_code_is_fatal() {
        let files = listing(&["SC4x11E0-PSG.edf", "SC4011EH-Hypnogram.edf"]);
        let err = index_recordings(
            Path::new("."),
            &files,
            &[subject("1")],
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::MissingCode { .. }));
    }

    #[test]
    fn duplicate_codes_are_fatal() {
        let files = listing(&[
            "SC4011E0-PSG.edf",
            "SC4011E1-PSG.edf",
            "SC4011EH-Hypnogram.edf",
            "SC4021EH-Hypnogram.edf",
        ]);
        let err = index_recordings(
            Path::new("."),
            &files,
            &[subject("1"), subject("2")],
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            IndexError::DuplicateCode {
                code: 11,
                role: "signal"
            }
        );
    }

    #[test]
    fn offsets_count_bytes_for_code_and_technician() {
        // 'Ç' takes two bytes, so byte 7 is 'H' while char 7 would be '-'
        let files = listing(&["SÇ011E0-PSG.edf", "SÇ011EH-Hypnogram.edf"]);
        let nights = index_recordings(
            Path::new("."),
            &files,
            &[subject("1")],
            Study::Cassette,
            &IndexSettings::default(),
        )
        .unwrap();
        assert_eq!(nights[0].technician, 'H');
    }

    #[test]
    fn lists_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.edf"), b"").unwrap();
        std::fs::write(dir.path().join("a.edf"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        assert_eq!(list_directory(dir.path()).unwrap(), vec!["a.edf", "b.edf"]);
    }
}
