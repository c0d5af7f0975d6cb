use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which arm of the sleep database a night belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Study {
    Cassette,
    Telemetry,
}

impl Study {
    /// Value of the `study` column: 0 for cassette, 1 for telemetry.
    pub fn indicator(self) -> u8 {
        match self {
            Study::Cassette => 0,
            Study::Telemetry => 1,
        }
    }

    /// Header renames applied before the columns are looked up.
    fn column_aliases(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Study::Cassette => &[
                ("k", "subject"),
                ("sex (F=1)", "sex"),
                ("LightsOff", "lights_off"),
            ],
            Study::Telemetry => &[],
        }
    }
}

impl fmt::Display for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Study::Cassette => write!(f, "cassette"),
            Study::Telemetry => write!(f, "telemetry"),
        }
    }
}

impl FromStr for Study {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cassette" | "sc" => Ok(Study::Cassette),
            "telemetry" | "st" => Ok(Study::Telemetry),
            other => Err(anyhow!("unknown study {other:?}")),
        }
    }
}

/// Time of day projected onto the unit circle so 23:59 and 00:01 are neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircularTime {
    pub cos: f64,
    pub sin: f64,
}

impl CircularTime {
    pub fn from_hm(hour: u32, minute: u32) -> Self {
        let fraction = (hour as f64 + minute as f64 / 60.0) / 24.0;
        Self {
            cos: (2.0 * PI * fraction).cos(),
            sin: (2.0 * PI * fraction).sin(),
        }
    }

    /// Parse `HH:MM` or `HH:MM:SS`; seconds do not contribute.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.trim().split(':');
        let hour: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("empty time"))?
            .trim()
            .parse()
            .with_context(|| format!("hour in {text:?}"))?;
        let minute: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("time {text:?} has no minutes"))?
            .trim()
            .parse()
            .with_context(|| format!("minute in {text:?}"))?;
        if hour > 23 || minute > 59 {
            bail!("time {text:?} is out of range");
        }
        Ok(Self::from_hm(hour, minute))
    }
}

/// Static per-night attributes read from the subject table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject: String,
    pub night: Option<String>,
    pub sex: String,
    pub lights_off: CircularTime,
    /// Every other column of the table as `(name, value)`, in table order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

/// A subject row joined with its recording files. Created by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectNight {
    pub record: SubjectRecord,
    pub technician: char,
    pub study: Study,
    pub psg_path: PathBuf,
    pub hypnogram_path: PathBuf,
}

impl SubjectNight {
    pub fn psg_filename(&self) -> String {
        file_name(&self.psg_path)
    }

    pub fn hypnogram_filename(&self) -> String {
        file_name(&self.hypnogram_path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn normalize_sex(study: Study, raw: &str) -> String {
    match (study, raw.trim()) {
        (Study::Cassette, "1") => "F".into(),
        (Study::Cassette, "0") | (Study::Cassette, "2") => "M".into(),
        (_, other) => other.to_string(),
    }
}

const NAMED_COLUMNS: [&str; 4] = ["subject", "night", "sex", "lights_off"];

fn column_name(study: Study, header: &str) -> &str {
    let header = header.trim();
    study
        .column_aliases()
        .iter()
        .find(|(raw, _)| raw.eq_ignore_ascii_case(header))
        .map(|(_, alias)| *alias)
        .unwrap_or(header)
}

fn locate_column(headers: &StringRecord, study: Study, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| column_name(study, header).eq_ignore_ascii_case(name))
}

/// Read the subject table (CSV with header) applying the study-specific schema.
pub fn load_subject_table(path: &Path, study: Study) -> Result<Vec<SubjectRecord>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let subject_idx = locate_column(&headers, study, "subject")
        .ok_or_else(|| anyhow!("{}: missing subject column", path.display()))?;
    let sex_idx = locate_column(&headers, study, "sex")
        .ok_or_else(|| anyhow!("{}: missing sex column", path.display()))?;
    let lights_idx = locate_column(&headers, study, "lights_off")
        .ok_or_else(|| anyhow!("{}: missing lights_off column", path.display()))?;
    let night_idx = locate_column(&headers, study, "night");
    let attribute_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| (idx, column_name(study, header).to_string()))
        .filter(|(_, name)| {
            !NAMED_COLUMNS
                .iter()
                .any(|named| named.eq_ignore_ascii_case(name))
        })
        .collect();

    let mut out = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading subject row {}", row + 1))?;
        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .ok_or_else(|| anyhow!("subject row {} has no {name}", row + 1))
        };
        let lights_off = CircularTime::parse(field(lights_idx, "lights_off")?)
            .with_context(|| format!("subject row {}", row + 1))?;
        out.push(SubjectRecord {
            subject: field(subject_idx, "subject")?.to_string(),
            night: night_idx
                .and_then(|idx| record.get(idx))
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            sex: normalize_sex(study, field(sex_idx, "sex")?),
            lights_off,
            attributes: attribute_columns
                .iter()
                .map(|(idx, name)| (name.clone(), record.get(*idx).unwrap_or("").to_string()))
                .collect(),
        });
    }
    Ok(out)
}
