use crate::signal::TimeSeries;
use anyhow::{anyhow, bail, Context, Result};
use edf_reader::file_reader::SyncFileReader;
use edf_reader::sync_reader::SyncEDFReader;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Helper implementing the EDF reader trait for on-disk files.
struct DiskFileReader {
    path: PathBuf,
}

impl DiskFileReader {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SyncFileReader for DiskFileReader {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Header facts about one PSG channel.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChannelInfo {
    pub label: String,
    pub sample_rate: f64,
    pub prefilter: String,
}

fn open(path: &Path) -> Result<SyncEDFReader<DiskFileReader>> {
    SyncEDFReader::init_with_file_reader(DiskFileReader::new(path))
        .with_context(|| format!("failed to read EDF header of {}", path.display()))
}

fn channel_infos(reader: &SyncEDFReader<DiskFileReader>) -> Vec<ChannelInfo> {
    let block_ms = reader.edf_header.block_duration as f64;
    reader
        .edf_header
        .channels
        .iter()
        .map(|chan| ChannelInfo {
            label: chan.label.trim().to_string(),
            sample_rate: chan.number_of_samples_in_data_record as f64 * 1000.0 / block_ms,
            prefilter: chan.prefiltering.trim().to_string(),
        })
        .collect()
}

/// Read channel labels, sample rates and prefilter text without touching the data records.
pub fn read_channel_infos(path: &Path) -> Result<Vec<ChannelInfo>> {
    let reader = open(path)?;
    Ok(channel_infos(&reader))
}

/// Load the requested channels of a PSG file as whole-night series.
///
/// All requested channels must share one sample rate so epoch indices apply to each.
pub fn load_edf_channels(path: &Path, channels: &[usize]) -> Result<Vec<TimeSeries>> {
    if channels.is_empty() {
        bail!("no channels requested from {}", path.display());
    }
    let reader = open(path)?;
    let infos = channel_infos(&reader);
    for &channel in channels {
        if channel >= infos.len() {
            return Err(anyhow!(
                "{} has {} channels; channel {} is out of range",
                path.display(),
                infos.len(),
                channel
            ));
        }
    }
    let fs = infos[channels[0]].sample_rate;
    if let Some(&odd) = channels.iter().find(|&&c| infos[c].sample_rate != fs) {
        bail!(
            "{}: channel {} samples at {} Hz but channel {} at {} Hz",
            path.display(),
            odd,
            infos[odd].sample_rate,
            channels[0],
            fs
        );
    }
    let total_duration = reader.edf_header.block_duration * reader.edf_header.number_of_blocks;
    let data_matrix = reader
        .read_data_window(0, total_duration)
        .with_context(|| format!("reading data records of {}", path.display()))?;
    channels
        .iter()
        .map(|&channel| {
            let samples = data_matrix
                .get(channel)
                .ok_or_else(|| anyhow!("missing channel data"))?;
            Ok(TimeSeries {
                fs,
                data: samples.iter().map(|value| *value as f64).collect(),
            })
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::write_edf;
    use super::*;

    #[test]
    fn reads_prefilter_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SC4011E0-PSG.edf");
        let samples: Vec<i16> = (0..400).map(|i| (i % 50) as i16).collect();
        write_edf(
            &path,
            &[("EEG Fpz-Cz", "HP:0.5Hz LP:35Hz", samples.clone())],
            100,
        );
        let infos = read_channel_infos(&path).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].label, "EEG Fpz-Cz");
        assert_eq!(infos[0].prefilter, "HP:0.5Hz LP:35Hz");
        assert!((infos[0].sample_rate - 100.0).abs() < 1e-9);

        let series = load_edf_channels(&path, &[0]).unwrap();
        assert_eq!(series[0].len(), 400);
        assert!((series[0].data[7] - 7.0).abs() < 1.0);
    }

    #[test]
    fn rejects_missing_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("psg.edf");
        write_edf(&path, &[("EEG", "", vec![0; 200])], 100);
        assert!(load_edf_channels(&path, &[3]).is_err());
        assert!(load_edf_channels(&path, &[]).is_err());
    }
}
