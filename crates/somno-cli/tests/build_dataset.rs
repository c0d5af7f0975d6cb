use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, fs, path::PathBuf};

#[derive(Deserialize)]
struct DatasetSummary {
    nights: usize,
    epochs: usize,
}

#[derive(Debug, Deserialize)]
struct Row {
    subject: String,
    sex: String,
    technician: char,
    psg_filename: String,
    start_index: usize,
    end_index: usize,
    sample_rate: f64,
    min_freq: f64,
    max_freq: f64,
    label: char,
    study: u8,
    age: u32,
}

fn telemetry_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("test_data/telemetry")
}

#[test]
fn build_dataset_writes_epoch_table() -> Result<(), Box<dyn Error>> {
    let dir = telemetry_dir();
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("epochs.csv");
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args([
        "build-dataset",
        "--recordings",
        dir.to_str().unwrap(),
        "--subjects",
        dir.join("subjects.csv").to_str().unwrap(),
        "--study",
        "telemetry",
        "--out",
        out.to_str().unwrap(),
        "--quiet",
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: DatasetSummary = serde_json::from_slice(&stdout)?;
    assert_eq!(summary.nights, 2);
    assert_eq!(summary.epochs, 42);

    let mut reader = csv::Reader::from_path(&out)?;
    let rows: Vec<Row> = reader.deserialize().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 42);
    assert_eq!(rows[0].subject, "1");
    assert_eq!(rows[0].sex, "F");
    assert_eq!(rows[0].technician, 'C');
    assert_eq!(rows[21].technician, 'H');
    assert_eq!(rows[21].psg_filename, "ST7021J0-PSG.edf");
    assert_eq!(rows[1].start_index, 300);
    assert_eq!(rows[1].end_index, 600);
    assert!(rows.iter().all(|r| r.min_freq == 0.5 && r.max_freq == 35.0));
    assert!(rows.iter().all(|r| r.study == 1 && r.sample_rate == 100.0));
    assert_eq!(rows[0].age, 34);
    assert_eq!(rows[21].age, 52);
    assert_eq!(rows[0].label, 'W');
    assert_eq!(rows[21].label, '2');
    Ok(())
}

#[test]
fn build_dataset_rejects_subject_count_mismatch() -> Result<(), Box<dyn Error>> {
    let dir = telemetry_dir();
    let tmp = tempfile::tempdir()?;
    let subjects = tmp.path().join("subjects.csv");
    fs::write(
        &subjects,
        "subject,night,sex,lights_off\n1,1,F,23:10\n2,1,M,00:05\n3,1,M,22:00\n",
    )?;
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args([
        "build-dataset",
        "--recordings",
        dir.to_str().unwrap(),
        "--subjects",
        subjects.to_str().unwrap(),
        "--study",
        "telemetry",
        "--out",
        tmp.path().join("epochs.csv").to_str().unwrap(),
        "--quiet",
    ]);
    let stderr = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&stderr).contains("file counts disagree"));
    Ok(())
}
