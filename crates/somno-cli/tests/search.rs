use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use serde_json::Value;
use std::{error::Error, fs, path::Path, path::PathBuf};

#[derive(Deserialize)]
struct Trial {
    trial: usize,
    error: f64,
    status: String,
}

#[derive(Deserialize)]
struct SearchReport {
    strategy: String,
    trials: usize,
    held_in: usize,
    held_out: usize,
    held_out_accuracy: Option<f64>,
    best: Trial,
    history: Vec<Trial>,
}

fn telemetry_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("test_data/telemetry")
}

fn build_dataset(out: &Path) {
    let dir = telemetry_dir();
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
    cmd.assert().success();
}

#[test]
fn search_reports_best_of_history() -> Result<(), Box<dyn Error>> {
    let tmp = tempfile::tempdir()?;
    let dataset = tmp.path().join("epochs.csv");
    build_dataset(&dataset);
    let report_path = tmp.path().join("report.json");
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args([
        "search",
        "--dataset",
        dataset.to_str().unwrap(),
        "--recordings",
        telemetry_dir().to_str().unwrap(),
        "--strategy",
        "random",
        "--trials",
        "4",
        "--folds",
        "3",
        "--seed",
        "1",
        "--out",
        report_path.to_str().unwrap(),
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let report: SearchReport = serde_json::from_slice(&stdout)?;
    assert_eq!(report.strategy, "random");
    assert_eq!(report.trials, 4);
    assert_eq!(report.history.len(), 4);
    // 14 epochs per stage, 3 of each held out
    assert_eq!(report.held_in, 33);
    assert_eq!(report.held_out, 9);
    let min = report
        .history
        .iter()
        .map(|t| t.error)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(report.best.error, min);
    assert!(report.history.iter().any(|t| t.trial == report.best.trial));
    assert!(report
        .history
        .iter()
        .all(|t| t.status == "completed" || t.error == 1.0));
    if let Some(accuracy) = report.held_out_accuracy {
        assert!((0.0..=1.0).contains(&accuracy));
    }

    let saved: Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    assert_eq!(saved["history"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[test]
fn search_reads_toml_settings() -> Result<(), Box<dyn Error>> {
    let tmp = tempfile::tempdir()?;
    let dataset = tmp.path().join("epochs.csv");
    build_dataset(&dataset);
    let config = tmp.path().join("search.toml");
    fs::write(&config, "strategy = \"grid\"\ntrials = 3\nfolds = 3\ngrid_levels = 2\n")?;
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args([
        "search",
        "--dataset",
        dataset.to_str().unwrap(),
        "--recordings",
        telemetry_dir().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let report: SearchReport = serde_json::from_slice(&stdout)?;
    assert_eq!(report.strategy, "grid");
    assert_eq!(report.history.len(), 3);
    // first grid points use one division per band, no reduction and 1-NN
    assert_eq!(report.history[0].status, "completed");
    assert!(report.history[0].error < 0.2);
    Ok(())
}

#[test]
fn search_rejects_nan_explore() -> Result<(), Box<dyn Error>> {
    let tmp = tempfile::tempdir()?;
    let config = tmp.path().join("search.toml");
    fs::write(&config, "strategy = \"adaptive\"\nexplore = nan\n")?;
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args([
        "search",
        "--dataset",
        tmp.path().join("epochs.csv").to_str().unwrap(),
        "--recordings",
        telemetry_dir().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    let stderr = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8_lossy(&stderr).contains("explore probability"));
    Ok(())
}
