use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::error::Error;

#[derive(Deserialize)]
struct BoundsOutput {
    min_freq: f64,
    max_freq: f64,
}

fn bounds(prefilter: &str, sample_rate: &str) -> Result<BoundsOutput, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args(["bounds", "--prefilter", prefilter, "--sample-rate", sample_rate]);
    let out = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&out)?)
}

#[test]
fn bounds_command_reads_prefilter() -> Result<(), Box<dyn Error>> {
    let value = bounds("HP:0.5Hz LP:35Hz [notch 50Hz]", "100")?;
    assert_eq!(value.min_freq, 0.5);
    assert_eq!(value.max_freq, 35.0);
    Ok(())
}

#[test]
fn bounds_command_caps_at_nyquist() -> Result<(), Box<dyn Error>> {
    let value = bounds("HP:0.16Hz LP:200Hz", "100")?;
    assert_eq!(value.min_freq, 0.16);
    assert_eq!(value.max_freq, 50.0);
    let fallback = bounds("none", "256")?;
    assert_eq!(fallback.min_freq, 0.0);
    assert_eq!(fallback.max_freq, 128.0);
    Ok(())
}

#[test]
fn bounds_command_rejects_bad_rate() {
    let mut cmd = cargo_bin_cmd!("somno");
    cmd.args(["bounds", "--prefilter", "LP:35Hz", "--sample-rate", "0"]);
    cmd.assert().failure();
}
