use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;
use somno_lib::{
    dataset::{self, DatasetRow, EdfRecordingSource},
    extract_bounds,
    index::{index_recordings, list_directory, IndexSettings},
    pipeline::Pipeline,
    progress::ProgressReporter,
    subjects::{load_subject_table, Study},
    EpochWindow, GlobalBounds,
};
use somno_search::{
    read_config, stratified_split, SearchEngine, SearchSettings, StrategyKind, StratifiedKFold,
    TrialResult,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "somno",
    version,
    about = "Sleep-stage dataset building and pipeline search"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StudyArg {
    #[value(name = "cassette")]
    Cassette,
    #[value(name = "telemetry")]
    Telemetry,
}

impl From<StudyArg> for Study {
    fn from(arg: StudyArg) -> Self {
        match arg {
            StudyArg::Cassette => Study::Cassette,
            StudyArg::Telemetry => Study::Telemetry,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Random,
    Grid,
    Adaptive,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Random => StrategyKind::Random,
            StrategyArg::Grid => StrategyKind::Grid,
            StrategyArg::Adaptive => StrategyKind::Adaptive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pair recordings with subjects, segment every night and write the epoch table
    BuildDataset {
        #[arg(long)]
        recordings: PathBuf,
        #[arg(long)]
        subjects: PathBuf,
        #[arg(long, default_value = "cassette")]
        study: StudyArg,
        #[arg(long)]
        out: PathBuf,
        /// PSG channel whose sample rate and prefilter apply
        #[arg(long, default_value_t = 0)]
        channel: usize,
        #[arg(long)]
        quiet: bool,
    },
    /// Cross-validated search for the best classification pipeline
    Search {
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long)]
        recordings: PathBuf,
        /// TOML settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        strategy: Option<StrategyArg>,
        #[arg(long)]
        trials: Option<usize>,
        #[arg(long)]
        folds: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_delimiter = ',')]
        channels: Option<Vec<usize>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Usable frequency range for a prefilter description
    Bounds {
        #[arg(long)]
        prefilter: String,
        #[arg(long)]
        sample_rate: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::BuildDataset {
            recordings,
            subjects,
            study,
            out,
            channel,
            quiet,
        } => cmd_build_dataset(&recordings, &subjects, study.into(), &out, channel, quiet)?,
        Commands::Search {
            dataset,
            recordings,
            config,
            strategy,
            trials,
            folds,
            seed,
            channels,
            out,
        } => {
            let mut settings = match config {
                Some(path) => read_config(&path)?,
                None => SearchSettings::default(),
            };
            if let Some(strategy) = strategy {
                settings.strategy = strategy.into();
            }
            if let Some(trials) = trials {
                settings.trials = trials;
            }
            if let Some(folds) = folds {
                settings.folds = folds;
            }
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            if let Some(channels) = channels {
                settings.channels = channels;
            }
            settings.validate()?;
            cmd_search(&dataset, &recordings, &settings, out.as_deref())?
        }
        Commands::Bounds {
            prefilter,
            sample_rate,
        } => cmd_bounds(&prefilter, sample_rate)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct DatasetSummary {
    nights: usize,
    epochs: usize,
    out: String,
}

fn cmd_build_dataset(
    recordings: &Path,
    subjects: &Path,
    study: Study,
    out: &Path,
    channel: usize,
    quiet: bool,
) -> Result<()> {
    let listing = list_directory(recordings)?;
    let table = load_subject_table(subjects, study)?;
    let nights = index_recordings(recordings, &listing, &table, study, &IndexSettings::default())?;
    let source = EdfRecordingSource { channel };
    let reporter = (!quiet).then(ProgressReporter::stderr);
    let rows = dataset::assemble(&nights, &source, reporter.as_ref());
    if let Some(reporter) = reporter {
        reporter.finish();
        eprintln!();
    }
    let rows = rows?;
    dataset::write_csv(out, &rows)?;
    info!("wrote {} epochs to {}", rows.len(), out.display());
    let summary = DatasetSummary {
        nights: nights.len(),
        epochs: rows.len(),
        out: out.display().to_string(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[derive(Serialize)]
struct SearchReport {
    strategy: &'static str,
    trials: usize,
    folds: usize,
    held_in: usize,
    held_out: usize,
    /// Best configuration refit on the held-in part and scored on the held-out part.
    held_out_accuracy: Option<f64>,
    best: TrialResult,
    history: Vec<TrialResult>,
}

fn cmd_search(
    dataset_path: &Path,
    recordings: &Path,
    settings: &SearchSettings,
    out: Option<&Path>,
) -> Result<()> {
    let rows = dataset::read_csv(dataset_path)?;
    if rows.is_empty() {
        return Err(anyhow!("{} has no epochs", dataset_path.display()));
    }
    let windows = dataset::load_epoch_windows(&rows, recordings, &settings.channels)?;
    let labels: Vec<char> = rows.iter().map(|row: &DatasetRow| row.label).collect();
    let (train, test) = stratified_split(&labels, settings.test_fraction, settings.seed)?;
    let mut held_out = vec![false; rows.len()];
    for idx in &test {
        held_out[*idx] = true;
    }
    let (mut train_windows, mut train_labels) = (Vec::new(), Vec::new());
    let (mut test_windows, mut test_labels) = (Vec::new(), Vec::new());
    for ((window, label), is_test) in windows.into_iter().zip(labels).zip(held_out) {
        if is_test {
            test_windows.push(window);
            test_labels.push(label);
        } else {
            train_windows.push(window);
            train_labels.push(label);
        }
    }
    info!(
        "{} epochs held in, {} held out",
        train.len(),
        test_windows.len()
    );

    let mut engine = SearchEngine::sleep_stage(
        &train_windows,
        &train_labels,
        StratifiedKFold::new(settings.folds, settings.seed),
    )?;
    let mut strategy = settings.build_strategy()?;
    let outcome = engine.run(strategy.as_mut(), settings.trials)?;
    let held_out_accuracy = held_out_score(
        &outcome.best,
        settings.seed,
        (&train_windows[..], &train_labels[..]),
        (&test_windows[..], &test_labels[..]),
    );
    let report = SearchReport {
        strategy: strategy.name(),
        trials: outcome.history.len(),
        folds: settings.folds,
        held_in: train_windows.len(),
        held_out: test_windows.len(),
        held_out_accuracy,
        best: outcome.best,
        history: outcome.history,
    };
    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = out {
        std::fs::write(path, &json)?;
        info!("wrote search report to {}", path.display());
    }
    println!("{json}");
    Ok(())
}

fn held_out_score(
    best: &TrialResult,
    seed: u64,
    (train_windows, train_labels): (&[EpochWindow], &[char]),
    (test_windows, test_labels): (&[EpochWindow], &[char]),
) -> Option<f64> {
    if !best.is_completed() {
        return None;
    }
    let config = best.config.as_ref()?;
    let mut pipeline = Pipeline::build(config, seed);
    let scored = pipeline
        .fit(train_windows, train_labels)
        .and_then(|_| pipeline.score(test_windows, test_labels));
    match scored {
        Ok(accuracy) => Some(accuracy),
        Err(err) => {
            warn!("refitting the best configuration failed: {err}");
            None
        }
    }
}

fn cmd_bounds(prefilter: &str, sample_rate: f64) -> Result<()> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(anyhow!("sample rate must be positive, got {sample_rate}"));
    }
    let bounds = extract_bounds(prefilter, GlobalBounds::from_sample_rate(sample_rate));
    println!("{}", serde_json::to_string(&bounds)?);
    Ok(())
}
