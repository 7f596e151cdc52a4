//! # thermocast
//!
//! Command-line interface for the battery temperature forecasting workbench.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use thermo_forecast::config::ExperimentFile;
use thermo_forecast::data::DataLoader;
use thermo_forecast::error::{Result, Stage, StageExt};
use thermo_forecast::policy::{AggregationPolicy, BATTERY_MAX_TEMPERATURE};
use thermo_forecast::preprocess::{PreprocessConfig, Preprocessor};
use thermo_forecast::profiling::profile;
use thermo_forecast::report::{DirectorySink, LogSink, ReportSink};
use thermo_forecast::runner::run_experiment;
use thermo_forecast::timing::timed;
use thermo_forecast::transform::Granularity;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "thermocast")]
#[command(about = "Battery temperature forecasting workbench", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every model listed in an experiment file
    Run {
        /// Directory with telemetry CSV files
        #[arg(short, long)]
        data: PathBuf,

        /// Experiment file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory for run reports (optional)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Summarize a column and test it for stationarity
    Profile {
        /// Directory with telemetry CSV files
        #[arg(short, long)]
        data: PathBuf,

        /// Column to profile
        #[arg(short, long, default_value = BATTERY_MAX_TEMPERATURE)]
        target: String,

        /// Timestamp column
        #[arg(long, default_value = "registered_at")]
        datetime_col: String,

        /// Aggregate to this granularity first (min, h, d, W, M)
        #[arg(short, long)]
        rule: Option<Granularity>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thermocast=info,thermo_forecast=info".into()),
        )
        .init();
}

fn run(data: PathBuf, config: PathBuf, out: Option<PathBuf>) -> Result<bool> {
    let experiment = ExperimentFile::from_path(&config)?;
    let raw = timed("ingest", || DataLoader::from_dir(&data)).stage(Stage::Ingest)?;
    let table = Preprocessor::new(experiment.preprocess.clone())
        .run(&raw)
        .stage(Stage::Preprocess)?;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogSink)];
    if let Some(dir) = out {
        sinks.push(Box::new(DirectorySink::new(dir)));
    }

    let outcome = run_experiment(&table, &experiment, &mut sinks);
    info!(
        reports = outcome.reports.len(),
        failures = outcome.failures.len(),
        "experiment finished"
    );
    Ok(outcome.failures.is_empty())
}

fn profile_data(
    data: PathBuf,
    target: String,
    datetime_col: String,
    rule: Option<Granularity>,
) -> Result<()> {
    let raw = timed("ingest", || DataLoader::from_dir(&data)).stage(Stage::Ingest)?;
    let config = PreprocessConfig {
        datetime_col,
        target: target.clone(),
        ..PreprocessConfig::default()
    };
    let table = Preprocessor::new(config)
        .run(&raw)
        .stage(Stage::Preprocess)?;
    let summary = profile(&table, &target, rule, &AggregationPolicy::default())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { data, config, out } => run(data, config, out),
        Commands::Profile {
            data,
            target,
            datetime_col,
            rule,
        } => profile_data(data, target, datetime_col, rule).map(|_| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "thermocast failed");
            ExitCode::FAILURE
        }
    }
}
