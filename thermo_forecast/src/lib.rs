//! # Thermo Forecast
//!
//! A Rust library for forecasting battery temperature from storage-system
//! telemetry.
//!
//! ## Features
//!
//! - Minute-resolution telemetry ingestion (CSV files or polars frames)
//! - Cleaning: deduplication, grid sessions, per-minute reindexing and
//!   bounded gap filling
//! - Transform chain: scaling, granularity aggregation and differencing in a
//!   fixed order, driven by a per-column aggregation policy
//! - Chronological train/test split with optional smoothing of the training part
//! - Baselines and searched models: persistence, simple average, linear trend,
//!   rolling mean, exponential smoothing, ARIMA and LSTM
//! - Hyperparameter search with a minimum-improvement deadband
//! - RMSE, MAE, MAPE and R2 evaluation and report sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thermo_forecast::config::ExperimentFile;
//! use thermo_forecast::data::DataLoader;
//! use thermo_forecast::preprocess::Preprocessor;
//! use thermo_forecast::report::{LogSink, ReportSink};
//! use thermo_forecast::runner::run_experiment;
//!
//! # fn main() -> thermo_forecast::error::Result<()> {
//! let experiment = ExperimentFile::from_path("experiment.json")?;
//! let raw = DataLoader::from_dir("data/")?;
//! let table = Preprocessor::new(experiment.preprocess.clone()).run(&raw)?;
//!
//! let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogSink)];
//! let outcome = run_experiment(&table, &experiment, &mut sinks);
//! for report in &outcome.reports {
//!     println!("{}: test R2 {:.2}", report.model, report.evaluation.test.r2);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod models;
pub mod policy;
pub mod preprocess;
pub mod profiling;
pub mod report;
pub mod runner;
pub mod search;
pub mod split;
pub mod timing;
pub mod transform;

// Re-export commonly used types
pub use crate::config::{ExperimentFile, ExperimentOptions, ModelFamily, RunOptions};
pub use crate::data::{DataLoader, Dataset, TimeSeries, TimeSeriesTable};
pub use crate::error::{ForecastError, Stage};
pub use crate::evaluate::{evaluate, EvaluationReport, Metric, MetricSet};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::policy::AggregationPolicy;
pub use crate::runner::{run_experiment, run_model, RunReport};
pub use crate::search::{ParameterSearch, DELTA_IMPROVE};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
