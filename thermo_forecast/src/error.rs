//! Error types for the thermo_forecast crate

use polars::prelude::PolarsError;
use std::fmt;
use thermo_math::MathError;
use thiserror::Error;

/// Pipeline stage an error surfaced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Preprocess,
    Transform,
    Split,
    Search,
    Fit,
    Evaluate,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Preprocess => "preprocess",
            Stage::Transform => "transform",
            Stage::Split => "split",
            Stage::Search => "search",
            Stage::Fit => "fit",
            Stage::Evaluate => "evaluate",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Custom error types for the thermo_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Unrecognized option, unsupported input shape or invalid parameter
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Required column missing or data otherwise unusable
    #[error("Data error: {0}")]
    DataError(String),

    /// A step produced or received zero rows
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// A model could not be fitted
    #[error("Fit error: {0}")]
    FitError(String),

    /// Metric inputs violate their preconditions
    #[error("Metric error: {0}")]
    MetricError(String),

    /// Every search candidate failed
    #[error("No viable candidate: {0}")]
    NoViableCandidate(String),

    /// Error from numeric kernels
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the CSV writer
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error annotated with the pipeline stage it came from
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ForecastError>,
    },
}

impl ForecastError {
    /// Annotate this error with `stage`, keeping an existing annotation
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ ForecastError::Stage { .. } => already,
            other => ForecastError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was annotated with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ForecastError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

/// Attach a stage to the error side of a result
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}
