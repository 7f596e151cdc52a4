//! Typed run options and the experiment file
//!
//! Options arrive as JSON with every field optional. Unknown keys are
//! rejected. [`ExperimentOptions::resolve`] merges them over the defaults of
//! a model family into a fully concrete [`RunOptions`].

use crate::error::{ForecastError, Result};
use crate::evaluate::Metric;
use crate::models::lstm::DEFAULT_EPOCHS;
use crate::policy::AggregationPolicy;
use crate::preprocess::PreprocessConfig;
use crate::split::{SmoothingOptions, SplitOptions};
use crate::transform::{Granularity, TransformConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A field that is either switched off with `false` or configured with a value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Flag(bool),
    Value(T),
}

impl<T: Copy> Toggle<T> {
    fn resolve(&self, field: &str) -> Result<Option<T>> {
        match self {
            Toggle::Flag(false) => Ok(None),
            Toggle::Flag(true) => Err(ForecastError::ConfigError(format!(
                "'{}' must be false or an object, not true",
                field
            ))),
            Toggle::Value(v) => Ok(Some(*v)),
        }
    }
}

/// `{"rule": "h"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationRule {
    pub rule: Granularity,
}

/// Options for one run, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<Toggle<SmoothingOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Toggle<AggregationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentiation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimize_for: Option<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exogenous: Option<Vec<String>>,
    /// Training epochs for neural models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs: Option<usize>,
    /// Seed for stochastic fitting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Fully resolved options
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub split: SplitOptions,
    pub transform: TransformConfig,
    pub optimize_for: Metric,
    pub exogenous: Vec<String>,
    pub epochs: usize,
    pub seed: u64,
}

impl ExperimentOptions {
    /// Fields set here win; unset fields fall back to `base`
    pub fn merged_over(&self, base: &ExperimentOptions) -> ExperimentOptions {
        ExperimentOptions {
            training_pct: self.training_pct.or(base.training_pct),
            smoothing: self.smoothing.or(base.smoothing),
            scaling: self.scaling.or(base.scaling),
            aggregation: self.aggregation.or(base.aggregation),
            differentiation: self.differentiation.or(base.differentiation),
            optimize_for: self.optimize_for.or(base.optimize_for),
            exogenous: self.exogenous.clone().or_else(|| base.exogenous.clone()),
            epochs: self.epochs.or(base.epochs),
            seed: self.seed.or(base.seed),
        }
    }

    /// Merge over the family defaults and validate
    pub fn resolve(&self, family: ModelFamily) -> Result<RunOptions> {
        let o = self.merged_over(&family.defaults());

        let training_pct = o.training_pct.unwrap_or(0.8);
        if !(training_pct > 0.0 && training_pct < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "training_pct must lie in (0, 1), got {}",
                training_pct
            )));
        }

        let smoothing = match &o.smoothing {
            Some(t) => t.resolve("smoothing")?,
            None => None,
        };
        if let Some(s) = smoothing {
            if s.window == 0 {
                return Err(ForecastError::ConfigError(
                    "smoothing window must be positive".to_string(),
                ));
            }
        }

        let aggregation = match &o.aggregation {
            Some(t) => t.resolve("aggregation")?.map(|a| a.rule),
            None => None,
        };

        let optimize_for = o.optimize_for.unwrap_or(Metric::R2);
        if !matches!(optimize_for, Metric::R2 | Metric::Mape) {
            return Err(ForecastError::ConfigError(format!(
                "optimize_for must be R2 or MAPE, got {}",
                optimize_for
            )));
        }

        let exogenous = o.exogenous.unwrap_or_default();
        if !exogenous.is_empty() && !family.supports_exogenous() {
            return Err(ForecastError::ConfigError(format!(
                "{} does not accept exogenous columns",
                family
            )));
        }

        let epochs = o.epochs.unwrap_or(DEFAULT_EPOCHS);
        if epochs == 0 {
            return Err(ForecastError::ConfigError(
                "epochs must be positive".to_string(),
            ));
        }

        Ok(RunOptions {
            split: SplitOptions {
                training_pct,
                smoothing,
            },
            transform: TransformConfig {
                scaling: o.scaling.unwrap_or(false),
                aggregation,
                differentiation: o.differentiation.unwrap_or(false),
            },
            optimize_for,
            exogenous,
            epochs,
            seed: o.seed.unwrap_or(0),
        })
    }
}

/// Model families a run can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    PersistenceOptimistic,
    PersistenceRealist,
    SimpleAverage,
    LinearRegression,
    RollingMean,
    ExponentialSmoothing,
    Arima,
    Lstm,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::PersistenceOptimistic,
        ModelFamily::PersistenceRealist,
        ModelFamily::SimpleAverage,
        ModelFamily::LinearRegression,
        ModelFamily::RollingMean,
        ModelFamily::ExponentialSmoothing,
        ModelFamily::Arima,
        ModelFamily::Lstm,
    ];

    /// Defaults applied under any options a run sets
    pub fn defaults(&self) -> ExperimentOptions {
        let mut defaults = ExperimentOptions {
            training_pct: Some(0.8),
            smoothing: Some(Toggle::Flag(false)),
            ..ExperimentOptions::default()
        };
        if *self == ModelFamily::PersistenceOptimistic {
            defaults.smoothing = Some(Toggle::Value(SmoothingOptions::new(50)));
        }
        if self.is_searched() {
            defaults.optimize_for = Some(Metric::R2);
        }
        defaults
    }

    /// Whether the family runs a hyperparameter search
    pub fn is_searched(&self) -> bool {
        matches!(
            self,
            ModelFamily::RollingMean
                | ModelFamily::ExponentialSmoothing
                | ModelFamily::Arima
                | ModelFamily::Lstm
        )
    }

    pub fn supports_exogenous(&self) -> bool {
        matches!(self, ModelFamily::Lstm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::PersistenceOptimistic => "persistence-optimistic",
            ModelFamily::PersistenceRealist => "persistence-realist",
            ModelFamily::SimpleAverage => "simple-average",
            ModelFamily::LinearRegression => "linear-regression",
            ModelFamily::RollingMean => "rolling-mean",
            ModelFamily::ExponentialSmoothing => "exponential-smoothing",
            ModelFamily::Arima => "arima",
            ModelFamily::Lstm => "lstm",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transform options shared by every run of an experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Toggle<AggregationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentiation: Option<bool>,
}

impl From<&TransformOptions> for ExperimentOptions {
    fn from(t: &TransformOptions) -> Self {
        ExperimentOptions {
            scaling: t.scaling,
            aggregation: t.aggregation,
            differentiation: t.differentiation,
            ..ExperimentOptions::default()
        }
    }
}

/// One model run in an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    pub model: ModelFamily,
    #[serde(default)]
    pub options: ExperimentOptions,
}

/// A whole experiment: how to clean the data, shared transforms and runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentFile {
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    /// Entries replacing or extending the default aggregation policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<AggregationPolicy>,
    #[serde(default)]
    pub transform: TransformOptions,
    pub runs: Vec<RunSpec>,
}

impl ExperimentFile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let experiment: ExperimentFile = serde_json::from_reader(BufReader::new(file))?;
        experiment.validate()?;
        Ok(experiment)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let experiment: ExperimentFile = serde_json::from_str(json)?;
        experiment.validate()?;
        Ok(experiment)
    }

    fn validate(&self) -> Result<()> {
        if self.runs.is_empty() {
            return Err(ForecastError::ConfigError(
                "Experiment lists no runs".to_string(),
            ));
        }
        Ok(())
    }

    /// Default policy with this experiment's overrides applied
    pub fn policy(&self) -> AggregationPolicy {
        let base = AggregationPolicy::default();
        match &self.policy {
            Some(overrides) => base.merged(overrides),
            None => base,
        }
    }

    /// Resolved options of `run`: run options, then shared transforms,
    /// then family defaults
    pub fn resolve(&self, run: &RunSpec) -> Result<RunOptions> {
        let shared = ExperimentOptions::from(&self.transform);
        run.options.merged_over(&shared).resolve(run.model)
    }
}
