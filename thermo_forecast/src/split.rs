//! Chronological train/test split with optional smoothing of the train part

use crate::data::{Column, Dataset, TimeSeries, TimeSeriesTable};
use crate::error::{ForecastError, Result};
use crate::policy::AggregationPolicy;
use serde::{Deserialize, Serialize};
use thermo_math::rolling::rolling;
use thermo_math::Reducer;
use tracing::{debug, warn};

/// Rolling-window smoothing of the training partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingOptions {
    pub window: usize,
    /// Function for a single series; tables always use the policy
    #[serde(default)]
    pub function: Option<Reducer>,
}

impl SmoothingOptions {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            function: None,
        }
    }
}

/// How to split and whether to smooth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitOptions {
    pub training_pct: f64,
    pub smoothing: Option<SmoothingOptions>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            training_pct: 0.8,
            smoothing: None,
        }
    }
}

/// Index of the first test row
pub fn split_point(len: usize, training_pct: f64) -> Result<usize> {
    if !(training_pct > 0.0 && training_pct < 1.0) {
        return Err(ForecastError::ConfigError(format!(
            "training_pct must lie in (0, 1), got {}",
            training_pct
        )));
    }
    Ok((training_pct * len as f64).floor() as usize)
}

/// Split `data` into a train prefix and a test suffix.
///
/// Train holds rows `[0, floor(pct * N))`. When smoothing is enabled only
/// the train part is smoothed, and its first `window - 1` rows, which lack
/// a full window, are dropped.
pub fn prepare(
    data: &Dataset,
    options: &SplitOptions,
    policy: &AggregationPolicy,
) -> Result<(Dataset, Dataset)> {
    if let Dataset::Table(table) = data {
        if table.columns().is_empty() {
            return Err(ForecastError::ConfigError(
                "Cannot split a table without value columns".to_string(),
            ));
        }
    }

    let n = data.len();
    let split = split_point(n, options.training_pct)?;
    if split == 0 || split == n {
        return Err(ForecastError::DataError(format!(
            "Splitting {} rows at {} leaves an empty partition",
            n, options.training_pct
        )));
    }

    let train = data.slice(0..split);
    let test = data.slice(split..n);
    debug!(train = train.len(), test = test.len(), "split data");

    let train = match options.smoothing {
        Some(smoothing) => smooth(&train, &smoothing, policy)?,
        None => train,
    };

    // Smoothing may have excluded table columns; keep both sides aligned.
    let test = match (&train, test) {
        (Dataset::Table(smoothed), Dataset::Table(raw)) => {
            Dataset::Table(raw.select(&smoothed.column_names())?)
        }
        (_, test) => test,
    };

    Ok((train, test))
}

/// Trailing-window smoothing with the incomplete leading rows removed
pub fn smooth(
    data: &Dataset,
    smoothing: &SmoothingOptions,
    policy: &AggregationPolicy,
) -> Result<Dataset> {
    let window = smoothing.window;
    if window == 0 {
        return Err(ForecastError::ConfigError(
            "Smoothing window must be greater than zero".to_string(),
        ));
    }
    if window > data.len() {
        return Err(ForecastError::DataError(format!(
            "Smoothing window {} exceeds the {} training rows",
            window,
            data.len()
        )));
    }
    let trim = window - 1;

    let smoothed = match data {
        Dataset::Series(series) => {
            let reducer = smoothing
                .function
                .or_else(|| policy.get(series.name()))
                .ok_or_else(|| {
                    ForecastError::ConfigError(format!(
                        "No smoothing function for series '{}'",
                        series.name()
                    ))
                })?;
            let values = rolling(series.values(), window, reducer)?;
            Dataset::Series(TimeSeries::new(
                series.name(),
                series.index()[trim..].to_vec(),
                values[trim..].to_vec(),
            )?)
        }
        Dataset::Table(table) => {
            if let Some(target) = data.target_name() {
                if !policy.contains(target) {
                    return Err(ForecastError::ConfigError(format!(
                        "No smoothing function for target column '{}'",
                        target
                    )));
                }
            }
            let mut columns = Vec::with_capacity(table.columns().len());
            for c in table.columns() {
                match policy.get(&c.name) {
                    Some(reducer) => {
                        let values = rolling(&c.values, window, reducer)?;
                        columns.push(Column::new(c.name.clone(), values[trim..].to_vec()));
                    }
                    None => warn!(column = %c.name, "no smoothing function, column excluded"),
                }
            }
            Dataset::Table(TimeSeriesTable::new(
                table.index()[trim..].to_vec(),
                columns,
            )?)
        }
    };

    debug!(window, dropped = trim, rows = smoothed.len(), "smoothed training data");
    Ok(smoothed)
}
