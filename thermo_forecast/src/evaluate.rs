//! Forecast accuracy metrics
//!
//! Every metric takes paired actual/predicted sequences of equal, non-zero
//! length with no missing values. Anything else is a [`ForecastError::MetricError`];
//! a `NaN` is never rounded away into a plausible number.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places kept in reports
pub const REPORT_PRECISION: i32 = 2;

/// Accuracy metric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "RMSE")]
    Rmse,
    #[serde(rename = "MAE")]
    Mae,
    #[serde(rename = "MAPE")]
    Mape,
    #[serde(rename = "R2")]
    R2,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Rmse, Metric::Mae, Metric::Mape, Metric::R2];

    /// Whether larger values mean a better fit
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::R2)
    }

    /// Unrounded metric value
    pub fn compute(&self, actual: &[f64], predicted: &[f64]) -> Result<f64> {
        check_pairs(actual, predicted)?;
        let n = actual.len() as f64;
        let value = match self {
            Metric::Rmse => {
                let mse = pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n;
                mse.sqrt()
            }
            Metric::Mae => pairs(actual, predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n,
            Metric::Mape => {
                pairs(actual, predicted)
                    .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
                    .sum::<f64>()
                    / n
            }
            Metric::R2 => {
                let mean = actual.iter().sum::<f64>() / n;
                let ss_res: f64 = pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)).sum();
                let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
                if ss_tot == 0.0 {
                    if ss_res == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    1.0 - ss_res / ss_tot
                }
            }
        };
        Ok(value)
    }

    /// Metric value rounded to [`REPORT_PRECISION`] places, as reported
    pub fn evaluate(&self, actual: &[f64], predicted: &[f64]) -> Result<f64> {
        Ok(round_to(self.compute(actual, predicted)?, REPORT_PRECISION))
    }

    /// Value oriented so that larger is always better
    pub fn score(&self, value: f64) -> f64 {
        if self.higher_is_better() {
            value
        } else {
            -value
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Rmse => "RMSE",
            Metric::Mae => "MAE",
            Metric::Mape => "MAPE",
            Metric::R2 => "R2",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "RMSE" => Ok(Metric::Rmse),
            "MAE" => Ok(Metric::Mae),
            "MAPE" => Ok(Metric::Mape),
            "R2" => Ok(Metric::R2),
            other => Err(ForecastError::ConfigError(format!("Unknown metric '{}'", other))),
        }
    }
}

fn pairs<'a>(actual: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    actual.iter().copied().zip(predicted.iter().copied())
}

fn check_pairs(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::MetricError(format!(
            "Actual has {} values but prediction has {}",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(ForecastError::MetricError(
            "Cannot score an empty sequence".to_string(),
        ));
    }
    if let Some(pos) = actual.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::MetricError(format!(
            "Actual value at position {} is not finite",
            pos
        )));
    }
    if let Some(pos) = predicted.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::MetricError(format!(
            "Predicted value at position {} is not finite",
            pos
        )));
    }
    Ok(())
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// The four metrics for one partition, rounded for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "MAPE")]
    pub mape: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
}

impl MetricSet {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            rmse: Metric::Rmse.evaluate(actual, predicted)?,
            mae: Metric::Mae.evaluate(actual, predicted)?,
            mape: Metric::Mape.evaluate(actual, predicted)?,
            r2: Metric::R2.evaluate(actual, predicted)?,
        })
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Rmse => self.rmse,
            Metric::Mae => self.mae,
            Metric::Mape => self.mape,
            Metric::R2 => self.r2,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Train and test metrics of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train: Option<MetricSet>,
    pub test: MetricSet,
}

/// Score test predictions, and train predictions when there are any
pub fn evaluate(
    train_actual: &[f64],
    test_actual: &[f64],
    train_pred: Option<&[f64]>,
    test_pred: &[f64],
) -> Result<EvaluationReport> {
    let test = MetricSet::compute(test_actual, test_pred)?;
    let train = match train_pred {
        Some(pred) => Some(MetricSet::compute(train_actual, pred)?),
        None => None,
    };
    Ok(EvaluationReport { train, test })
}
