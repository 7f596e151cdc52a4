//! Dataset profiling: size summary and a unit-root test
//!
//! The Augmented Dickey-Fuller regression is
//! `dy_t = a + g * y_{t-1} + sum_i b_i * dy_{t-i} + e_t` with a fixed lag
//! order. The statistic is `g / se(g)`; critical values come from
//! MacKinnon's response surface for the constant-only case.

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use crate::policy::AggregationPolicy;
use crate::transform::{aggregate, Granularity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thermo_math::regression::ols_with_stderr;
use thermo_math::stats::diff;
use tracing::info;

/// MacKinnon (2010) coefficients `[b0, b1, b2]` for 1%, 5% and 10%
const MACKINNON_CONSTANT: [[f64; 3]; 3] = [
    [-3.43035, -6.5393, -16.786],
    [-2.86154, -2.8903, -4.234],
    [-2.56677, -1.5384, -2.809],
];

/// Row count and time span of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimensionality {
    pub records: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub fn dimensionality(table: &TimeSeriesTable) -> Dimensionality {
    Dimensionality {
        records: table.len(),
        start: table.index().first().copied(),
        end: table.index().last().copied(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalValues {
    pub one: f64,
    pub five: f64,
    pub ten: f64,
}

impl CriticalValues {
    /// Critical values for a regression on `nobs` observations
    pub fn for_nobs(nobs: usize) -> Self {
        let n = nobs as f64;
        let at = |c: [f64; 3]| c[0] + c[1] / n + c[2] / (n * n);
        Self {
            one: at(MACKINNON_CONSTANT[0]),
            five: at(MACKINNON_CONSTANT[1]),
            ten: at(MACKINNON_CONSTANT[2]),
        }
    }
}

/// Outcome of an Augmented Dickey-Fuller test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub lags: usize,
    /// Observations used in the regression
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

impl AdfResult {
    /// Unit root rejected at the 5% level
    pub fn is_stationary(&self) -> bool {
        self.statistic < self.critical_values.five
    }
}

/// `12 * (n / 100)^(1/4)`, rounded up
pub fn default_lag_order(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Augmented Dickey-Fuller test with a constant
pub fn adf_test(values: &[f64], lags: Option<usize>) -> Result<AdfResult> {
    if values.is_empty() {
        return Err(ForecastError::EmptyData(
            "Cannot test an empty series for stationarity".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::DataError(
            "Stationarity test input contains missing values".to_string(),
        ));
    }

    let dy = diff(values);
    // Keep at least a handful of rows for the regression.
    let max_lags = (dy.len() / 2).saturating_sub(3);
    let lags = lags.unwrap_or_else(|| default_lag_order(values.len())).min(max_lags);

    let rows: Vec<Vec<f64>> = (lags..dy.len())
        .map(|t| {
            let mut row = vec![1.0, values[t]];
            row.extend((1..=lags).map(|i| dy[t - i]));
            row
        })
        .collect();
    let targets = &dy[lags.min(dy.len())..];

    let fit = ols_with_stderr(&rows, targets)?;
    let se = fit.std_errors[1];
    if se <= 0.0 || !se.is_finite() {
        return Err(ForecastError::DataError(
            "Stationarity test is undefined for a constant series".to_string(),
        ));
    }

    let nobs = rows.len();
    let result = AdfResult {
        statistic: fit.coefficients[1] / se,
        lags,
        nobs,
        critical_values: CriticalValues::for_nobs(nobs),
    };
    info!(
        statistic = result.statistic,
        lags,
        nobs,
        stationary = result.is_stationary(),
        "adf test"
    );
    Ok(result)
}

/// Summary printed by `thermocast profile`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub target: String,
    pub dimensionality: Dimensionality,
    pub adf: AdfResult,
}

/// Profile `target`, optionally after aggregating to `rule`
pub fn profile(
    table: &TimeSeriesTable,
    target: &str,
    rule: Option<Granularity>,
    policy: &AggregationPolicy,
) -> Result<Profile> {
    let table = match rule {
        Some(g) => aggregate(table, g, policy)?,
        None => table.clone(),
    };
    let series = table.series(target)?;
    Ok(Profile {
        target: target.to_string(),
        dimensionality: dimensionality(&table),
        adf: adf_test(series.values(), None)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn critical_values_follow_response_surface() {
        let cv = CriticalValues::for_nobs(100);
        assert_relative_eq!(cv.five, -2.86154 - 0.028903 - 0.0004234, epsilon = 1e-9);
        assert!(cv.one < cv.five && cv.five < cv.ten);
    }

    #[test]
    fn default_lags_for_hundred_points() {
        assert_eq!(default_lag_order(100), 12);
    }

    #[test]
    fn empty_series_is_explicit() {
        assert!(matches!(adf_test(&[], None), Err(ForecastError::EmptyData(_))));
    }

    #[test]
    fn mean_reverting_series_is_stationary() {
        // Deterministic AR(1) with coefficient 0.2 driven by a bounded sequence
        let mut y = vec![0.0];
        for t in 1..300 {
            let shock = ((t * 7919) % 101) as f64 / 50.0 - 1.0;
            y.push(0.2 * y[t - 1] + shock);
        }
        let result = adf_test(&y, Some(1)).unwrap();
        assert!(result.is_stationary(), "statistic {}", result.statistic);
    }

    #[test]
    fn explosive_series_is_not_stationary() {
        let mut y = vec![0.0];
        for t in 1..300 {
            let shock = ((t * 7919) % 101) as f64 / 50.0 - 1.0;
            y.push(1.01 * y[t - 1] + shock);
        }
        let result = adf_test(&y, Some(1)).unwrap();
        assert!(!result.is_stationary(), "statistic {}", result.statistic);
    }
}
