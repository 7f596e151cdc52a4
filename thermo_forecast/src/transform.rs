//! Scaling, aggregation and differentiation of a table
//!
//! [`transform`] always applies the enabled stages in the same order:
//! scaling, then aggregation, then differentiation. No stage reorders rows.

use crate::data::{Column, TimeSeriesTable};
use crate::error::{ForecastError, Result};
use crate::policy::AggregationPolicy;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thermo_math::stats::{diff, Standardizer};
use tracing::{debug, warn};

/// Time-bucket width used by aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
    /// Weeks start on Monday
    Week,
    Month,
}

impl Granularity {
    /// Start of the bucket containing `t`
    pub fn bucket(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = |d: DateTime<Utc>| {
            Utc.with_ymd_and_hms(d.year(), d.month(), d.day(), 0, 0, 0)
                .single()
                .unwrap_or(d)
        };
        match self {
            Granularity::Minute => t
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t),
            Granularity::Hour => t
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t),
            Granularity::Day => midnight(t),
            Granularity::Week => {
                midnight(t) - Duration::days(i64::from(t.weekday().num_days_from_monday()))
            }
            Granularity::Month => Utc
                .with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(t),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Minute => "min",
            Granularity::Hour => "h",
            Granularity::Day => "d",
            Granularity::Week => "W",
            Granularity::Month => "M",
        }
    }
}

impl FromStr for Granularity {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min" | "T" | "minute" => Ok(Granularity::Minute),
            "h" | "H" | "hour" => Ok(Granularity::Hour),
            "d" | "D" | "day" => Ok(Granularity::Day),
            "W" | "w" | "week" => Ok(Granularity::Week),
            "M" | "MS" | "month" => Ok(Granularity::Month),
            other => Err(ForecastError::ConfigError(format!(
                "Unknown aggregation rule '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.as_str().to_string()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which transform stages are enabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformConfig {
    pub scaling: bool,
    pub aggregation: Option<Granularity>,
    pub differentiation: bool,
}

/// Per-column standardizers learned from one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableScaler {
    scalers: Vec<(String, Standardizer)>,
}

impl TableScaler {
    /// Learn mean and population standard deviation of every column.
    ///
    /// A column without observations passes through unchanged.
    pub fn fit(table: &TimeSeriesTable) -> Result<Self> {
        let scalers = table
            .columns()
            .iter()
            .map(|c| {
                let scaler = if c.values.iter().all(|v| v.is_nan()) {
                    warn!(column = %c.name, "no observations to scale, keeping column as is");
                    Standardizer::identity()
                } else {
                    Standardizer::fit(&c.values)?
                };
                Ok((c.name.clone(), scaler))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { scalers })
    }

    /// Standardize every column that was seen during `fit`
    pub fn transform(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
        let columns = table
            .columns()
            .iter()
            .map(|c| {
                let scaler = self
                    .scalers
                    .iter()
                    .find(|(name, _)| *name == c.name)
                    .map(|(_, s)| s)
                    .ok_or_else(|| {
                        ForecastError::ConfigError(format!(
                            "Column '{}' was not seen when fitting the scaler",
                            c.name
                        ))
                    })?;
                Ok(Column::new(c.name.clone(), scaler.transform(&c.values)))
            })
            .collect::<Result<Vec<_>>>()?;
        TimeSeriesTable::new(table.index().to_vec(), columns)
    }

    pub fn get(&self, column: &str) -> Option<&Standardizer> {
        self.scalers
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, s)| s)
    }
}

/// Standardize every column with statistics of the whole table.
///
/// The statistics include rows that later end up in the test partition.
pub fn scale(table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
    TableScaler::fit(table)?.transform(table)
}

/// Resample to `granularity`, reducing each column with its policy entry.
///
/// Columns without a policy entry are dropped. Only buckets that contain at
/// least one row appear in the output.
pub fn aggregate(
    table: &TimeSeriesTable,
    granularity: Granularity,
    policy: &AggregationPolicy,
) -> Result<TimeSeriesTable> {
    let kept: Vec<(&Column, thermo_math::Reducer)> = table
        .columns()
        .iter()
        .filter_map(|c| match policy.get(&c.name) {
            Some(reducer) => Some((c, reducer)),
            None => {
                debug!(column = %c.name, "column has no aggregation function, excluded");
                None
            }
        })
        .collect();

    let mut index = Vec::new();
    let mut bounds = Vec::new();
    let mut start = 0;
    for i in 0..table.len() {
        let bucket = granularity.bucket(table.index()[i]);
        let next = table.index().get(i + 1).map(|t| granularity.bucket(*t));
        if next != Some(bucket) {
            index.push(bucket);
            bounds.push(start..i + 1);
            start = i + 1;
        }
    }

    let columns = kept
        .into_iter()
        .map(|(c, reducer)| {
            Column::new(
                c.name.clone(),
                bounds
                    .iter()
                    .map(|r| reducer.reduce(&c.values[r.clone()]))
                    .collect(),
            )
        })
        .collect();

    TimeSeriesTable::new(index, columns)
}

/// First-order difference of every column; the first row is dropped.
pub fn differentiate(table: &TimeSeriesTable) -> Result<TimeSeriesTable> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    let columns = table
        .columns()
        .iter()
        .map(|c| Column::new(c.name.clone(), diff(&c.values)))
        .collect();
    TimeSeriesTable::new(table.index()[1..].to_vec(), columns)
}

/// Apply the enabled stages in their fixed order
pub fn transform(
    table: &TimeSeriesTable,
    config: &TransformConfig,
    policy: &AggregationPolicy,
) -> Result<TimeSeriesTable> {
    let mut out = table.clone();

    if config.scaling {
        out = scale(&out)?;
        debug!("applied scaling");
    }
    if let Some(granularity) = config.aggregation {
        out = aggregate(&out, granularity, policy)?;
        debug!(rule = %granularity, rows = out.len(), "applied aggregation");
    }
    if config.differentiation {
        out = differentiate(&out)?;
        debug!(rows = out.len(), "applied differentiation");
    }

    Ok(out)
}
