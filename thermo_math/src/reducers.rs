//! Aggregation functions applied to a bucket or a window of observations
//!
//! Reducers skip missing observations, the way grouped aggregation does on
//! a data frame. An all-missing bucket reduces to `NaN` for every reducer
//! except [`Reducer::Sum`], which reduces to `0.0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{MathError, Result};

/// Aggregation function identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Max,
    Min,
    Mean,
    Median,
    Sum,
}

impl Reducer {
    /// Reduce `values`, ignoring missing observations.
    pub fn reduce(&self, values: &[f64]) -> f64 {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        self.reduce_present(&present)
    }

    /// Reduce `values` only when every observation is present.
    ///
    /// This is the rolling-window contract: a window containing a gap has no
    /// aggregate.
    pub fn reduce_complete(&self, values: &[f64]) -> f64 {
        if values.is_empty() || values.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        self.reduce_present(values)
    }

    fn reduce_present(&self, present: &[f64]) -> f64 {
        if present.is_empty() {
            return match self {
                Reducer::Sum => 0.0,
                _ => f64::NAN,
            };
        }

        match self {
            Reducer::Max => present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Min => present.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Sum => present.iter().sum(),
            Reducer::Mean => present.iter().sum::<f64>() / present.len() as f64,
            Reducer::Median => median(present),
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Max => "max",
            Reducer::Min => "min",
            Reducer::Mean => "mean",
            Reducer::Median => "median",
            Reducer::Sum => "sum",
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reducer {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Reducer::Max),
            "min" => Ok(Reducer::Min),
            "mean" => Ok(Reducer::Mean),
            "median" => Ok(Reducer::Median),
            "sum" => Ok(Reducer::Sum),
            other => Err(MathError::InvalidInput(format!(
                "Unknown aggregation function '{}'",
                other
            ))),
        }
    }
}

fn median(present: &[f64]) -> f64 {
    let mut sorted = present.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducers_skip_missing() {
        let values = [3.0, f64::NAN, 1.0, 4.0];
        assert_eq!(Reducer::Max.reduce(&values), 4.0);
        assert_eq!(Reducer::Min.reduce(&values), 1.0);
        assert_eq!(Reducer::Sum.reduce(&values), 8.0);
        assert!((Reducer::Mean.reduce(&values) - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(Reducer::Median.reduce(&values), 3.0);
    }

    #[test]
    fn test_even_median() {
        assert_eq!(Reducer::Median.reduce(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_all_missing_bucket() {
        let values = [f64::NAN, f64::NAN];
        assert!(Reducer::Mean.reduce(&values).is_nan());
        assert!(Reducer::Max.reduce(&values).is_nan());
        assert_eq!(Reducer::Sum.reduce(&values), 0.0);
    }

    #[test]
    fn test_complete_window_rejects_gaps() {
        assert!(Reducer::Mean.reduce_complete(&[1.0, f64::NAN]).is_nan());
        assert_eq!(Reducer::Mean.reduce_complete(&[1.0, 3.0]), 2.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("MAX".parse::<Reducer>().unwrap(), Reducer::Max);
        assert_eq!("median".parse::<Reducer>().unwrap(), Reducer::Median);
        assert!("mode".parse::<Reducer>().is_err());
    }
}
