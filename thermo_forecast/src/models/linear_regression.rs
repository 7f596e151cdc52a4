//! Straight-line trend over the sample index

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};
use thermo_math::regression::LinearRegression;

/// Regresses the target on `0..n`; the test rows continue at `n..n+m`
#[derive(Debug, Clone, Default)]
pub struct TrendRegression;

#[derive(Debug, Clone)]
pub struct TrainedTrendRegression {
    line: LinearRegression,
}

impl ForecastModel for TrendRegression {
    type Trained = TrainedTrendRegression;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let line = LinearRegression::fit(non_empty_target(data)?)
            .map_err(|e| ForecastError::FitError(e.to_string()))?;
        Ok(TrainedTrendRegression { line })
    }

    fn name(&self) -> &str {
        "linear-regression"
    }
}

impl TrainedTrendRegression {
    pub fn intercept(&self) -> f64 {
        self.line.intercept()
    }

    pub fn slope(&self) -> f64 {
        self.line.slope()
    }
}

impl TrainedForecastModel for TrainedTrendRegression {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let start = self.line.len();
        let values = (start..start + horizons)
            .map(|t| self.line.at(t as f64))
            .collect();
        ForecastResult::new(values, horizons)
    }

    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        let values: Vec<f64> = (0..data.len()).map(|t| self.line.at(t as f64)).collect();
        let len = values.len();
        ForecastResult::new(values, len)
    }

    fn observations(&self) -> Vec<String> {
        vec![
            format!("Intercept: {:.2}", self.intercept()),
            format!("Coef: {:.2}", self.slope()),
        ]
    }

    fn name(&self) -> &str {
        "linear-regression"
    }
}
