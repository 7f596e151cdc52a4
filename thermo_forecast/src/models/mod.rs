//! Forecasting models for battery telemetry
//!
//! Every model family is split in two: a [`ForecastModel`] holding the
//! hyperparameters, and the [`TrainedForecastModel`] it produces. The search
//! harness and the runners only talk to these two traits.

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use std::fmt::Debug;

/// Forecast result containing predicted values
///
/// `offset` counts the leading observations of the input that have no
/// prediction, for models that need some history before their first
/// estimate. Prediction `i` belongs to observation `offset + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    values: Vec<f64>,
    horizons: usize,
    offset: usize,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, horizons: usize) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::ConfigError(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        Ok(Self {
            values,
            horizons,
            offset: 0,
        })
    }

    /// Create a prediction that starts `offset` observations into its input
    pub fn with_offset(values: Vec<f64>, offset: usize) -> Self {
        Self {
            horizons: values.len(),
            values,
            offset,
        }
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// The part of `actual` these predictions line up with.
    ///
    /// `actual` must be exactly the input the prediction was made for.
    pub fn aligned<'a>(&self, actual: &'a [f64]) -> Result<&'a [f64]> {
        if actual.len() != self.offset + self.values.len() {
            return Err(ForecastError::MetricError(format!(
                "{} predictions starting at offset {} do not cover {} observations",
                self.values.len(),
                self.offset,
                actual.len()
            )));
        }
        Ok(&actual[self.offset..])
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for `horizons` periods after the training data
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// In-sample predictions for the training data
    fn predict(&self, data: &Dataset) -> Result<ForecastResult>;

    /// Predictions for the rows that follow the training data.
    ///
    /// Pure time-step forecasters ignore the values in `test` and forecast
    /// its length; models that read their input override this.
    fn predict_holdout(&self, test: &Dataset) -> Result<ForecastResult> {
        self.forecast(test.len())
    }

    /// Fitted quantities worth reporting
    fn observations(&self) -> Vec<String> {
        Vec::new()
    }

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on time series data
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on time series data
    fn train(&self, data: &Dataset) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub(crate) fn non_empty_target(data: &Dataset) -> Result<&[f64]> {
    let values = data.target()?;
    if values.is_empty() {
        return Err(ForecastError::EmptyData(
            "Cannot fit a model on an empty series".to_string(),
        ));
    }
    Ok(values)
}

pub mod arima;
pub mod exponential_smoothing;
pub mod linear_regression;
pub mod lstm;
pub mod persistence;
pub mod rolling_mean;
pub mod simple_average;
