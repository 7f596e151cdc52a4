//! Simple exponential smoothing with a fixed smoothing level

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};

/// Smoothing levels tried by the search, in order
pub const ALPHA_GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Simple exponential smoothing model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    /// Name of the model
    name: String,
    /// Smoothing parameter
    alpha: f64,
}

/// Trained exponential smoothing model
#[derive(Debug, Clone)]
pub struct TrainedExponentialSmoothing {
    name: String,
    alpha: f64,
    /// Level at the start of the training data
    initial_level: f64,
    /// Level after the last training observation
    level: f64,
}

impl ExponentialSmoothing {
    /// Create a new exponential smoothing model
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(ForecastError::ConfigError(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            name: format!("exponential-smoothing(alpha={})", alpha),
            alpha,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl ForecastModel for ExponentialSmoothing {
    type Trained = TrainedExponentialSmoothing;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let values = non_empty_target(data)?;

        // Initialize level with first observation
        let initial_level = values[0];
        let level = values[1..]
            .iter()
            .fold(initial_level, |level, &v| self.alpha * v + (1.0 - self.alpha) * level);

        if !level.is_finite() {
            return Err(ForecastError::FitError(
                "Smoothed level is not finite".to_string(),
            ));
        }

        Ok(TrainedExponentialSmoothing {
            name: self.name.clone(),
            alpha: self.alpha,
            initial_level,
            level,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for TrainedExponentialSmoothing {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        // The forecast is flat at the final level
        ForecastResult::new(vec![self.level; horizons], horizons)
    }

    /// One-step-ahead fitted values; the first is the initial level
    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        let values = data.target()?;
        let mut predictions = Vec::with_capacity(values.len());
        let mut level = self.initial_level;
        for &v in values {
            predictions.push(level);
            level = self.alpha * v + (1.0 - self.alpha) * level;
        }
        let len = predictions.len();
        ForecastResult::new(predictions, len)
    }

    fn observations(&self) -> Vec<String> {
        vec![format!("alpha: {}", self.alpha)]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
