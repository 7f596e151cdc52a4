//! Training-mean baseline

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};
use thermo_math::stats::mean;

#[derive(Debug, Clone, Default)]
pub struct SimpleAverage;

#[derive(Debug, Clone)]
pub struct TrainedSimpleAverage {
    mean: f64,
}

impl ForecastModel for SimpleAverage {
    type Trained = TrainedSimpleAverage;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let mean = mean(non_empty_target(data)?);
        if !mean.is_finite() {
            return Err(ForecastError::FitError(
                "Training mean is not finite".to_string(),
            ));
        }
        Ok(TrainedSimpleAverage { mean })
    }

    fn name(&self) -> &str {
        "simple-average"
    }
}

impl TrainedForecastModel for TrainedSimpleAverage {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        ForecastResult::new(vec![self.mean; horizons], horizons)
    }

    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        self.forecast(data.len())
    }

    fn observations(&self) -> Vec<String> {
        vec![format!("Prediction: {:.2}", self.mean)]
    }

    fn name(&self) -> &str {
        "simple-average"
    }
}
