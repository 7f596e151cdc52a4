//! Rolling-mean forecaster

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};
use thermo_math::rolling::{rolling, tail_mean};
use thermo_math::Reducer;

/// Window sizes tried by the search, in order
pub const WINDOW_GRID: [usize; 8] = [12, 24, 36, 48, 96, 192, 384, 768];

/// Mean of the previous `window` values
#[derive(Debug, Clone)]
pub struct RollingMean {
    name: String,
    window: usize,
}

/// Trained rolling mean, remembering the last `window` observations
#[derive(Debug, Clone)]
pub struct TrainedRollingMean {
    name: String,
    window: usize,
    memory: Vec<f64>,
}

impl RollingMean {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ForecastError::ConfigError(
                "Window size must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("rolling-mean(window={})", window),
            window,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl ForecastModel for RollingMean {
    type Trained = TrainedRollingMean;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let values = non_empty_target(data)?;
        if values.len() <= self.window {
            return Err(ForecastError::FitError(format!(
                "Window {} needs more than {} training observations",
                self.window,
                values.len()
            )));
        }

        Ok(TrainedRollingMean {
            name: self.name.clone(),
            window: self.window,
            memory: values[values.len() - self.window..].to_vec(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for TrainedRollingMean {
    /// Each step is the mean of the `window` values before it, feeding
    /// earlier forecasts back in once the observations run out.
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let mut history = self.memory.clone();
        for _ in 0..horizons {
            let next = tail_mean(&history, self.window);
            history.push(next);
        }
        let values = history.split_off(self.window);
        ForecastResult::new(values, horizons)
    }

    /// Trailing mean of the previous `window` actuals; the first `window`
    /// observations have no prediction.
    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        let values = data.target()?;
        if values.len() <= self.window {
            return Err(ForecastError::DataError(format!(
                "Window {} needs more than {} observations",
                self.window,
                values.len()
            )));
        }
        let means = rolling(values, self.window, Reducer::Mean)?;
        // Mean ending at t - 1 predicts t.
        let predictions = means[self.window - 1..values.len() - 1].to_vec();
        Ok(ForecastResult::with_offset(predictions, self.window))
    }

    fn observations(&self) -> Vec<String> {
        vec![format!("window: {}", self.window)]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
