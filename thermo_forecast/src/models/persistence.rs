//! Naive persistence baselines

use crate::data::Dataset;
use crate::error::Result;
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};

/// Predicts each value as the previous observation
#[derive(Debug, Clone, Default)]
pub struct PersistenceOptimistic;

/// Trained optimistic persistence model
#[derive(Debug, Clone)]
pub struct TrainedPersistenceOptimistic {
    last: f64,
}

impl ForecastModel for PersistenceOptimistic {
    type Trained = TrainedPersistenceOptimistic;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let values = non_empty_target(data)?;
        Ok(TrainedPersistenceOptimistic {
            last: values[values.len() - 1],
        })
    }

    fn name(&self) -> &str {
        "persistence-optimistic"
    }
}

impl TrainedPersistenceOptimistic {
    fn shifted(&self, values: &[f64]) -> Vec<f64> {
        std::iter::once(self.last)
            .chain(values.iter().copied().take(values.len().saturating_sub(1)))
            .take(values.len())
            .collect()
    }
}

impl TrainedForecastModel for TrainedPersistenceOptimistic {
    /// Without observations the best guess is the last one seen
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        ForecastResult::new(vec![self.last; horizons], horizons)
    }

    /// The input shifted by one, seeded with the last training value
    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        let values = self.shifted(data.target()?);
        let len = values.len();
        ForecastResult::new(values, len)
    }

    fn predict_holdout(&self, test: &Dataset) -> Result<ForecastResult> {
        self.predict(test)
    }

    fn name(&self) -> &str {
        "persistence-optimistic"
    }
}

/// Predicts every value as the last training observation
#[derive(Debug, Clone, Default)]
pub struct PersistenceRealist;

/// Trained realist persistence model
#[derive(Debug, Clone)]
pub struct TrainedPersistenceRealist {
    last: f64,
}

impl ForecastModel for PersistenceRealist {
    type Trained = TrainedPersistenceRealist;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let values = non_empty_target(data)?;
        Ok(TrainedPersistenceRealist {
            last: values[values.len() - 1],
        })
    }

    fn name(&self) -> &str {
        "persistence-realist"
    }
}

impl TrainedForecastModel for TrainedPersistenceRealist {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        ForecastResult::new(vec![self.last; horizons], horizons)
    }

    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        self.forecast(data.len())
    }

    fn observations(&self) -> Vec<String> {
        vec![format!("Prediction: {:.2}", self.last)]
    }

    fn name(&self) -> &str {
        "persistence-realist"
    }
}
