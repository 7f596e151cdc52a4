//! ARIMA models for time series forecasting
//!
//! Coefficients are estimated with the two-stage Hannan-Rissanen procedure:
//! a long autoregression supplies innovation estimates, then one least-squares
//! regression of the differenced series on its own lags and the lagged
//! innovations yields the AR and MA coefficients together.

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{non_empty_target, ForecastModel, ForecastResult, TrainedForecastModel};
use thermo_math::regression::{dot, least_squares};
use thermo_math::stats::{difference, integrate};

/// Differencing orders, searched outermost
pub const D_VALUES: [usize; 3] = [0, 1, 2];
/// Moving-average orders
pub const Q_VALUES: [usize; 4] = [1, 3, 5, 7];
/// Autoregressive orders, searched innermost
pub const P_VALUES: [usize; 6] = [1, 2, 3, 5, 7, 10];

/// Every `(p, d, q)` in search order: d, then q, then p
pub fn order_grid() -> Vec<(usize, usize, usize)> {
    let mut grid = Vec::with_capacity(D_VALUES.len() * Q_VALUES.len() * P_VALUES.len());
    for d in D_VALUES {
        for q in Q_VALUES {
            for p in P_VALUES {
                grid.push((p, d, q));
            }
        }
    }
    grid
}

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// Differencing order (d)
    d: usize,
    /// MA order (q)
    q: usize,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    name: String,
    p: usize,
    d: usize,
    q: usize,
    /// Constant term, zero whenever the series is differenced
    intercept: f64,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Last `d + 1` training levels, for undoing the differencing
    level_tail: Vec<f64>,
    /// Last `p` values of the differenced training series
    diff_tail: Vec<f64>,
    /// Last `q` one-step residuals on the training series
    residual_tail: Vec<f64>,
}

impl ArimaModel {
    /// Create a new ARIMA model
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            name: format!("ARIMA({},{},{})", p, d, q),
            p,
            d,
            q,
        }
    }

    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    /// Order of the long autoregression used in the first stage
    fn long_ar_order(&self) -> usize {
        (2 * (self.p + self.q)).max(4)
    }

    fn fit_long_ar(&self, w: &[f64]) -> Result<Vec<f64>> {
        let m = self.long_ar_order();
        let rows: Vec<Vec<f64>> = (m..w.len())
            .map(|t| {
                std::iter::once(1.0)
                    .chain((1..=m).map(|j| w[t - j]))
                    .collect()
            })
            .collect();
        let targets = &w[m..];
        let beta = least_squares(&rows, targets).map_err(fit_error)?;

        let mut innovations = vec![0.0; w.len()];
        for (t, row) in (m..w.len()).zip(&rows) {
            innovations[t] = w[t] - dot(row, &beta);
        }
        Ok(innovations)
    }
}

fn fit_error(e: thermo_math::MathError) -> ForecastError {
    ForecastError::FitError(e.to_string())
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArimaModel;

    fn train(&self, data: &Dataset) -> Result<TrainedArimaModel> {
        let levels = non_empty_target(data)?;
        let w = difference(levels, self.d);
        let with_intercept = self.d == 0;
        let k = self.p + self.q + usize::from(with_intercept);
        if k == 0 {
            return Err(ForecastError::ConfigError(format!(
                "{} has no coefficients to estimate",
                self.name
            )));
        }

        let start = if self.q > 0 {
            self.long_ar_order() + self.q
        } else {
            self.p
        }
        .max(self.p);
        let mut needed = start + k + 1;
        if self.q > 0 {
            needed = needed.max(2 * self.long_ar_order() + 2);
        }
        if w.len() < needed {
            return Err(ForecastError::FitError(format!(
                "Insufficient data for {}. Need at least {} observations after differencing, have {}.",
                self.name,
                needed,
                w.len()
            )));
        }

        let innovations = if self.q > 0 {
            self.fit_long_ar(&w)?
        } else {
            vec![0.0; w.len()]
        };

        let rows: Vec<Vec<f64>> = (start..w.len())
            .map(|t| {
                let mut row = Vec::with_capacity(k);
                if with_intercept {
                    row.push(1.0);
                }
                row.extend((1..=self.p).map(|i| w[t - i]));
                row.extend((1..=self.q).map(|j| innovations[t - j]));
                row
            })
            .collect();
        let beta = least_squares(&rows, &w[start..]).map_err(fit_error)?;

        let (intercept, rest) = if with_intercept {
            (beta[0], &beta[1..])
        } else {
            (0.0, &beta[..])
        };
        let ar_coefficients = rest[..self.p].to_vec();
        let ma_coefficients = rest[self.p..].to_vec();

        let mut trained = TrainedArimaModel {
            name: self.name.clone(),
            p: self.p,
            d: self.d,
            q: self.q,
            intercept,
            ar_coefficients,
            ma_coefficients,
            level_tail: levels[levels.len().saturating_sub(self.d + 1)..].to_vec(),
            diff_tail: w[w.len() - self.p..].to_vec(),
            residual_tail: Vec::new(),
        };

        let residuals = trained.residuals(&w)?;
        trained.residual_tail = residuals[residuals.len() - self.q..].to_vec();
        Ok(trained)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedArimaModel {
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    fn step(&self, w_lags: &[f64], e_lags: &[f64]) -> f64 {
        // Lags are ordered oldest first; coefficient i multiplies lag i + 1.
        let ar: f64 = self
            .ar_coefficients
            .iter()
            .zip(w_lags.iter().rev())
            .map(|(c, v)| c * v)
            .sum();
        let ma: f64 = self
            .ma_coefficients
            .iter()
            .zip(e_lags.iter().rev())
            .map(|(c, v)| c * v)
            .sum();
        self.intercept + ar + ma
    }

    /// One-step residuals of the differenced series; zero before lag `p`
    fn residuals(&self, w: &[f64]) -> Result<Vec<f64>> {
        let mut e = vec![0.0; w.len()];
        for t in self.p..w.len() {
            let lo = t.saturating_sub(self.q);
            let pred = self.step(&w[t - self.p..t], &e[lo..t]);
            e[t] = w[t] - pred;
            if !e[t].is_finite() {
                return Err(ForecastError::FitError(format!(
                    "{} residuals diverge",
                    self.name
                )));
            }
        }
        Ok(e)
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let mut w = self.diff_tail.clone();
        let mut e = self.residual_tail.clone();
        let mut increments = Vec::with_capacity(horizons);

        for _ in 0..horizons {
            let next = self.step(&w[w.len() - self.p..], &e[e.len() - self.q..]);
            w.push(next);
            e.push(0.0);
            increments.push(next);
        }

        let values = integrate(&increments, &self.level_tail, self.d)?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::FitError(format!(
                "{} forecast diverges",
                self.name
            )));
        }
        ForecastResult::new(values, horizons)
    }

    /// One-step-ahead predictions; the first `d + p` observations have none.
    ///
    /// A one-step error on the differenced series is the same error on the
    /// levels, so each prediction is the observation minus its residual.
    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        let levels = data.target()?;
        let offset = self.d + self.p;
        if levels.len() <= offset {
            return Err(ForecastError::DataError(format!(
                "{} needs more than {} observations to predict",
                self.name, offset
            )));
        }
        let w = difference(levels, self.d);
        let e = self.residuals(&w)?;
        let values = (self.p..w.len())
            .map(|t| levels[t + self.d] - e[t])
            .collect();
        Ok(ForecastResult::with_offset(values, offset))
    }

    fn observations(&self) -> Vec<String> {
        let fmt = |cs: &[f64]| {
            cs.iter()
                .map(|c| format!("{:.4}", c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        vec![
            format!("order (p, d, q): ({}, {}, {})", self.p, self.d, self.q),
            format!("intercept: {:.4}", self.intercept),
            format!("ar: [{}]", fmt(&self.ar_coefficients)),
            format!("ma: [{}]", fmt(&self.ma_coefficients)),
        ]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
