//! Trailing rolling-window aggregation
//!
//! The output of [`rolling`] has the same length as its input. The first
//! `window - 1` positions have no complete window and hold `NaN`, as does
//! any position whose window contains a missing observation.

use std::collections::VecDeque;

use crate::reducers::Reducer;
use crate::{MathError, Result};

/// Trailing window over a stream of observations
#[derive(Debug, Clone)]
pub struct RollingWindow {
    size: usize,
    reducer: Reducer,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new rolling window of `size` observations
    pub fn new(size: usize, reducer: Reducer) -> Result<Self> {
        if size == 0 {
            return Err(MathError::InvalidInput(
                "Window size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            size,
            reducer,
            values: VecDeque::with_capacity(size),
        })
    }

    /// Push a new observation, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.size {
            self.values.pop_front();
        }
    }

    /// Whether `size` observations have been seen
    pub fn is_full(&self) -> bool {
        self.values.len() == self.size
    }

    /// Aggregate of the current window, `NaN` until the window is full
    pub fn value(&self) -> f64 {
        if !self.is_full() {
            return f64::NAN;
        }
        let (front, back) = self.values.as_slices();
        if back.is_empty() {
            self.reducer.reduce_complete(front)
        } else {
            let joined: Vec<f64> = self.values.iter().copied().collect();
            self.reducer.reduce_complete(&joined)
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset the window, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

/// Apply a trailing window of `window` observations to `values`.
pub fn rolling(values: &[f64], window: usize, reducer: Reducer) -> Result<Vec<f64>> {
    let mut state = RollingWindow::new(window, reducer)?;
    Ok(values
        .iter()
        .map(|&v| {
            state.update(v);
            state.value()
        })
        .collect())
}

/// Mean of the last `window` entries of `values` (fewer if `values` is shorter).
pub fn tail_mean(values: &[f64], window: usize) -> f64 {
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    if tail.is_empty() {
        return f64::NAN;
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_mean() {
        let data = [10.0, 20.0, 30.0, 40.0, 50.0];
        let out = rolling(&data, 3, Reducer::Mean).unwrap();

        assert_eq!(out.len(), data.len());
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 20.0);
        assert_eq!(out[4], 40.0);
    }

    #[test]
    fn test_rolling_max_with_gap() {
        let data = [1.0, 5.0, f64::NAN, 2.0, 3.0, 1.0];
        let out = rolling(&data, 2, Reducer::Max).unwrap();

        assert_eq!(out[1], 5.0);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert_eq!(out[4], 3.0);
        assert_eq!(out[5], 3.0);
    }

    #[test]
    fn test_window_of_one_is_identity() {
        let data = [4.0, 2.0, 9.0];
        assert_eq!(rolling(&data, 1, Reducer::Median).unwrap(), data.to_vec());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(rolling(&[1.0], 0, Reducer::Mean).is_err());
    }

    #[test]
    fn test_tail_mean() {
        assert_eq!(tail_mean(&[1.0, 2.0, 3.0, 4.0], 2), 3.5);
        assert_eq!(tail_mean(&[1.0, 2.0], 5), 1.5);
        assert!(tail_mean(&[], 3).is_nan());
    }
}
