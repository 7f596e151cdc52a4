//! Descriptive statistics, standardization and differencing

use crate::{MathError, Result};

/// Mean of the present observations, `NaN` when there are none
pub fn mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation (`ddof = 0`) of the present observations
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.is_nan() {
        return f64::NAN;
    }
    let (sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + (v - m).powi(2), c + 1));
    (sq / count as f64).sqrt()
}

/// Location and scale learned from a column, applied as `(x - mean) / scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    pub mean: f64,
    pub scale: f64,
}

impl Standardizer {
    /// Learn mean and population standard deviation from `values`.
    ///
    /// A constant column gets a unit scale so it maps to zeros instead of `NaN`.
    pub fn fit(values: &[f64]) -> Result<Self> {
        let m = mean(values);
        if m.is_nan() {
            return Err(MathError::InsufficientData(
                "Cannot standardize a column without observations".to_string(),
            ));
        }
        let sd = std_dev(values);
        let scale = if sd == 0.0 || !sd.is_finite() { 1.0 } else { sd };
        Ok(Self { mean: m, scale })
    }

    /// Leaves values unchanged
    pub fn identity() -> Self {
        Self { mean: 0.0, scale: 1.0 }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.mean) / self.scale).collect()
    }

    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.scale + self.mean).collect()
    }
}

/// First-order difference; the output is one element shorter than the input.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Difference `order` times; the output is `order` elements shorter.
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..order {
        out = diff(&out);
    }
    out
}

/// Undo `order` rounds of differencing for values that continue `history`.
///
/// `increments` are future values of the `order`-times differenced series;
/// the result holds the matching future levels of the original series.
pub fn integrate(increments: &[f64], history: &[f64], order: usize) -> Result<Vec<f64>> {
    if order == 0 {
        return Ok(increments.to_vec());
    }
    if history.len() < order {
        return Err(MathError::InsufficientData(format!(
            "Integrating order {} needs at least {} past levels, have {}",
            order,
            order,
            history.len()
        )));
    }

    // lasts[k] is the latest value of the k-times differenced series.
    let mut lasts: Vec<f64> = (0..order)
        .map(|k| {
            let d = difference(history, k);
            d[d.len() - 1]
        })
        .collect();

    let mut levels = Vec::with_capacity(increments.len());
    for &inc in increments {
        let mut carry = inc;
        for k in (0..order).rev() {
            carry += lasts[k];
            lasts[k] = carry;
        }
        levels.push(carry);
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std_ignore_missing() {
        let data = [2.0, 4.0, f64::NAN, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&data), 5.0);
        assert_relative_eq!(std_dev(&data), 2.0);
    }

    #[test]
    fn test_identity_standardizer_keeps_values() {
        let data = [1.5, f64::NAN, -2.0];
        let out = Standardizer::identity().transform(&data);
        assert_relative_eq!(out[0], 1.5);
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], -2.0);
    }

    #[test]
    fn test_standardizer_zero_mean_unit_variance() {
        let data = [10.0, 20.0, 30.0, 40.0, 50.0];
        let scaler = Standardizer::fit(&data).unwrap();
        let scaled = scaler.transform(&data);

        assert_relative_eq!(mean(&scaled), 0.0, epsilon = 1e-12);
        assert_relative_eq!(std_dev(&scaled), 1.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.inverse(&scaled)[3], 40.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let scaler = Standardizer::fit(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(scaler.transform(&[3.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_difference_orders() {
        let original = [1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&original, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&original, 2), vec![1.0, 1.0, 1.0]);
        assert_eq!(difference(&original, 0), original.to_vec());
    }

    #[test]
    fn test_integrate_inverts_difference() {
        let series = [1.0, 3.0, 6.0, 10.0, 15.0, 21.0, 28.0];
        for order in 0..3 {
            let d = difference(&series, order);
            let split = 4 - order;
            let restored = integrate(&d[split..], &series[..4], order).unwrap();
            assert_eq!(restored, series[4..].to_vec());
        }
    }
}
