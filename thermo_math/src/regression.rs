//! Ordinary least squares
//!
//! [`least_squares`] solves the normal equations with partial-pivot
//! Gaussian elimination, which is enough for the handful of regressors the
//! autoregressive fits and the unit-root test need. [`LinearRegression`]
//! is the special case of a straight line over the sample index.

use crate::{MathError, Result};

/// Coefficients of an OLS fit together with their standard errors
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub residual_variance: f64,
}

/// Solve `min ||X b - y||²` for `b`, where `rows` are the rows of `X`.
pub fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>> {
    let (xtx, xty) = normal_equations(rows, y)?;
    solve(xtx, xty)
}

/// OLS fit that also reports coefficient standard errors.
pub fn ols_with_stderr(rows: &[Vec<f64>], y: &[f64]) -> Result<OlsFit> {
    let (xtx, xty) = normal_equations(rows, y)?;
    let k = xty.len();
    let n = rows.len();
    if n <= k {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations for {} regressors, have {}",
            k, k, n
        )));
    }

    let coefficients = solve(xtx.clone(), xty)?;
    let sse: f64 = rows
        .iter()
        .zip(y)
        .map(|(row, &target)| (target - dot(row, &coefficients)).powi(2))
        .sum();
    let residual_variance = sse / (n - k) as f64;

    let inverse = invert(xtx)?;
    let std_errors = (0..k)
        .map(|i| (residual_variance * inverse[i][i]).max(0.0).sqrt())
        .collect();

    Ok(OlsFit {
        coefficients,
        std_errors,
        residual_variance,
    })
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normal_equations(rows: &[Vec<f64>], y: &[f64]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    if rows.is_empty() {
        return Err(MathError::InsufficientData(
            "No observations to regress on".to_string(),
        ));
    }
    if rows.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            rows.len(),
            y.len()
        )));
    }

    let k = rows[0].len();
    if k == 0 || rows.iter().any(|r| r.len() != k) {
        return Err(MathError::InvalidInput(
            "Design matrix rows must be non-empty and of equal width".to_string(),
        ));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in rows.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    Ok((xtx, xty))
}

const PIVOT_TOLERANCE: f64 = 1e-12;

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= PIVOT_TOLERANCE * scale {
            return Err(MathError::SingularMatrix(format!(
                "Regressor {} is collinear with the others",
                col
            )));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least-squares solution is not finite".to_string(),
        ));
    }
    Ok(x)
}

fn invert(a: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let n = a.len();
    let mut columns = Vec::with_capacity(n);
    for i in 0..n {
        let mut unit = vec![0.0; n];
        unit[i] = 1.0;
        columns.push(solve(a.clone(), unit)?);
    }
    // columns[j] is column j of the inverse.
    Ok((0..n)
        .map(|i| (0..n).map(|j| columns[j][i]).collect())
        .collect())
}

/// Straight line fitted over the sample index `0..n`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    slope: f64,
    intercept: f64,
    len: usize,
}

impl LinearRegression {
    /// Fit `y = intercept + slope * t` with `t` the position in `values`
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data for linear regression. Need at least 2 points.".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(MathError::CalculationError(
                "Regression coefficients are not finite".to_string(),
            ));
        }

        Ok(Self {
            slope,
            intercept,
            len: values.len(),
        })
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of observations the line was fitted on
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of the line at sample index `t`
    pub fn at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_plane_is_recovered() {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![1.0, i as f64, (i * i) as f64 % 7.0])
            .collect();
        let y: Vec<f64> = rows
            .iter()
            .map(|r| 2.0 + 0.5 * r[1] - 3.0 * r[2])
            .collect();

        let beta = least_squares(&rows, &y).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(beta[2], -3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_columns_are_singular() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y = vec![1.0; 5];
        assert!(matches!(
            least_squares(&rows, &y),
            Err(MathError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_standard_errors_shrink_to_zero_on_exact_fit() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..8).map(|i| 1.0 + 2.0 * i as f64).collect();
        let fit = ols_with_stderr(&rows, &y).unwrap();

        assert_relative_eq!(fit.coefficients[1], 2.0, epsilon = 1e-9);
        assert!(fit.std_errors.iter().all(|se| *se < 1e-6));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let rows = vec![vec![1.0], vec![1.0]];
        assert!(least_squares(&rows, &[1.0]).is_err());
    }

    #[test]
    fn test_linear_regression_over_index() {
        let line = LinearRegression::fit(&[10.0, 12.0, 14.0, 16.0]).unwrap();
        assert_relative_eq!(line.slope(), 2.0);
        assert_relative_eq!(line.intercept(), 10.0);
        assert_relative_eq!(line.at(5.0), 20.0);
        assert_eq!(line.len(), 4);
    }

    #[test]
    fn test_linear_regression_needs_two_points() {
        assert!(LinearRegression::fit(&[1.0]).is_err());
    }
}
