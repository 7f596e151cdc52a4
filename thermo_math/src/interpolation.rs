//! Gap filling and interpolation over evenly spaced observations
//!
//! Positions are sample indices, so interpolation assumes the input has
//! already been re-indexed to a fixed frequency. Missing observations are
//! `NaN`.

use crate::{MathError, Result};

/// Which neighbour of a gap is propagated first by [`fill_limited`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOrder {
    /// Propagate the next observation backwards, then the previous one forwards
    BackwardFirst,
    /// Propagate the previous observation forwards, then the next one backwards
    ForwardFirst,
}

/// A maximal run of missing observations, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: usize,
    pub end: usize,
}

impl Gap {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Locate every run of missing observations in `values`.
pub fn gaps(values: &[f64]) -> Vec<Gap> {
    let mut found = Vec::new();
    let mut start = None;
    for (i, v) in values.iter().enumerate() {
        match (v.is_nan(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                found.push(Gap { start: s, end: i });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        found.push(Gap {
            start: s,
            end: values.len(),
        });
    }
    found
}

/// Fill each gap with at most `limit` copies of its neighbouring observations.
///
/// Every gap receives a budget of `limit` samples, spent on the neighbour
/// named by `order` first. A gap no longer than `limit` is always closed; a
/// longer gap keeps `len - limit` missing samples. Gaps at the start of the
/// series can only be filled backwards and gaps at the end only forwards.
pub fn fill_limited(values: &[f64], limit: usize, order: FillOrder) -> Vec<f64> {
    let mut out = values.to_vec();
    let n = values.len();

    for gap in gaps(values) {
        let prev = if gap.start > 0 {
            Some(values[gap.start - 1])
        } else {
            None
        };
        let next = if gap.end < n {
            Some(values[gap.end])
        } else {
            None
        };

        let mut budget = limit;
        let mut lo = gap.start;
        let mut hi = gap.end;

        match order {
            FillOrder::BackwardFirst => {
                if let Some(next) = next {
                    hi -= fill_tail(&mut out[lo..hi], next, &mut budget);
                }
                if let Some(prev) = prev {
                    fill_head(&mut out[lo..hi], prev, &mut budget);
                }
            }
            FillOrder::ForwardFirst => {
                if let Some(prev) = prev {
                    lo += fill_head(&mut out[lo..hi], prev, &mut budget);
                }
                if let Some(next) = next {
                    fill_tail(&mut out[lo..hi], next, &mut budget);
                }
            }
        }
    }

    out
}

fn fill_head(slots: &mut [f64], value: f64, budget: &mut usize) -> usize {
    let take = slots.len().min(*budget);
    slots[..take].fill(value);
    *budget -= take;
    take
}

fn fill_tail(slots: &mut [f64], value: f64, budget: &mut usize) -> usize {
    let take = slots.len().min(*budget);
    let len = slots.len();
    slots[len - take..].fill(value);
    *budget -= take;
    take
}

/// Linear interpolation across interior gaps.
///
/// Leading and trailing gaps take the nearest observation.
pub fn interpolate_linear(values: &[f64]) -> Result<Vec<f64>> {
    let knots = knots(values)?;
    let mut out = values.to_vec();

    for gap in gaps(values) {
        for i in gap.start..gap.end {
            out[i] = linear_at(&knots, i as f64);
        }
    }

    Ok(out)
}

/// Natural cubic-spline interpolation across interior gaps.
///
/// The spline passes through every observed sample. With fewer than four
/// observations the result falls back to linear interpolation. Leading and
/// trailing gaps take the nearest observation.
pub fn interpolate_cubic(values: &[f64]) -> Result<Vec<f64>> {
    let knots = knots(values)?;
    if knots.len() < 4 {
        return interpolate_linear(values);
    }

    let spline = NaturalCubicSpline::fit(&knots)?;
    let mut out = values.to_vec();
    for gap in gaps(values) {
        for i in gap.start..gap.end {
            out[i] = spline.eval(i as f64);
        }
    }

    Ok(out)
}

fn knots(values: &[f64]) -> Result<Vec<(f64, f64)>> {
    let knots: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, &v)| (i as f64, v))
        .collect();

    if knots.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot interpolate a series without observations".to_string(),
        ));
    }

    Ok(knots)
}

fn linear_at(knots: &[(f64, f64)], x: f64) -> f64 {
    let first = knots[0];
    let last = knots[knots.len() - 1];
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }

    let idx = knots.partition_point(|(kx, _)| *kx <= x);
    let (x0, y0) = knots[idx - 1];
    let (x1, y1) = knots[idx];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Natural cubic spline through a set of knots with increasing abscissae
#[derive(Debug, Clone)]
pub struct NaturalCubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fit the spline by solving the tridiagonal system for the second derivatives
    pub fn fit(knots: &[(f64, f64)]) -> Result<Self> {
        let n = knots.len();
        if n < 2 {
            return Err(MathError::InsufficientData(
                "A spline needs at least two knots".to_string(),
            ));
        }

        let xs: Vec<f64> = knots.iter().map(|k| k.0).collect();
        let ys: Vec<f64> = knots.iter().map(|k| k.1).collect();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        if h.iter().any(|&step| step <= 0.0) {
            return Err(MathError::InvalidInput(
                "Spline knots must be strictly increasing".to_string(),
            ));
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm on the interior equations, M_0 = M_{n-1} = 0.
            let inner = n - 2;
            let mut diag = vec![0.0; inner];
            let mut upper = vec![0.0; inner];
            let mut rhs = vec![0.0; inner];
            for k in 0..inner {
                let i = k + 1;
                diag[k] = 2.0 * (h[i - 1] + h[i]);
                upper[k] = h[i];
                rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            for k in 1..inner {
                let lower = h[k];
                let w = lower / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            let mut solution = vec![0.0; inner];
            solution[inner - 1] = rhs[inner - 1] / diag[inner - 1];
            for k in (0..inner - 1).rev() {
                solution[k] = (rhs[k] - upper[k] * solution[k + 1]) / diag[k];
            }
            m[1..n - 1].copy_from_slice(&solution);
        }

        Ok(Self {
            xs,
            ys,
            second_derivatives: m,
        })
    }

    /// Evaluate the spline, holding the boundary values outside the knot range
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }

        let i = self.xs.partition_point(|&kx| kx <= x) - 1;
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.second_derivatives[i], self.second_derivatives[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;

        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}
