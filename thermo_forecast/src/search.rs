//! Hyperparameter search with a minimum-improvement deadband
//!
//! Candidates are visited in the order they are given and scored on the
//! rounded metric of the evaluation report. The metric is first oriented
//! with [`Metric::score`] so that higher is always better: R2 is used as is,
//! error metrics such as MAPE are negated. On that oriented score a
//! candidate replaces the current best only when
//! `score > best && |score - best| > DELTA_IMPROVE`, so ties and near-ties
//! keep the earlier candidate.

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::evaluate::Metric;
use crate::models::{ForecastResult, TrainedForecastModel};
use crate::timing::ScopedTimer;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Minimum gain of the oriented score required to replace the current best
pub const DELTA_IMPROVE: f64 = 0.001;

/// A fitted candidate and its test-set performance
#[derive(Debug, Clone)]
pub struct CandidateOutcome<M> {
    pub model: M,
    pub test_pred: ForecastResult,
    /// Metric value in its natural units
    pub perf: f64,
}

/// Score one trained model on the test partition.
///
/// `perf` is the rounded value the evaluation report shows, so candidates
/// that report the same metric tie.
pub fn score_candidate<M: TrainedForecastModel>(
    metric: Metric,
    model: M,
    test: &Dataset,
) -> Result<CandidateOutcome<M>> {
    let test_pred = model.predict_holdout(test)?;
    let actual = test_pred.aligned(test.target()?)?;
    let perf = metric.evaluate(actual, test_pred.values())?;
    Ok(CandidateOutcome {
        model,
        test_pred,
        perf,
    })
}

/// One visited candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub params: String,
    pub perf: Option<f64>,
    pub error: Option<String>,
    /// Whether this candidate became the best at the time it was visited
    pub improved: bool,
}

/// Winner of a finished search
#[derive(Debug, Clone)]
pub struct SearchResult<P, M> {
    pub metric: Metric,
    pub params: P,
    pub model: M,
    pub test_pred: ForecastResult,
    pub perf: f64,
    pub trace: Vec<TraceEntry>,
}

#[derive(Debug, Clone)]
struct Best<P, M> {
    params: P,
    outcome: CandidateOutcome<M>,
}

/// Search state owned by one search invocation
#[derive(Debug, Clone)]
pub struct ParameterSearch<P, M> {
    metric: Metric,
    delta: f64,
    best_score: f64,
    best: Option<Best<P, M>>,
    trace: Vec<TraceEntry>,
}

impl<P: fmt::Display, M> ParameterSearch<P, M> {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            delta: DELTA_IMPROVE,
            best_score: f64::NEG_INFINITY,
            best: None,
            trace: Vec::new(),
        }
    }

    /// Override the deadband
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Best metric value so far, in natural units
    pub fn best_perf(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.outcome.perf)
    }

    pub fn best_params(&self) -> Option<&P> {
        self.best.as_ref().map(|b| &b.params)
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Record a candidate, returning whether it became the new best.
    ///
    /// A failed candidate is logged and skipped.
    pub fn consider(&mut self, params: P, outcome: Result<CandidateOutcome<M>>) -> bool {
        let label = params.to_string();
        let outcome = match outcome {
            Ok(o) if o.perf.is_finite() => o,
            Ok(o) => {
                warn!(candidate = %label, perf = o.perf, "candidate scored a non-finite value, skipped");
                self.trace.push(TraceEntry {
                    params: label,
                    perf: None,
                    error: Some("non-finite score".to_string()),
                    improved: false,
                });
                return false;
            }
            Err(e) => {
                warn!(candidate = %label, error = %e, "candidate failed, skipped");
                self.trace.push(TraceEntry {
                    params: label,
                    perf: None,
                    error: Some(e.to_string()),
                    improved: false,
                });
                return false;
            }
        };

        let score = self.metric.score(outcome.perf);
        let improved = score > self.best_score && (score - self.best_score).abs() > self.delta;
        debug!(candidate = %label, metric = %self.metric, perf = outcome.perf, improved, "candidate scored");

        self.trace.push(TraceEntry {
            params: label,
            perf: Some(outcome.perf),
            error: None,
            improved,
        });
        if improved {
            self.best_score = score;
            self.best = Some(Best { params, outcome });
        }
        improved
    }

    /// End the search, failing if no candidate could be scored
    pub fn finish(self) -> Result<SearchResult<P, M>> {
        let Some(best) = self.best else {
            return Err(ForecastError::NoViableCandidate(format!(
                "all {} candidates failed",
                self.trace.len()
            )));
        };
        info!(
            metric = %self.metric,
            params = %best.params,
            perf = best.outcome.perf,
            candidates = self.trace.len(),
            "search finished"
        );
        Ok(SearchResult {
            metric: self.metric,
            params: best.params,
            model: best.outcome.model,
            test_pred: best.outcome.test_pred,
            perf: best.outcome.perf,
            trace: self.trace,
        })
    }
}

/// Evaluate every candidate in order and keep the best
pub fn grid_search<P, M, I, F>(
    label: &str,
    metric: Metric,
    candidates: I,
    mut evaluate: F,
) -> Result<SearchResult<P, M>>
where
    P: fmt::Display,
    I: IntoIterator<Item = P>,
    F: FnMut(&P) -> Result<CandidateOutcome<M>>,
{
    let _timer = ScopedTimer::start(format!("{} search", label));
    let mut search = ParameterSearch::new(metric);
    for params in candidates {
        let outcome = evaluate(&params);
        search.consider(params, outcome);
    }
    search.finish()
}

/// ARIMA order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(p={}, d={}, q={})", self.p, self.d, self.q)
    }
}

/// LSTM shape and training length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmParams {
    pub seq_len: usize,
    pub hidden: usize,
    pub epochs: usize,
}

impl fmt::Display for LstmParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(seq_len={}, hidden={}, epochs={})",
            self.seq_len, self.hidden, self.epochs
        )
    }
}
