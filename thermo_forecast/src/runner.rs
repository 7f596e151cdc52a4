//! Model runners
//!
//! Every model family is driven the same way: resolve options, transform the
//! cleaned table, pick the target (and any exogenous columns), split, fit or
//! search, predict both partitions, evaluate and hand the result to the
//! report sinks. Errors are annotated with the stage they came from.

use crate::config::{ExperimentFile, ModelFamily, RunOptions};
use crate::data::{Dataset, TimeSeriesTable};
use crate::error::{ForecastError, Result, Stage, StageExt};
use crate::evaluate::{evaluate, EvaluationReport};
use crate::models::arima::{order_grid, ArimaModel};
use crate::models::exponential_smoothing::{ExponentialSmoothing, ALPHA_GRID};
use crate::models::linear_regression::TrendRegression;
use crate::models::lstm::{epoch_checkpoints, LstmTrainer, HIDDEN_GRID, SEQ_LEN_GRID};
use crate::models::persistence::{PersistenceOptimistic, PersistenceRealist};
use crate::models::rolling_mean::{RollingMean, WINDOW_GRID};
use crate::models::simple_average::SimpleAverage;
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::policy::AggregationPolicy;
use crate::report::ReportSink;
use crate::search::{
    grid_search, score_candidate, ArimaOrder, LstmParams, ParameterSearch, SearchResult,
    TraceEntry,
};
use crate::split::prepare;
use crate::timing::ScopedTimer;
use crate::transform::transform;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, warn};

/// One partition of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    pub index: Vec<DateTime<Utc>>,
    pub actual: Vec<f64>,
    /// Predictions, starting `offset` rows into `actual`
    pub predicted: Option<ForecastResult>,
}

impl PartitionResult {
    fn new(data: &Dataset, predicted: Option<ForecastResult>) -> Result<Self> {
        Ok(Self {
            index: data.index().to_vec(),
            actual: data.target()?.to_vec(),
            predicted,
        })
    }

    /// Prediction for row `i`, if there is one
    pub fn prediction_at(&self, i: usize) -> Option<f64> {
        let pred = self.predicted.as_ref()?;
        i.checked_sub(pred.offset())
            .and_then(|j| pred.values().get(j).copied())
    }
}

/// Everything a report sink needs from one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Report name, e.g. `rolling-mean-R2`
    pub model: String,
    pub target: String,
    pub train: PartitionResult,
    pub test: PartitionResult,
    pub evaluation: EvaluationReport,
    pub observations: Vec<String>,
    /// Candidates visited by a search, empty for fixed models
    pub trace: Vec<TraceEntry>,
}

/// Predictions and diagnostics produced by a runner's fit step
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub train_pred: Option<ForecastResult>,
    pub test_pred: ForecastResult,
    pub observations: Vec<String>,
    pub trace: Vec<TraceEntry>,
}

/// The per-family part of a run
pub trait ModelRunner {
    fn family(&self) -> ModelFamily;

    /// Name the run is reported under
    fn report_name(&self, options: &RunOptions) -> String {
        let family = self.family();
        if family.is_searched() {
            format!("{}-{}", family, options.optimize_for)
        } else {
            family.to_string()
        }
    }

    /// Fit or search on `train` and predict both partitions
    fn fit(&self, train: &Dataset, test: &Dataset, options: &RunOptions) -> Result<FitOutcome>;
}

/// Runner for the families
pub fn runner_for(family: ModelFamily) -> Box<dyn ModelRunner> {
    match family {
        ModelFamily::PersistenceOptimistic => Box::new(FixedRunner::new(
            family,
            PersistenceOptimistic,
        )),
        ModelFamily::PersistenceRealist => {
            Box::new(FixedRunner::new(family, PersistenceRealist).named("persistence-long-term"))
        }
        ModelFamily::SimpleAverage => Box::new(FixedRunner::new(family, SimpleAverage)),
        ModelFamily::LinearRegression => Box::new(FixedRunner::new(family, TrendRegression)),
        ModelFamily::RollingMean => Box::new(RollingMeanRunner),
        ModelFamily::ExponentialSmoothing => Box::new(ExponentialSmoothingRunner),
        ModelFamily::Arima => Box::new(ArimaRunner),
        ModelFamily::Lstm => Box::new(LstmRunner),
    }
}

fn in_sample(model: &impl TrainedForecastModel, train: &Dataset) -> Result<Option<ForecastResult>> {
    let pred = model.predict(train)?;
    Ok(if pred.is_empty() { None } else { Some(pred) })
}

/// A model without hyperparameters
#[derive(Debug, Clone)]
pub struct FixedRunner<M> {
    family: ModelFamily,
    name: Option<&'static str>,
    model: M,
}

impl<M: ForecastModel> FixedRunner<M> {
    pub fn new(family: ModelFamily, model: M) -> Self {
        Self {
            family,
            name: None,
            model,
        }
    }

    /// Report under `name` instead of the family name
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

impl<M: ForecastModel> ModelRunner for FixedRunner<M> {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn report_name(&self, _options: &RunOptions) -> String {
        self.name
            .map(str::to_string)
            .unwrap_or_else(|| self.family.to_string())
    }

    fn fit(&self, train: &Dataset, test: &Dataset, _options: &RunOptions) -> Result<FitOutcome> {
        let trained = self.model.train(train).stage(Stage::Fit)?;
        let test_pred = trained.predict_holdout(test).stage(Stage::Fit)?;
        let train_pred = in_sample(&trained, train).stage(Stage::Fit)?;
        Ok(FitOutcome {
            train_pred,
            test_pred,
            observations: trained.observations(),
            trace: Vec::new(),
        })
    }
}

fn searched_outcome<P: fmt::Display, M: TrainedForecastModel>(
    result: SearchResult<P, M>,
    train: &Dataset,
) -> Result<FitOutcome> {
    let train_pred = in_sample(&result.model, train).stage(Stage::Fit)?;
    let mut observations = vec![format!("best parameters: {}", result.params)];
    observations.extend(result.model.observations());
    observations.push(format!("{}: {:.2}", result.metric, result.perf));
    Ok(FitOutcome {
        train_pred,
        test_pred: result.test_pred,
        observations,
        trace: result.trace,
    })
}

/// Searches [`WINDOW_GRID`] in order
#[derive(Debug, Clone, Copy)]
pub struct RollingMeanRunner;

impl ModelRunner for RollingMeanRunner {
    fn family(&self) -> ModelFamily {
        ModelFamily::RollingMean
    }

    fn fit(&self, train: &Dataset, test: &Dataset, options: &RunOptions) -> Result<FitOutcome> {
        let metric = options.optimize_for;
        let result = grid_search("rolling-mean", metric, WINDOW_GRID, |&window| {
            let trained = RollingMean::new(window)?.train(train)?;
            score_candidate(metric, trained, test)
        })
        .stage(Stage::Search)?;
        searched_outcome(result, train)
    }
}

/// Searches [`ALPHA_GRID`] in order
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoothingRunner;

impl ModelRunner for ExponentialSmoothingRunner {
    fn family(&self) -> ModelFamily {
        ModelFamily::ExponentialSmoothing
    }

    fn fit(&self, train: &Dataset, test: &Dataset, options: &RunOptions) -> Result<FitOutcome> {
        let metric = options.optimize_for;
        let result = grid_search("exponential-smoothing", metric, ALPHA_GRID, |&alpha| {
            let trained = ExponentialSmoothing::new(alpha)?.train(train)?;
            score_candidate(metric, trained, test)
        })
        .stage(Stage::Search)?;
        searched_outcome(result, train)
    }
}

/// Searches the ARIMA order grid, d outermost and p innermost
#[derive(Debug, Clone, Copy)]
pub struct ArimaRunner;

impl ModelRunner for ArimaRunner {
    fn family(&self) -> ModelFamily {
        ModelFamily::Arima
    }

    fn fit(&self, train: &Dataset, test: &Dataset, options: &RunOptions) -> Result<FitOutcome> {
        let metric = options.optimize_for;
        let orders = order_grid()
            .into_iter()
            .map(|(p, d, q)| ArimaOrder { p, d, q });
        let result = grid_search("arima", metric, orders, |o| {
            let trained = ArimaModel::new(o.p, o.d, o.q).train(train)?;
            score_candidate(metric, trained, test)
        })
        .stage(Stage::Search)?;
        searched_outcome(result, train)
    }
}

/// Searches sequence length, then hidden units, then epoch checkpoints.
///
/// One network is trained per (sequence length, hidden units) pair and
/// scored each time it reaches a checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct LstmRunner;

impl ModelRunner for LstmRunner {
    fn family(&self) -> ModelFamily {
        ModelFamily::Lstm
    }

    fn fit(&self, train: &Dataset, test: &Dataset, options: &RunOptions) -> Result<FitOutcome> {
        let metric = options.optimize_for;
        let checkpoints = epoch_checkpoints(options.epochs);
        let _timer = ScopedTimer::start("lstm search");
        let mut search = ParameterSearch::new(metric);

        for seq_len in SEQ_LEN_GRID {
            for hidden in HIDDEN_GRID {
                let mut trainer = match LstmTrainer::new(train, seq_len, hidden, options.seed) {
                    Ok(t) => t,
                    Err(e) => {
                        let params = LstmParams {
                            seq_len,
                            hidden,
                            epochs: 0,
                        };
                        search.consider(params, Err(e));
                        continue;
                    }
                };
                for &epochs in &checkpoints {
                    let params = LstmParams {
                        seq_len,
                        hidden,
                        epochs,
                    };
                    let mut failed = None;
                    while trainer.epochs() < epochs {
                        if let Err(e) = trainer.train_epoch() {
                            failed = Some(e);
                            break;
                        }
                    }
                    if let Some(e) = failed {
                        search.consider(params, Err(e));
                        break;
                    }
                    let outcome = score_candidate(metric, trainer.snapshot(), test);
                    search.consider(params, outcome);
                }
            }
        }

        let result = search.finish().stage(Stage::Search)?;
        searched_outcome(result, train)
    }
}

/// Run one model family on an already cleaned table
pub fn run_model(
    runner: &dyn ModelRunner,
    table: &TimeSeriesTable,
    target: &str,
    options: &RunOptions,
    policy: &AggregationPolicy,
) -> Result<RunReport> {
    let name = runner.report_name(options);
    let _timer = ScopedTimer::start(format!("{} run", name));

    let transformed = transform(table, &options.transform, policy).stage(Stage::Transform)?;

    let data = select_inputs(&transformed, target, &options.exogenous).stage(Stage::Split)?;
    let (train, test) = prepare(&data, &options.split, policy).stage(Stage::Split)?;
    info!(model = %name, train = train.len(), test = test.len(), "prepared partitions");

    let fitted = runner.fit(&train, &test, options)?;

    let evaluation = score_partitions(&train, &test, &fitted).stage(Stage::Evaluate)?;

    info!(
        model = %name,
        column = %target,
        rmse = evaluation.test.rmse,
        mae = evaluation.test.mae,
        mape = evaluation.test.mape,
        r2 = evaluation.test.r2,
        "test metrics"
    );

    Ok(RunReport {
        model: name,
        target: target.to_string(),
        train: PartitionResult::new(&train, fitted.train_pred)?,
        test: PartitionResult::new(&test, Some(fitted.test_pred))?,
        evaluation,
        observations: fitted.observations,
        trace: fitted.trace,
    })
}

fn score_partitions(train: &Dataset, test: &Dataset, fitted: &FitOutcome) -> Result<EvaluationReport> {
    let test_actual = fitted.test_pred.aligned(test.target()?)?;
    match &fitted.train_pred {
        Some(pred) => evaluate(
            pred.aligned(train.target()?)?,
            test_actual,
            Some(pred.values()),
            fitted.test_pred.values(),
        ),
        None => evaluate(&[], test_actual, None, fitted.test_pred.values()),
    }
}

/// The target alone, or the target followed by its exogenous columns
fn select_inputs(table: &TimeSeriesTable, target: &str, exogenous: &[String]) -> Result<Dataset> {
    if exogenous.is_empty() {
        return Ok(Dataset::Series(table.series(target)?));
    }
    let mut names = vec![target];
    names.extend(exogenous.iter().map(String::as_str).filter(|&c| c != target));
    Ok(Dataset::Table(table.select(&names)?))
}

/// A run that did not produce a report
#[derive(Debug)]
pub struct RunFailure {
    pub model: ModelFamily,
    pub error: ForecastError,
}

/// Reports and failures of every run in an experiment
#[derive(Debug, Default)]
pub struct ExperimentOutcome {
    pub reports: Vec<RunReport>,
    pub failures: Vec<RunFailure>,
}

/// Run every configured model on a cleaned table.
///
/// A failing run is logged and recorded, and the remaining runs continue.
pub fn run_experiment(
    table: &TimeSeriesTable,
    experiment: &ExperimentFile,
    sinks: &mut [Box<dyn ReportSink>],
) -> ExperimentOutcome {
    let policy = experiment.policy();
    let target = experiment.preprocess.target.as_str();
    let mut outcome = ExperimentOutcome::default();

    for run in &experiment.runs {
        let result = experiment.resolve(run).and_then(|options| {
            let runner = runner_for(run.model);
            let report = run_model(runner.as_ref(), table, target, &options, &policy)?;
            for sink in sinks.iter_mut() {
                sink.save(&report).stage(Stage::Report)?;
            }
            Ok(report)
        });

        match result {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                match e.stage() {
                    Some(stage) => error!(model = %run.model, %stage, error = %e, "run failed"),
                    None => error!(model = %run.model, error = %e, "run failed"),
                }
                outcome.failures.push(RunFailure {
                    model: run.model,
                    error: e,
                });
            }
        }
    }

    if !outcome.failures.is_empty() {
        warn!(
            failed = outcome.failures.len(),
            succeeded = outcome.reports.len(),
            "experiment finished with failures"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use chrono::{Duration, TimeZone};

    fn table(values: &[f64]) -> TimeSeriesTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let index = (0..values.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        TimeSeriesTable::new(index, vec![Column::new("t", values.to_vec())]).unwrap()
    }

    #[test]
    fn report_names_follow_family_and_metric() {
        let options = crate::config::ExperimentOptions::default()
            .resolve(ModelFamily::RollingMean)
            .unwrap();
        assert_eq!(runner_for(ModelFamily::RollingMean).report_name(&options), "rolling-mean-R2");
        assert_eq!(
            runner_for(ModelFamily::PersistenceRealist).report_name(&options),
            "persistence-long-term"
        );
    }

    #[test]
    fn search_without_viable_window_fails_in_search_stage() {
        let data = table(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let options = crate::config::ExperimentOptions::default()
            .resolve(ModelFamily::RollingMean)
            .unwrap();
        let policy = AggregationPolicy::empty().with("t", thermo_math::Reducer::Mean);
        let err = run_model(&RollingMeanRunner, &data, "t", &options, &policy).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Search));
    }

    #[test]
    fn missing_target_fails_in_split_stage() {
        let data = table(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let options = crate::config::ExperimentOptions::default()
            .resolve(ModelFamily::SimpleAverage)
            .unwrap();
        let err = run_model(
            runner_for(ModelFamily::SimpleAverage).as_ref(),
            &data,
            "missing",
            &options,
            &AggregationPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Split));
    }
}
