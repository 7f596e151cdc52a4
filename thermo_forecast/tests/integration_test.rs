use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use thermo_forecast::config::{ExperimentFile, ExperimentOptions, ModelFamily, Toggle};
use thermo_forecast::data::{Column, RawColumn, RawTable, RawValues, TimeSeriesTable};
use thermo_forecast::error::{ForecastError, Stage};
use thermo_forecast::policy::{AggregationPolicy, BATTERY_MAX_TEMPERATURE, BATTERY_SOC};
use thermo_forecast::preprocess::Preprocessor;
use thermo_forecast::profiling::profile;
use thermo_forecast::report::{DirectorySink, LogSink, ReportSink};
use thermo_forecast::runner::{run_experiment, run_model, runner_for};

fn hourly(values: Vec<f64>) -> TimeSeriesTable {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let index = (0..values.len())
        .map(|i| start + Duration::hours(i as i64))
        .collect();
    TimeSeriesTable::new(index, vec![Column::new(BATTERY_MAX_TEMPERATURE, values)]).unwrap()
}

fn daily_cycle(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| 30.0 + 4.0 * (t as f64 * std::f64::consts::TAU / 24.0).sin())
        .collect()
}

#[test]
fn persistence_run_end_to_end() {
    let table = hourly(vec![10.0, 12.0, 14.0, 16.0, 18.0, 20.0]);
    let options = ExperimentOptions {
        training_pct: Some(0.67),
        smoothing: Some(Toggle::Flag(false)),
        ..ExperimentOptions::default()
    }
    .resolve(ModelFamily::PersistenceOptimistic)
    .unwrap();

    let runner = runner_for(ModelFamily::PersistenceOptimistic);
    let report = run_model(
        runner.as_ref(),
        &table,
        BATTERY_MAX_TEMPERATURE,
        &options,
        &AggregationPolicy::default(),
    )
    .unwrap();

    assert_eq!(report.model, "persistence-optimistic");
    assert_eq!(report.train.actual, vec![10.0, 12.0, 14.0, 16.0]);
    assert_eq!(report.test.actual, vec![18.0, 20.0]);
    assert_eq!(report.test.prediction_at(0), Some(16.0));
    assert_eq!(report.test.prediction_at(1), Some(18.0));
    assert_relative_eq!(report.evaluation.test.mae, 2.0);
    assert_relative_eq!(report.evaluation.test.rmse, 2.0);
    assert_relative_eq!(report.evaluation.test.r2, -3.0);
    assert!(report.evaluation.train.is_some());
    assert!(report.trace.is_empty());
}

#[test]
fn experiment_continues_past_failed_runs() {
    let table = hourly(daily_cycle(24 * 10));
    let experiment = ExperimentFile::from_json(
        r#"{
            "runs": [
                {"model": "persistence-realist"},
                {"model": "arima", "options": {"exogenous": ["system_battery_soc"]}},
                {"model": "simple-average"},
                {"model": "rolling-mean", "options": {"optimize_for": "MAPE"}},
                {"model": "exponential-smoothing"}
            ]
        }"#,
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let mut sinks: Vec<Box<dyn ReportSink>> =
        vec![Box::new(LogSink), Box::new(DirectorySink::new(dir.path()))];
    let outcome = run_experiment(&table, &experiment, &mut sinks);

    let names: Vec<&str> = outcome.reports.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "persistence-long-term",
            "simple-average",
            "rolling-mean-MAPE",
            "exponential-smoothing-R2"
        ]
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].model, ModelFamily::Arima);
    assert!(matches!(
        outcome.failures[0].error,
        ForecastError::ConfigError(_)
    ));

    let rolling = &outcome.reports[2];
    assert_eq!(rolling.trace.len(), 8);
    assert!(rolling.observations[0].starts_with("best parameters: "));
    // Search performance is reported at the evaluation precision
    let perf = rolling.observations.last().unwrap();
    let value = perf.strip_prefix("MAPE: ").unwrap();
    assert_eq!(value.split('.').nth(1).map(str::len), Some(2));
    assert!(dir
        .path()
        .join(format!("rolling-mean-MAPE-{}-tuning.csv", BATTERY_MAX_TEMPERATURE))
        .exists());
    assert!(dir
        .path()
        .join(format!("simple-average-{}-run.txt", BATTERY_MAX_TEMPERATURE))
        .exists());
}

#[test]
fn failures_carry_their_stage() {
    let table = hourly(daily_cycle(5));
    let experiment = ExperimentFile::from_json(r#"{"runs": [{"model": "rolling-mean"}]}"#).unwrap();
    let outcome = run_experiment(&table, &experiment, &mut []);
    assert!(outcome.reports.is_empty());
    assert_eq!(outcome.failures[0].error.stage(), Some(Stage::Search));
}

#[test]
fn raw_telemetry_to_report() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let minutes = 6 * 60;
    let stamps = (0..minutes)
        .filter(|m| m % 97 != 5)
        .map(|m| Some(start + Duration::minutes(m)))
        .collect::<Vec<_>>();
    let kept: Vec<i64> = (0..minutes).filter(|m| m % 97 != 5).collect();
    let temps = kept
        .iter()
        .map(|&m| 28.0 + (m as f64 / 50.0).sin())
        .collect();
    let soc = kept.iter().map(|&m| 90.0 - m as f64 / 10.0).collect();
    let raw = RawTable::new(vec![
        RawColumn {
            name: "registered_at".to_string(),
            values: RawValues::Timestamps(stamps),
        },
        RawColumn {
            name: BATTERY_MAX_TEMPERATURE.to_string(),
            values: RawValues::Numeric(temps),
        },
        RawColumn {
            name: BATTERY_SOC.to_string(),
            values: RawValues::Numeric(soc),
        },
    ])
    .unwrap();

    let experiment = ExperimentFile::from_json(
        r#"{
            "transform": {"aggregation": {"rule": "15min"}},
            "runs": [{"model": "linear-regression"}]
        }"#,
    );
    // Only the listed rules are accepted
    assert!(experiment.is_err());

    let experiment = ExperimentFile::from_json(
        r#"{
            "transform": {"aggregation": {"rule": "h"}},
            "runs": [{"model": "linear-regression"}, {"model": "persistence-optimistic", "options": {"smoothing": {"window": 2}}}]
        }"#,
    )
    .unwrap();

    let table = Preprocessor::new(experiment.preprocess.clone())
        .run(&raw)
        .unwrap();
    assert_eq!(table.len(), minutes as usize);

    let outcome = run_experiment(&table, &experiment, &mut []);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let regression = &outcome.reports[0];
    assert_eq!(regression.train.actual.len() + regression.test.actual.len(), 6);
    assert_eq!(regression.observations.len(), 2);

    // Train keeps floor(0.8 * 6) = 4 hourly rows, minus window - 1 after smoothing
    let optimistic = &outcome.reports[1];
    assert_eq!(optimistic.train.actual.len(), 3);
    assert_eq!(optimistic.test.actual.len(), 2);
}

#[test]
fn profile_reports_dimensionality_and_stationarity() {
    let values: Vec<f64> = daily_cycle(24 * 10)
        .into_iter()
        .enumerate()
        .map(|(t, v)| v + ((t * 7919) % 13) as f64 * 0.1)
        .collect();
    let table = hourly(values);
    let summary = profile(&table, BATTERY_MAX_TEMPERATURE, None, &AggregationPolicy::default()).unwrap();

    assert_eq!(summary.dimensionality.records, 240);
    assert_eq!(summary.dimensionality.start, Some(table.index()[0]));
    assert_eq!(summary.dimensionality.end, Some(table.index()[239]));
    assert!(summary.adf.statistic.is_finite());
    assert!(summary.adf.critical_values.one < summary.adf.critical_values.five);

    assert!(matches!(
        profile(&table, "system_unknown", None, &AggregationPolicy::default()),
        Err(ForecastError::DataError(_))
    ));
}
