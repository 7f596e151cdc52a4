use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thermo_forecast::data::{Column, Dataset, TimeSeries, TimeSeriesTable};
use thermo_forecast::error::ForecastError;
use thermo_forecast::evaluate::Metric;
use thermo_forecast::models::arima::{order_grid, ArimaModel};
use thermo_forecast::models::exponential_smoothing::ExponentialSmoothing;
use thermo_forecast::models::linear_regression::TrendRegression;
use thermo_forecast::models::lstm::{epoch_checkpoints, Lstm, LstmTrainer};
use thermo_forecast::models::persistence::{PersistenceOptimistic, PersistenceRealist};
use thermo_forecast::models::rolling_mean::RollingMean;
use thermo_forecast::models::simple_average::SimpleAverage;
use thermo_forecast::models::{ForecastModel, ForecastResult, TrainedForecastModel};

fn index(len: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..len).map(|i| start + Duration::hours(i as i64)).collect()
}

fn create_test_data(values: &[f64]) -> Dataset {
    TimeSeries::new("temp", index(values.len()), values.to_vec())
        .unwrap()
        .into()
}

fn ar1(n: usize, phi: f64, c: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut y = vec![c / (1.0 - phi)];
    for _ in 1..n {
        let prev = y[y.len() - 1];
        y.push(c + phi * prev + rng.gen_range(-1.0..1.0));
    }
    y
}

#[test]
fn persistence_optimistic_carries_last_value_then_previous_actual() {
    let train = create_test_data(&[10.0, 12.0, 14.0, 16.0]);
    let test = create_test_data(&[18.0, 20.0]);
    let trained = PersistenceOptimistic.train(&train).unwrap();

    let pred = trained.predict_holdout(&test).unwrap();
    assert_eq!(pred.values(), &[16.0, 18.0]);
    let mae = Metric::Mae.compute(pred.aligned(test.target().unwrap()).unwrap(), pred.values());
    assert_relative_eq!(mae.unwrap(), 2.0);

    assert_eq!(trained.forecast(3).unwrap().values(), &[16.0, 16.0, 16.0]);
}

#[test]
fn persistence_realist_repeats_last_training_value() {
    let train = create_test_data(&[10.0, 12.0, 14.0, 16.0]);
    let trained = PersistenceRealist.train(&train).unwrap();
    assert_eq!(trained.forecast(2).unwrap().values(), &[16.0, 16.0]);
    assert_eq!(trained.predict(&train).unwrap().values(), &[16.0; 4]);
}

#[test]
fn simple_average_predicts_training_mean() {
    let train = create_test_data(&[1.0, 2.0, 3.0, 6.0]);
    let trained = SimpleAverage.train(&train).unwrap();
    assert_eq!(trained.forecast(2).unwrap().values(), &[3.0, 3.0]);
    assert_eq!(trained.observations(), vec!["Prediction: 3.00".to_string()]);
}

#[test]
fn empty_training_data_is_explicit() {
    let empty = create_test_data(&[]);
    assert!(matches!(
        SimpleAverage.train(&empty),
        Err(ForecastError::EmptyData(_))
    ));
}

#[test]
fn linear_regression_continues_the_time_index() {
    let train = create_test_data(&[1.0, 3.0, 5.0, 7.0]);
    let trained = TrendRegression.train(&train).unwrap();
    assert_relative_eq!(trained.intercept(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(trained.slope(), 2.0, epsilon = 1e-9);

    let forecast = trained.forecast(2).unwrap();
    assert_relative_eq!(forecast.values()[0], 9.0, epsilon = 1e-9);
    assert_relative_eq!(forecast.values()[1], 11.0, epsilon = 1e-9);
    assert_eq!(
        trained.observations(),
        vec!["Intercept: 1.00".to_string(), "Coef: 2.00".to_string()]
    );
}

#[test]
fn rolling_mean_predicts_from_previous_window() {
    let train = create_test_data(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let trained = RollingMean::new(2).unwrap().train(&train).unwrap();

    let pred = trained.predict(&train).unwrap();
    assert_eq!(pred.offset(), 2);
    assert_eq!(pred.values(), &[1.5, 2.5, 3.5]);
    assert_eq!(pred.aligned(train.target().unwrap()).unwrap(), &[3.0, 4.0, 5.0]);

    // 4.5, then mean(5, 4.5)
    assert_eq!(trained.forecast(2).unwrap().values(), &[4.5, 4.75]);
}

#[test]
fn rolling_mean_needs_more_rows_than_window() {
    let train = create_test_data(&[1.0, 2.0, 3.0]);
    assert!(matches!(
        RollingMean::new(3).unwrap().train(&train),
        Err(ForecastError::FitError(_))
    ));
    assert!(matches!(RollingMean::new(0), Err(ForecastError::ConfigError(_))));
}

#[test]
fn exponential_smoothing_fitted_values_start_at_first_observation() {
    let train = create_test_data(&[10.0, 20.0, 20.0]);
    let trained = ExponentialSmoothing::new(0.5).unwrap().train(&train).unwrap();
    assert_eq!(trained.predict(&train).unwrap().values(), &[10.0, 10.0, 15.0]);
    assert_eq!(trained.forecast(2).unwrap().values(), &[17.5, 17.5]);
    assert!(matches!(
        ExponentialSmoothing::new(1.0),
        Err(ForecastError::ConfigError(_))
    ));
}

#[test]
fn aligned_rejects_mismatched_coverage() {
    let pred = ForecastResult::with_offset(vec![1.0, 2.0], 1);
    assert!(matches!(
        pred.aligned(&[0.0, 1.0]),
        Err(ForecastError::MetricError(_))
    ));
}

#[test]
fn arima_grid_iterates_d_then_q_then_p() {
    let grid = order_grid();
    assert_eq!(grid.len(), 3 * 4 * 6);
    assert_eq!(grid[0], (1, 0, 1));
    assert_eq!(grid[1], (2, 0, 1));
    assert_eq!(grid[6], (1, 0, 3));
    assert_eq!(grid[24], (1, 1, 1));
    assert_eq!(grid[grid.len() - 1], (10, 2, 7));
}

#[test]
fn arima_recovers_autoregressive_coefficient() {
    let data = create_test_data(&ar1(600, 0.6, 2.0, 11));
    let trained = ArimaModel::new(1, 0, 0).train(&data).unwrap();
    assert_relative_eq!(trained.ar_coefficients()[0], 0.6, epsilon = 0.15);

    let forecast = trained.forecast(50).unwrap();
    // Long-run forecasts settle near the process mean c / (1 - phi)
    assert_relative_eq!(forecast.values()[49], 5.0, epsilon = 0.5);
}

#[test]
fn arima_with_differencing_and_moving_average_smoke() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut level = 20.0;
    let values: Vec<f64> = (0..200)
        .map(|_| {
            level += 0.05 + rng.gen_range(-0.5..0.5);
            level
        })
        .collect();
    let data = create_test_data(&values);
    let trained = ArimaModel::new(2, 1, 1).train(&data).unwrap();

    let forecast = trained.forecast(10).unwrap();
    assert_eq!(forecast.len(), 10);
    assert!(forecast.values().iter().all(|v| v.is_finite()));

    let pred = trained.predict(&data).unwrap();
    assert_eq!(pred.offset(), 3);
    assert_eq!(pred.len(), 197);
}

#[test]
fn arima_short_series_is_fit_error() {
    let data = create_test_data(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(matches!(
        ArimaModel::new(3, 0, 3).train(&data),
        Err(ForecastError::FitError(_))
    ));
}

#[test]
fn lstm_epoch_checkpoints() {
    assert_eq!(
        epoch_checkpoints(1000),
        vec![1, 10, 20, 30, 40, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]
    );
    assert_eq!(epoch_checkpoints(20), vec![1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);
}

fn sine(n: usize) -> Vec<f64> {
    (0..n).map(|t| 30.0 + 3.0 * (t as f64 / 4.0).sin()).collect()
}

#[test]
fn lstm_is_reproducible_for_a_seed() {
    let train = create_test_data(&sine(60));
    let model = Lstm::new(6, 4, 15, 7).unwrap();
    let a = model.train(&train).unwrap().forecast(5).unwrap();
    let b = model.train(&train).unwrap().forecast(5).unwrap();
    assert_eq!(a, b);
    assert!(a.values().iter().all(|v| v.is_finite()));
}

#[test]
fn lstm_predicts_every_holdout_row() {
    let values = sine(80);
    let train = create_test_data(&values[..60]);
    let test = create_test_data(&values[60..]);
    let trained = Lstm::new(8, 3, 10, 1).unwrap().train(&train).unwrap();

    let holdout = trained.predict_holdout(&test).unwrap();
    assert_eq!(holdout.len(), 20);
    assert_eq!(holdout.offset(), 0);

    let in_sample = trained.predict(&train).unwrap();
    assert_eq!(in_sample.offset(), 8);
    assert_eq!(in_sample.len(), 52);
}

#[test]
fn lstm_trainer_counts_epochs() {
    let train = create_test_data(&sine(40));
    let mut trainer = LstmTrainer::new(&train, 6, 2, 5).unwrap();
    for _ in 0..3 {
        let loss = trainer.train_epoch().unwrap();
        assert!(loss.is_finite());
    }
    assert_eq!(trainer.epochs(), 3);
    assert_eq!(trainer.snapshot().epochs(), 3);
}

#[test]
fn lstm_with_exogenous_columns_needs_holdout_inputs() {
    let values = sine(50);
    let load: Vec<f64> = (0..50).map(|t| (t % 7) as f64).collect();
    let table = TimeSeriesTable::new(
        index(50),
        vec![Column::new("temp", values), Column::new("load", load)],
    )
    .unwrap();
    let data = Dataset::Table(table);
    let train = data.slice(0..40);
    let test = data.slice(40..50);

    let trained = Lstm::new(6, 3, 5, 2).unwrap().train(&train).unwrap();
    assert_eq!(trained.predict_holdout(&test).unwrap().len(), 10);
    assert!(matches!(trained.forecast(3), Err(ForecastError::ConfigError(_))));

    let univariate = create_test_data(&sine(10));
    assert!(matches!(
        trained.predict_holdout(&univariate),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn lstm_needs_more_rows_than_sequence_length() {
    let train = create_test_data(&sine(6));
    assert!(matches!(
        LstmTrainer::new(&train, 6, 2, 0),
        Err(ForecastError::FitError(_))
    ));
}
