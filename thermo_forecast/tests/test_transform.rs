use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use thermo_forecast::config::{ExperimentOptions, ModelFamily};
use thermo_forecast::data::{Column, TimeSeriesTable};
use thermo_forecast::error::ForecastError;
use thermo_forecast::policy::{AggregationPolicy, BATTERY_MAX_TEMPERATURE, BATTERY_SOC};
use thermo_forecast::transform::{
    aggregate, differentiate, scale, transform, Granularity, TransformConfig,
};
use thermo_math::Reducer;

/// Six hours of 20-minute readings
fn create_test_table() -> TimeSeriesTable {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let index = (0..18).map(|i| start + Duration::minutes(20 * i)).collect();
    let temp: Vec<f64> = (0..18).map(|i| 25.0 + (i % 5) as f64 + i as f64 * 0.5).collect();
    let soc: Vec<f64> = (0..18).map(|i| 90.0 - i as f64).collect();
    let other: Vec<f64> = (0..18).map(|i| i as f64).collect();
    TimeSeriesTable::new(
        index,
        vec![
            Column::new(BATTERY_MAX_TEMPERATURE, temp),
            Column::new(BATTERY_SOC, soc),
            Column::new("site_humidity", other),
        ],
    )
    .unwrap()
}

#[test]
fn all_stages_compose_in_fixed_order() {
    let table = create_test_table();
    let policy = AggregationPolicy::default().with("site_humidity", Reducer::Mean);
    let config = TransformConfig {
        scaling: true,
        aggregation: Some(Granularity::Hour),
        differentiation: true,
    };

    let chained = transform(&table, &config, &policy).unwrap();
    let composed =
        differentiate(&aggregate(&scale(&table).unwrap(), Granularity::Hour, &policy).unwrap())
            .unwrap();
    assert_eq!(chained, composed);
    assert_eq!(chained.len(), 5);
}

#[test]
fn disabled_transform_is_identity() {
    let table = create_test_table();
    let out = transform(&table, &TransformConfig::default(), &AggregationPolicy::default()).unwrap();
    assert_eq!(out, table);
}

#[test]
fn config_key_order_does_not_matter() {
    let resolve = |json: &str| {
        serde_json::from_str::<ExperimentOptions>(json)
            .unwrap()
            .resolve(ModelFamily::SimpleAverage)
            .unwrap()
            .transform
    };
    let a = resolve(r#"{"differentiation": true, "aggregation": {"rule": "h"}, "scaling": true}"#);
    let b = resolve(r#"{"scaling": true, "aggregation": {"rule": "h"}, "differentiation": true}"#);
    assert_eq!(a, b);

    let table = create_test_table();
    let policy = AggregationPolicy::default();
    assert_eq!(
        transform(&table, &a, &policy).unwrap(),
        transform(&table, &b, &policy).unwrap()
    );
}

#[test]
fn aggregation_excludes_unknown_columns() {
    let table = create_test_table();
    let out = aggregate(&table, Granularity::Hour, &AggregationPolicy::default()).unwrap();
    assert_eq!(out.column_names(), vec![BATTERY_MAX_TEMPERATURE, BATTERY_SOC]);
    assert!(out.column("site_humidity").is_none());
}

#[test]
fn aggregation_uses_policy_reducers() {
    let table = create_test_table();
    let out = aggregate(&table, Granularity::Hour, &AggregationPolicy::default()).unwrap();
    assert_eq!(out.len(), 6);
    // Max temperature per hour, mean state of charge
    assert_eq!(out.column(BATTERY_MAX_TEMPERATURE).unwrap().values[0], 28.0);
    assert_eq!(out.column(BATTERY_SOC).unwrap().values[0], 89.0);
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap();
    assert_eq!(out.index()[1], start);
}

#[test]
fn weekly_buckets_start_on_monday() {
    let sunday = Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap();
    let monday = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    assert_eq!(Granularity::Week.bucket(sunday), monday);
}

#[test]
fn scaling_standardizes_each_column() {
    let out = scale(&create_test_table()).unwrap();
    for column in out.columns() {
        let n = column.values.len() as f64;
        let mean = column.values.iter().sum::<f64>() / n;
        let var = column.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        assert_relative_eq!(var, 1.0, epsilon = 1e-9);
    }
}

#[test]
fn scaling_keeps_columns_without_observations() {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let index = (0..3).map(|i| start + Duration::hours(i)).collect();
    let table = TimeSeriesTable::new(
        index,
        vec![
            Column::new(BATTERY_MAX_TEMPERATURE, vec![1.0, 2.0, 3.0]),
            Column::new(BATTERY_SOC, vec![f64::NAN; 3]),
        ],
    )
    .unwrap();
    let config = TransformConfig {
        scaling: true,
        ..TransformConfig::default()
    };

    let out = transform(&table, &config, &AggregationPolicy::default()).unwrap();
    let soc = out.column(BATTERY_SOC).unwrap();
    assert!(soc.values.iter().all(|v| v.is_nan()));
    let temp = out.column(BATTERY_MAX_TEMPERATURE).unwrap();
    let sd = (2.0f64 / 3.0).sqrt();
    assert_relative_eq!(temp.values[0], -1.0 / sd, epsilon = 1e-9);
    assert_relative_eq!(temp.values[1], 0.0, epsilon = 1e-9);
    assert_relative_eq!(temp.values[2], 1.0 / sd, epsilon = 1e-9);
}

#[test]
fn differentiation_drops_first_row() {
    let table = create_test_table();
    let out = differentiate(&table).unwrap();
    assert_eq!(out.len(), table.len() - 1);
    assert_eq!(out.index()[0], table.index()[1]);
    assert_eq!(out.column("site_humidity").unwrap().values, vec![1.0; 17]);
}

#[rstest]
#[case("min", Granularity::Minute)]
#[case("h", Granularity::Hour)]
#[case("H", Granularity::Hour)]
#[case("d", Granularity::Day)]
#[case("W", Granularity::Week)]
#[case("MS", Granularity::Month)]
fn granularity_rules_parse(#[case] rule: &str, #[case] expected: Granularity) {
    assert_eq!(rule.parse::<Granularity>().unwrap(), expected);
}

#[test]
fn unknown_granularity_is_config_error() {
    assert!(matches!(
        "fortnight".parse::<Granularity>(),
        Err(ForecastError::ConfigError(_))
    ));
}
