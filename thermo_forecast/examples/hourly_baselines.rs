use chrono::{Duration, TimeZone, Utc};
use thermo_forecast::config::{ExperimentFile, ModelFamily, RunSpec};
use thermo_forecast::data::{RawColumn, RawTable, RawValues};
use thermo_forecast::policy::{
    BATTERY_MAX_TEMPERATURE, BATTERY_SOC, BATTERY_VOLTAGE, GRID_AVAILABLE,
};
use thermo_forecast::preprocess::Preprocessor;
use thermo_forecast::report::{LogSink, ReportSink};
use thermo_forecast::runner::run_experiment;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Thermo Forecast: Hourly Baselines Example");
    println!("=========================================\n");

    println!("Creating sample telemetry...");
    let raw = create_sample_telemetry()?;
    println!("Sample telemetry created: {} raw rows\n", raw.height());

    let mut experiment = ExperimentFile::from_json(
        r#"{
            "transform": { "aggregation": { "rule": "h" } },
            "runs": [
                { "model": "persistence-optimistic", "options": { "smoothing": false } },
                { "model": "persistence-realist" },
                { "model": "simple-average" },
                { "model": "linear-regression" },
                { "model": "rolling-mean", "options": { "optimize_for": "MAPE" } }
            ]
        }"#,
    )?;
    experiment.runs.push(RunSpec {
        model: ModelFamily::ExponentialSmoothing,
        options: Default::default(),
    });

    println!("Cleaning telemetry...");
    let table = Preprocessor::new(experiment.preprocess.clone()).run(&raw)?;
    println!("Clean table: {} per-minute rows\n", table.len());

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogSink)];
    let outcome = run_experiment(&table, &experiment, &mut sinks);

    println!("{:<30} {:>8} {:>8} {:>8} {:>8}", "model", "RMSE", "MAE", "MAPE", "R2");
    for report in &outcome.reports {
        let m = &report.evaluation.test;
        println!(
            "{:<30} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            report.model, m.rmse, m.mae, m.mape, m.r2
        );
    }
    for failure in &outcome.failures {
        println!("{} failed: {}", failure.model, failure.error);
    }

    Ok(())
}

/// Three days of minute telemetry with a daily temperature cycle, a few
/// dropped minutes and one duplicated timestamp
fn create_sample_telemetry() -> Result<RawTable, Box<dyn std::error::Error>> {
    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
        .single()
        .ok_or("invalid start time")?;

    let mut timestamps = Vec::new();
    let mut temperature = Vec::new();
    let mut voltage = Vec::new();
    let mut soc = Vec::new();
    let mut grid = Vec::new();

    for minute in 0..3 * 24 * 60 {
        if minute % 97 == 13 {
            continue;
        }
        let hours = minute as f64 / 60.0;
        let daily = (2.0 * std::f64::consts::PI * hours / 24.0).sin();
        timestamps.push(Some(start + Duration::minutes(minute)));
        temperature.push(30.0 + 4.0 * daily + 0.002 * minute as f64);
        voltage.push(52.0 + 0.5 * daily);
        soc.push(60.0 + 20.0 * daily);
        grid.push(if (minute / 240) % 2 == 0 { 1.0 } else { 0.0 });
    }

    timestamps.push(Some(start + Duration::minutes(600)));
    temperature.push(99.0);
    voltage.push(52.0);
    soc.push(50.0);
    grid.push(1.0);

    Ok(RawTable::new(vec![
        RawColumn {
            name: "registered_at".to_string(),
            values: RawValues::Timestamps(timestamps),
        },
        RawColumn {
            name: BATTERY_MAX_TEMPERATURE.to_string(),
            values: RawValues::Numeric(temperature),
        },
        RawColumn {
            name: BATTERY_VOLTAGE.to_string(),
            values: RawValues::Numeric(voltage),
        },
        RawColumn {
            name: BATTERY_SOC.to_string(),
            values: RawValues::Numeric(soc),
        },
        RawColumn {
            name: GRID_AVAILABLE.to_string(),
            values: RawValues::Numeric(grid),
        },
    ])?)
}
