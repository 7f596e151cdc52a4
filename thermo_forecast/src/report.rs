//! Report sinks
//!
//! A sink receives every finished [`RunReport`]. [`LogSink`] writes metrics to
//! the log and [`DirectorySink`] writes a text summary plus CSV files into a
//! destination directory.

use crate::error::Result;
use crate::evaluate::MetricSet;
use crate::runner::{PartitionResult, RunReport};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for finished runs
pub trait ReportSink {
    fn save(&mut self, report: &RunReport) -> Result<()>;
}

/// Logs the metrics of each run
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn save(&mut self, report: &RunReport) -> Result<()> {
        if let Some(train) = &report.evaluation.train {
            for (metric, value) in train.iter() {
                info!(model = %report.model, partition = "train", %metric, value, "metric");
            }
        }
        for (metric, value) in report.evaluation.test.iter() {
            info!(model = %report.model, partition = "test", %metric, value, "metric");
        }
        for observation in &report.observations {
            info!(model = %report.model, %observation, "observation");
        }
        Ok(())
    }
}

/// Writes `<model>-<target>-run.txt`, `-predictions.csv` and, after a
/// search, `-tuning.csv`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct PredictionRecord<'a> {
    timestamp: String,
    partition: &'a str,
    actual: f64,
    predicted: Option<f64>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, report: &RunReport, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}-{}", report.model, report.target, suffix))
    }
}

fn write_metrics(out: &mut String, title: &str, metrics: &MetricSet) {
    let _ = writeln!(out, "# Metrics {}", title);
    for (metric, value) in metrics.iter() {
        let _ = writeln!(out, "{}: {:.2}", metric, value);
    }
}

/// Text summary of one run
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "model: {}", report.model);
    let _ = writeln!(out, "target: {}", report.target);
    if let (Some(start), Some(end)) = (report.train.index.first(), report.train.index.last()) {
        let _ = writeln!(out, "start: {}", start.to_rfc3339());
        let _ = writeln!(out, "end: {}", end.to_rfc3339());
    }
    if let Some(train) = &report.evaluation.train {
        write_metrics(&mut out, "Train", train);
    }
    write_metrics(&mut out, "Test", &report.evaluation.test);
    let _ = writeln!(out, "# Observations");
    for observation in &report.observations {
        let _ = writeln!(out, "{}", observation);
    }
    out
}

fn write_partition<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    name: &str,
    partition: &PartitionResult,
) -> Result<()> {
    for (i, (t, actual)) in partition.index.iter().zip(&partition.actual).enumerate() {
        writer.serialize(PredictionRecord {
            timestamp: t.to_rfc3339(),
            partition: name,
            actual: *actual,
            predicted: partition.prediction_at(i),
        })?;
    }
    Ok(())
}

impl ReportSink for DirectorySink {
    fn save(&mut self, report: &RunReport) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let summary = self.path(report, "run.txt");
        fs::write(&summary, render_summary(report))?;

        let mut writer = csv::Writer::from_path(self.path(report, "predictions.csv"))?;
        write_partition(&mut writer, "train", &report.train)?;
        write_partition(&mut writer, "test", &report.test)?;
        writer.flush()?;

        if !report.trace.is_empty() {
            let mut writer = csv::Writer::from_path(self.path(report, "tuning.csv"))?;
            for entry in &report.trace {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        }

        info!(model = %report.model, path = %summary.display(), "saved report");
        Ok(())
    }
}
