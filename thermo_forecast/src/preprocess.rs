//! Cleaning of raw telemetry into a per-minute table
//!
//! The steps run in a fixed order. The target column is filtered before
//! anything is filled or interpolated so that no interpolation ever spans
//! a row that was dropped for lacking a target.

use crate::data::{Column, RawTable, RawValues, TimeSeriesTable};
use crate::error::{ForecastError, Result};
use crate::policy::{
    BATTERY_MAX_TEMPERATURE, BATTERY_SOC, BATTERY_VOLTAGE, GRID_AVAILABLE, GRID_SESSION_DURATION,
};
use crate::timing::ScopedTimer;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thermo_math::interpolation::{fill_limited, interpolate_cubic, interpolate_linear, FillOrder};
use tracing::{debug, info, warn};

fn default_datetime_col() -> String {
    "registered_at".to_string()
}

fn default_target() -> String {
    BATTERY_MAX_TEMPERATURE.to_string()
}

fn default_grid_col() -> Option<String> {
    Some(GRID_AVAILABLE.to_string())
}

fn default_session_col() -> String {
    GRID_SESSION_DURATION.to_string()
}

fn default_voltage_col() -> Option<String> {
    Some(BATTERY_VOLTAGE.to_string())
}

fn default_soc_col() -> Option<String> {
    Some(BATTERY_SOC.to_string())
}

fn default_fill_limit() -> usize {
    30
}

fn default_grid_fill_limit() -> usize {
    120
}

/// Which columns play which role during cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessConfig {
    #[serde(default = "default_datetime_col")]
    pub datetime_col: String,
    #[serde(default = "default_target")]
    pub target: String,
    /// Boolean grid-availability flag, skipped when absent from the data
    #[serde(default = "default_grid_col")]
    pub grid_col: Option<String>,
    /// Name of the derived session-duration column
    #[serde(default = "default_session_col")]
    pub session_col: String,
    /// Rows where this reading is exactly zero are dropped
    #[serde(default = "default_voltage_col")]
    pub voltage_col: Option<String>,
    /// State of charge, filled and linearly interpolated
    #[serde(default = "default_soc_col")]
    pub soc_col: Option<String>,
    #[serde(default = "default_fill_limit")]
    pub fill_limit: usize,
    #[serde(default = "default_grid_fill_limit")]
    pub grid_fill_limit: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            datetime_col: default_datetime_col(),
            target: default_target(),
            grid_col: default_grid_col(),
            session_col: default_session_col(),
            voltage_col: default_voltage_col(),
            soc_col: default_soc_col(),
            fill_limit: default_fill_limit(),
            grid_fill_limit: default_grid_fill_limit(),
        }
    }
}

/// Turns a [`RawTable`] into a gap-free per-minute [`TimeSeriesTable`]
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

/// Row-oriented working state between steps
struct Rows {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl Rows {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut it = keep.iter();
        self.index.retain(|_| *it.next().unwrap_or(&false));
        for col in &mut self.columns {
            let mut it = keep.iter();
            col.values.retain(|_| *it.next().unwrap_or(&false));
        }
    }
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run every cleaning step.
    ///
    /// Fails with [`ForecastError::EmptyData`] when no row survives the
    /// target and voltage filters.
    pub fn run(&self, raw: &RawTable) -> Result<TimeSeriesTable> {
        let _timer = ScopedTimer::start("preprocess");
        let cfg = &self.config;

        let mut rows = self.index_rows(raw)?;
        let target = rows.position(&cfg.target).ok_or_else(|| {
            ForecastError::DataError(format!("Target column '{}' is missing", cfg.target))
        })?;

        let keep: Vec<bool> = rows.columns[target]
            .values
            .iter()
            .map(|v| !v.is_nan())
            .collect();
        self.drop_rows(&mut rows, &keep, "missing target");
        if rows.len() == 0 {
            return Err(ForecastError::EmptyData(format!(
                "Target column '{}' has no observations",
                cfg.target
            )));
        }

        let keep: Vec<bool> = std::iter::once(true)
            .chain(rows.index.windows(2).map(|w| w[1] != w[0]))
            .collect();
        self.drop_rows(&mut rows, &keep, "duplicate timestamp");

        self.derive_grid_session(&mut rows);

        if let Some(voltage) = cfg.voltage_col.as_deref().and_then(|c| rows.position(c)) {
            let keep: Vec<bool> = rows.columns[voltage]
                .values
                .iter()
                .map(|&v| v != 0.0)
                .collect();
            self.drop_rows(&mut rows, &keep, "zero voltage");
        }
        if rows.len() == 0 {
            return Err(ForecastError::EmptyData(
                "Every row was dropped by the voltage filter".to_string(),
            ));
        }

        let mut rows = self.reindex_minutely(rows);

        let target = rows.position(&cfg.target).ok_or_else(|| {
            ForecastError::DataError(format!("Target column '{}' is missing", cfg.target))
        })?;
        let filled = fill_limited(
            &rows.columns[target].values,
            cfg.fill_limit,
            FillOrder::BackwardFirst,
        );
        rows.columns[target].values = interpolate_cubic(&filled)?;

        if let Some(soc) = cfg.soc_col.as_deref().and_then(|c| rows.position(c)) {
            let filled =
                fill_limited(&rows.columns[soc].values, cfg.fill_limit, FillOrder::BackwardFirst);
            if filled.iter().any(|v| !v.is_nan()) {
                rows.columns[soc].values = interpolate_linear(&filled)?;
            } else {
                warn!(column = %rows.columns[soc].name, "state of charge has no observations");
            }
        }

        info!(rows = rows.len(), columns = rows.columns.len(), "preprocessing done");
        TimeSeriesTable::new(rows.index, rows.columns)
    }

    /// Parse the datetime column, drop unparseable rows, sort stably.
    fn index_rows(&self, raw: &RawTable) -> Result<Rows> {
        let cfg = &self.config;
        let dt = raw.column(&cfg.datetime_col).ok_or_else(|| {
            ForecastError::DataError(format!(
                "Datetime column '{}' is missing",
                cfg.datetime_col
            ))
        })?;

        let stamps: Vec<Option<DateTime<Utc>>> = match &dt.values {
            RawValues::Timestamps(v) => v.clone(),
            RawValues::Text(v) => v
                .iter()
                .map(|s| s.as_deref().and_then(crate::data::parse_timestamp))
                .collect(),
            RawValues::Numeric(_) => {
                return Err(ForecastError::DataError(format!(
                    "Datetime column '{}' is numeric",
                    cfg.datetime_col
                )))
            }
        };

        let mut order: Vec<usize> = (0..stamps.len()).filter(|&i| stamps[i].is_some()).collect();
        let unparsed = stamps.len() - order.len();
        if unparsed > 0 {
            warn!(rows = unparsed, "dropping rows with unparseable timestamps");
        }
        // sort_by_key is stable, so rows sharing a timestamp keep file order.
        order.sort_by_key(|&i| stamps[i]);

        let index: Vec<DateTime<Utc>> = order.iter().filter_map(|&i| stamps[i]).collect();
        let mut columns = Vec::new();
        for col in raw.columns() {
            if col.name == cfg.datetime_col {
                continue;
            }
            match &col.values {
                RawValues::Numeric(values) => columns.push(Column::new(
                    col.name.clone(),
                    order.iter().map(|&i| values[i]).collect(),
                )),
                _ => debug!(column = %col.name, "ignoring non-numeric column"),
            }
        }

        Ok(Rows { index, columns })
    }

    fn drop_rows(&self, rows: &mut Rows, keep: &[bool], reason: &str) {
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            rows.retain(keep);
        }
        debug!(rule = reason, dropped, remaining = rows.len(), "filtered rows");
    }

    /// Fill short gaps in the grid flag and count samples per flag run.
    fn derive_grid_session(&self, rows: &mut Rows) {
        let cfg = &self.config;
        let Some(grid) = cfg.grid_col.as_deref().and_then(|c| rows.position(c)) else {
            return;
        };

        let flag: Vec<f64> = fill_limited(
            &rows.columns[grid].values,
            cfg.grid_fill_limit,
            FillOrder::ForwardFirst,
        )
        .into_iter()
        .map(|v| if v.is_nan() || v == 0.0 { 0.0 } else { 1.0 })
        .collect();

        let mut session = Vec::with_capacity(flag.len());
        let mut run = 0.0;
        for (i, &f) in flag.iter().enumerate() {
            run = if i > 0 && flag[i - 1] == f { run + 1.0 } else { 1.0 };
            session.push(run);
        }

        rows.columns[grid].values = flag;
        match rows.position(&cfg.session_col) {
            Some(existing) => rows.columns[existing].values = session,
            None => rows.columns.push(Column::new(cfg.session_col.clone(), session)),
        }
    }

    /// Lay rows onto an exact one-minute grid starting at the first timestamp.
    ///
    /// Rows that fall between grid points are dropped; grid points without a
    /// row get missing values.
    fn reindex_minutely(&self, rows: Rows) -> Rows {
        let (Some(&first), Some(&last)) = (rows.index.first(), rows.index.last()) else {
            return rows;
        };

        let lookup: HashMap<DateTime<Utc>, usize> =
            rows.index.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let steps = (last - first).num_minutes().max(0) as usize;
        let grid: Vec<DateTime<Utc>> = (0..=steps)
            .map(|k| first + Duration::minutes(k as i64))
            .collect();

        let positions: Vec<Option<usize>> = grid.iter().map(|t| lookup.get(t).copied()).collect();
        let matched = positions.iter().filter(|p| p.is_some()).count();
        if matched < rows.len() {
            warn!(rows = rows.len() - matched, "dropping rows off the minute grid");
        }
        debug!(
            inserted = grid.len() - matched,
            "inserted missing rows while reindexing"
        );

        let columns = rows
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    positions
                        .iter()
                        .map(|p| p.map_or(f64::NAN, |i| c.values[i]))
                        .collect(),
                )
            })
            .collect();

        Rows {
            index: grid,
            columns,
        }
    }
}
