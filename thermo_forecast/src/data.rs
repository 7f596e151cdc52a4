//! Time-indexed telemetry tables and the CSV ingestion boundary
//!
//! Missing observations are `NaN` throughout. A [`RawTable`] is what comes
//! out of the files, unsorted and untyped in its timestamp column; a
//! [`TimeSeriesTable`] is what the preprocessor produces, with a strictly
//! increasing UTC index.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::*;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Values of one raw column as they were read from disk
#[derive(Debug, Clone, PartialEq)]
pub enum RawValues {
    Numeric(Vec<f64>),
    Timestamps(Vec<Option<DateTime<Utc>>>),
    Text(Vec<Option<String>>),
}

impl RawValues {
    pub fn len(&self) -> usize {
        match self {
            RawValues::Numeric(v) => v.len(),
            RawValues::Timestamps(v) => v.len(),
            RawValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn missing(&self, len: usize) -> RawValues {
        match self {
            RawValues::Numeric(_) => RawValues::Numeric(vec![f64::NAN; len]),
            RawValues::Timestamps(_) => RawValues::Timestamps(vec![None; len]),
            RawValues::Text(_) => RawValues::Text(vec![None; len]),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RawValues::Numeric(_) => "numeric",
            RawValues::Timestamps(_) => "timestamp",
            RawValues::Text(_) => "text",
        }
    }

    fn append(&mut self, other: RawValues) -> Result<()> {
        match (self, other) {
            (RawValues::Numeric(a), RawValues::Numeric(b)) => a.extend(b),
            (RawValues::Timestamps(a), RawValues::Timestamps(b)) => a.extend(b),
            (RawValues::Text(a), RawValues::Text(b)) => a.extend(b),
            (a, b) => {
                return Err(ForecastError::DataError(format!(
                    "Cannot concatenate a {} column with a {} column",
                    a.kind(),
                    b.kind()
                )))
            }
        }
        Ok(())
    }
}

/// Named raw column
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: RawValues,
}

/// Rectangular table as ingested, before any cleaning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    height: usize,
}

impl RawTable {
    /// Create a raw table, checking that every column has the same length
    pub fn new(columns: Vec<RawColumn>) -> Result<Self> {
        let height = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != height) {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} rows, expected {}",
                bad.name,
                bad.values.len(),
                height
            )));
        }
        Ok(Self { columns, height })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append `other` below `self`, matching columns by name.
    ///
    /// Columns present in only one of the tables are padded with missing
    /// values on the other side.
    pub fn concat(mut self, other: RawTable) -> Result<Self> {
        let top = self.height;
        let bottom = other.height;

        for col in &mut self.columns {
            if other.column(&col.name).is_none() {
                let pad = col.values.missing(bottom);
                col.values.append(pad)?;
            }
        }

        for col in other.columns {
            match self.columns.iter_mut().find(|c| c.name == col.name) {
                Some(existing) => existing.values.append(col.values)?,
                None => {
                    let mut values = col.values.missing(top);
                    values.append(col.values)?;
                    self.columns.push(RawColumn {
                        name: col.name,
                        values,
                    });
                }
            }
        }

        self.height = top + bottom;
        Ok(self)
    }
}

/// Named numeric column aligned with a table index
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

fn check_index(index: &[DateTime<Utc>]) -> Result<()> {
    if let Some(pos) = index.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ForecastError::DataError(format!(
            "Index is not strictly increasing at position {} ({} -> {})",
            pos + 1,
            index[pos],
            index[pos + 1]
        )));
    }
    Ok(())
}

/// Multi-column table indexed by strictly increasing timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl TimeSeriesTable {
    /// Create a table, validating shape and index order
    pub fn new(index: Vec<DateTime<Utc>>, columns: Vec<Column>) -> Result<Self> {
        check_index(&index)?;
        if let Some(bad) = columns.iter().find(|c| c.values.len() != index.len()) {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} rows but the index has {}",
                bad.name,
                bad.values.len(),
                index.len()
            )));
        }
        Ok(Self { index, columns })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keep only `names`, in that order
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name).cloned().ok_or_else(|| {
                    ForecastError::DataError(format!("Required column '{}' is missing", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }

    /// Rows in `range`
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            index: self.index[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[range.clone()].to_vec()))
                .collect(),
        }
    }

    /// Extract one column as a series
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        let col = self
            .column(name)
            .ok_or_else(|| ForecastError::DataError(format!("Column '{}' is missing", name)))?;
        Ok(TimeSeries {
            name: col.name.clone(),
            index: self.index.clone(),
            values: col.values.clone(),
        })
    }

    pub(crate) fn into_parts(self) -> (Vec<DateTime<Utc>>, Vec<Column>) {
        (self.index, self.columns)
    }
}

/// Single named column with its own index
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    index: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(
        name: impl Into<String>,
        index: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        check_index(&index)?;
        if index.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Series '{}' has {} values but the index has {}",
                name,
                values.len(),
                index.len()
            )));
        }
        Ok(Self {
            name,
            index,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            index: self.index[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        }
    }
}

/// Input to the splitter and to every model: one series or a table whose
/// first column is the target
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Series(TimeSeries),
    Table(TimeSeriesTable),
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Series(s) => s.len(),
            Dataset::Table(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        match self {
            Dataset::Series(s) => s.index(),
            Dataset::Table(t) => t.index(),
        }
    }

    /// Number of value columns
    pub fn width(&self) -> usize {
        match self {
            Dataset::Series(_) => 1,
            Dataset::Table(t) => t.columns().len(),
        }
    }

    /// Name of the target column
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Dataset::Series(s) => Some(s.name()),
            Dataset::Table(t) => t.columns().first().map(|c| c.name.as_str()),
        }
    }

    /// Values of the target column
    pub fn target(&self) -> Result<&[f64]> {
        match self {
            Dataset::Series(s) => Ok(s.values()),
            Dataset::Table(t) => t
                .columns()
                .first()
                .map(|c| c.values.as_slice())
                .ok_or_else(|| {
                    ForecastError::ConfigError("Table has no columns to forecast".to_string())
                }),
        }
    }

    /// Row-major feature matrix, target first
    pub fn rows(&self) -> Vec<Vec<f64>> {
        match self {
            Dataset::Series(s) => s.values().iter().map(|&v| vec![v]).collect(),
            Dataset::Table(t) => (0..t.len())
                .map(|i| t.columns().iter().map(|c| c.values[i]).collect())
                .collect(),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        match self {
            Dataset::Series(s) => Dataset::Series(s.slice(range)),
            Dataset::Table(t) => Dataset::Table(t.slice(range)),
        }
    }
}

impl From<TimeSeries> for Dataset {
    fn from(series: TimeSeries) -> Self {
        Dataset::Series(series)
    }
}

impl From<TimeSeriesTable> for Dataset {
    fn from(table: TimeSeriesTable) -> Self {
        Dataset::Table(table)
    }
}

/// Parse a timestamp the way telemetry exports write them.
///
/// Offsets are honoured and converted to UTC; naive timestamps are taken
/// to be UTC already.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_bool(raw: &str) -> Option<f64> {
    match raw.trim().to_lowercase().as_str() {
        "true" => Some(1.0),
        "false" => Some(0.0),
        _ => None,
    }
}

/// Data loader for telemetry exports
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load one CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), "read csv");
        Self::from_dataframe(&df)
    }

    /// Load every `*.csv` file below `dir` and stack them by column name.
    ///
    /// Files are visited in path order so the result does not depend on
    /// directory iteration order.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<RawTable> {
        let mut files = Vec::new();
        collect_csv_files(dir.as_ref(), &mut files)?;
        files.sort();

        if files.is_empty() {
            return Err(ForecastError::DataError(format!(
                "No CSV files found under {}",
                dir.as_ref().display()
            )));
        }

        let mut table = RawTable::default();
        for file in &files {
            table = table.concat(Self::from_csv(file)?)?;
        }

        info!(
            files = files.len(),
            rows = table.height(),
            columns = table.columns().len(),
            "loaded telemetry"
        );
        Ok(table)
    }

    /// Convert an in-memory polars DataFrame
    pub fn from_dataframe(df: &DataFrame) -> Result<RawTable> {
        let mut columns = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            match Self::convert_series(series)? {
                Some(values) => columns.push(RawColumn {
                    name: series.name().to_string(),
                    values,
                }),
                None => warn!(
                    column = series.name(),
                    dtype = %series.dtype(),
                    "skipping column with unsupported type"
                ),
            }
        }
        RawTable::new(columns)
    }

    fn convert_series(series: &Series) -> Result<Option<RawValues>> {
        let values = match series.dtype() {
            DataType::Boolean => RawValues::Numeric(
                series
                    .bool()?
                    .into_iter()
                    .map(|v| v.map_or(f64::NAN, |b| if b { 1.0 } else { 0.0 }))
                    .collect(),
            ),
            DataType::Utf8 => {
                let text: Vec<Option<String>> = series
                    .utf8()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect();
                let present: Vec<&String> = text.iter().flatten().collect();
                if !present.is_empty() && present.iter().all(|v| parse_bool(v).is_some()) {
                    RawValues::Numeric(
                        text.iter()
                            .map(|v| v.as_deref().and_then(parse_bool).unwrap_or(f64::NAN))
                            .collect(),
                    )
                } else {
                    RawValues::Text(text)
                }
            }
            DataType::Datetime(unit, _) => {
                let per_second: i64 = match unit {
                    TimeUnit::Nanoseconds => 1_000_000_000,
                    TimeUnit::Microseconds => 1_000_000,
                    TimeUnit::Milliseconds => 1_000,
                };
                RawValues::Timestamps(
                    series
                        .datetime()?
                        .into_iter()
                        .map(|v| {
                            v.and_then(|ts| {
                                let secs = ts.div_euclid(per_second);
                                let sub = ts.rem_euclid(per_second);
                                let nanos = (sub * (1_000_000_000 / per_second)) as u32;
                                Utc.timestamp_opt(secs, nanos).single()
                            })
                        })
                        .collect(),
                )
            }
            DataType::Date => RawValues::Timestamps(
                series
                    .date()?
                    .into_iter()
                    .map(|v| {
                        v.and_then(|days| Utc.timestamp_opt(i64::from(days) * 86_400, 0).single())
                    })
                    .collect(),
            ),
            dtype if dtype.is_numeric() => RawValues::Numeric(
                series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect(),
            ),
            DataType::Null => RawValues::Numeric(vec![f64::NAN; series.len()]),
            _ => return Ok(None),
        };
        Ok(Some(values))
    }
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}
