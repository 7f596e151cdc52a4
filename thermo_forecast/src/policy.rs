//! Per-column aggregation functions used by resampling and smoothing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thermo_math::Reducer;

pub const BATTERY_MAX_TEMPERATURE: &str = "system_battery_max_temperature";
pub const BATTERY_MIN_TEMPERATURE: &str = "system_battery_min_temperature";
pub const BATTERY_SOC: &str = "system_battery_soc";
pub const BATTERY_VOLTAGE: &str = "system_battery_voltage";
pub const BATTERY_DISCHARGE_KWH: &str = "system_battery_dchg_kwh";
pub const FIBO_TEMPERATURE: &str = "system_fibo_temperature";
pub const IGBT_TEMPERATURE: &str = "system_load_controller_igbt_temperature_1";
pub const GRID_AVAILABLE: &str = "system_grid_available";
pub const GRID_SESSION_DURATION: &str = "system_grid_session_duration";

/// Mapping from column name to the function that aggregates it.
///
/// Columns without an entry never take part in resampling or smoothing;
/// they are dropped from the output instead of getting a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationPolicy {
    functions: BTreeMap<String, Reducer>,
}

impl AggregationPolicy {
    /// Policy with no entries
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, reducer: Reducer) -> Self {
        self.functions.insert(column.into(), reducer);
        self
    }

    pub fn get(&self, column: &str) -> Option<Reducer> {
        self.functions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.functions.contains_key(column)
    }

    /// Entries of `overrides` replace or extend this policy
    pub fn merged(&self, overrides: &AggregationPolicy) -> Self {
        let mut functions = self.functions.clone();
        functions.extend(overrides.functions.iter().map(|(k, v)| (k.clone(), *v)));
        Self { functions }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Reducer)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for AggregationPolicy {
    /// Battery telemetry defaults: temperatures keep their extremes, state of
    /// charge is averaged, energy counters are summed, and the voltage uses
    /// the median so a single dropout does not drag a bucket down.
    fn default() -> Self {
        Self::empty()
            .with(BATTERY_MAX_TEMPERATURE, Reducer::Max)
            .with(BATTERY_MIN_TEMPERATURE, Reducer::Min)
            .with(BATTERY_SOC, Reducer::Mean)
            .with(BATTERY_VOLTAGE, Reducer::Median)
            .with(BATTERY_DISCHARGE_KWH, Reducer::Sum)
            .with(FIBO_TEMPERATURE, Reducer::Max)
            .with(IGBT_TEMPERATURE, Reducer::Max)
            .with(GRID_AVAILABLE, Reducer::Max)
            .with(GRID_SESSION_DURATION, Reducer::Max)
    }
}
