//! # Thermocast
//!
//! Workspace facade for the battery temperature forecasting workbench.
//! `thermo_math` holds the numeric kernels and `thermo_forecast` the
//! cleaning, transformation, model search and reporting pipeline.
//!
//! ## Example
//!
//! ```
//! use thermocast_workspace::forecast::config::ModelFamily;
//!
//! let family = ModelFamily::RollingMean;
//! assert!(family.is_searched());
//! assert_eq!(family.to_string(), "rolling-mean");
//! ```

pub use thermo_forecast as forecast;
pub use thermo_math as math;

/// Version of the workbench crate
pub fn version() -> &'static str {
    thermo_forecast::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_reexports() {
        assert_eq!(version(), forecast::VERSION);
        assert_eq!(math::Reducer::Max.reduce(&[1.0, 3.0, 2.0]), 3.0);
    }
}
