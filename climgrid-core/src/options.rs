//! Options shared by the grid operations
//!
//! Every option has a default, so a configuration file only needs the keys
//! it wants to change:
//!
//! ```rust
//! use climgrid_core::options::{GridOptions, MonotonicPolicy};
//!
//! let options = GridOptions::from_toml_str(
//!     r#"
//!     lon_name = "longitude"
//!     lat_name = "latitude"
//!     monotonic_policy = "wrap_correct"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(options.lon_name, "longitude");
//! assert_eq!(options.monotonic_policy, MonotonicPolicy::WrapCorrect);
//! assert_eq!(options.reindex_tolerance, 1e-3);
//! ```

use crate::errors::{GridError, GridResult};
use crate::grid::FloatValue;
use serde::{Deserialize, Serialize};

/// How grid-cell areas treat a longitude axis that is not monotonic
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonotonicPolicy {
    /// Reject non-monotonic axes
    #[default]
    Strict,
    /// Unwrap 360 degree jumps in longitude before computing cell boundaries
    ///
    /// Latitude is always checked strictly.
    WrapCorrect,
}

/// Names and tolerances used by the grid operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Name of the longitude dimension and coordinate.
    ///
    /// Default: "lon"
    pub lon_name: String,

    /// Name of the latitude dimension and coordinate.
    ///
    /// Default: "lat"
    pub lat_name: String,

    /// Largest coordinate difference accepted when snapping masked data back
    /// onto the original coordinates (degrees).
    ///
    /// Default: 1e-3
    pub reindex_tolerance: FloatValue,

    /// Largest deviation of the summed cell areas from the surface area of
    /// the sphere before a warning is logged (percent).
    ///
    /// Default: 1e-4
    pub area_tolerance_percent: FloatValue,

    /// Handling of non-monotonic longitudes when computing cell areas.
    ///
    /// Default: strict
    pub monotonic_policy: MonotonicPolicy,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            lon_name: "lon".to_string(),
            lat_name: "lat".to_string(),
            reindex_tolerance: 1e-3,
            area_tolerance_percent: 1e-4,
            monotonic_policy: MonotonicPolicy::Strict,
        }
    }
}

impl GridOptions {
    /// Default options with custom coordinate names
    pub fn new(lon_name: &str, lat_name: &str) -> Self {
        Self {
            lon_name: lon_name.to_string(),
            lat_name: lat_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_monotonic_policy(mut self, policy: MonotonicPolicy) -> Self {
        self.monotonic_policy = policy;
        self
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(document: &str) -> GridResult<Self> {
        let options: Self = toml::from_str(document)
            .map_err(|e| GridError::InvalidInput(format!("could not parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the names differ and the tolerances are usable
    pub fn validate(&self) -> GridResult<()> {
        if self.lon_name == self.lat_name {
            return Err(GridError::InvalidInput(format!(
                "longitude and latitude must have different names, both are {}",
                self.lon_name
            )));
        }
        let valid = |tolerance: FloatValue| tolerance.is_finite() && tolerance >= 0.0;
        if !valid(self.reindex_tolerance) || !valid(self.area_tolerance_percent) {
            return Err(GridError::InvalidInput(
                "tolerances must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
