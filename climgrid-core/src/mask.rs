//! Region masking
//!
//! Selects the inside or the outside of a longitude/latitude box and replaces
//! everything else with NaN, leaving the coordinates untouched.
//!
//! # Examples
//!
//! ```rust
//! use climgrid_core::grid::{Grid, Variable};
//! use climgrid_core::mask::{mask_bounds, RegionBounds, SelectHow};
//! use ndarray::{array, Array2};
//!
//! let mut grid = Grid::new();
//! grid.insert_coord("lon", array![0.0, 90.0, 180.0, 270.0]).unwrap();
//! grid.insert_coord("lat", array![-45.0, 45.0]).unwrap();
//! grid.insert_variable(
//!     "TS",
//!     Variable::new(&["lon", "lat"], Array2::from_elem((4, 2), 1.0).into_dyn()).unwrap(),
//! )
//! .unwrap();
//!
//! // Northern hemisphere west of the prime meridian
//! let bounds = RegionBounds::new(Some((-100.0, -10.0)), Some((0.0, 90.0)));
//! let masked = mask_bounds(&grid, &bounds, SelectHow::Inside, "lon", "lat").unwrap();
//!
//! let ts = masked.variable("TS").unwrap().values();
//! assert_eq!(ts[[3, 1]], 1.0);
//! assert!(ts[[3, 0]].is_nan());
//! assert!(ts[[0, 1]].is_nan());
//! ```

use crate::coords::{check_lon_lat_match, monotonic_direction};
use crate::errors::{GridError, GridResult};
use crate::grid::{FloatValue, Grid};
use crate::options::GridOptions;
use crate::shift::shift_lon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Closed longitude and latitude intervals defining a region
///
/// `None` on an axis means the whole valid range of that axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    /// `(min, max)` longitude in degrees
    pub lon: Option<(FloatValue, FloatValue)>,
    /// `(min, max)` latitude in degrees
    pub lat: Option<(FloatValue, FloatValue)>,
}

impl RegionBounds {
    /// Longitude range used when no longitude bounds are given
    pub const DEFAULT_LON: (FloatValue, FloatValue) = (-180.0, 180.0);
    /// Latitude range used when no latitude bounds are given
    pub const DEFAULT_LAT: (FloatValue, FloatValue) = (-90.0, 90.0);

    pub fn new(
        lon: Option<(FloatValue, FloatValue)>,
        lat: Option<(FloatValue, FloatValue)>,
    ) -> Self {
        Self { lon, lat }
    }

    /// No bounds on either axis
    pub fn global() -> Self {
        Self::default()
    }

    /// True if neither axis is bounded
    pub fn is_global(&self) -> bool {
        self.lon.is_none() && self.lat.is_none()
    }

    pub fn lon_or_default(&self) -> (FloatValue, FloatValue) {
        self.lon.unwrap_or(Self::DEFAULT_LON)
    }

    pub fn lat_or_default(&self) -> (FloatValue, FloatValue) {
        self.lat.unwrap_or(Self::DEFAULT_LAT)
    }
}

/// Which side of the region boundary to keep
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectHow {
    /// Keep the region, mask everything outside it
    #[default]
    Inside,
    /// Keep everything outside the region, mask the region itself
    Outside,
}

impl FromStr for SelectHow {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inside" => Ok(SelectHow::Inside),
            "outside" => Ok(SelectHow::Outside),
            other => Err(GridError::InvalidInput(format!(
                "select_how must be \"inside\" or \"outside\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for SelectHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectHow::Inside => write!(f, "inside"),
            SelectHow::Outside => write!(f, "outside"),
        }
    }
}

/// Select inside or outside the region bounds and mask elsewhere
///
/// The grid is shifted so that its longitudes start at the lower longitude
/// bound, masked, and shifted back. Variables are masked only along the
/// dimensions they carry: `Inside` masks by longitude and by latitude
/// independently, `Outside` needs both dimensions since the outside of a box
/// cannot be decomposed per axis.
///
/// # Errors
///
/// * [`GridError::KeyNotFound`] if either coordinate is missing
/// * [`GridError::InvalidInput`] if either coordinate is not monotonic or
///   both names are the same
/// * [`GridError::RuntimeInvariant`] if the coordinates cannot be restored
pub fn mask_bounds(
    grid: &Grid,
    bounds: &RegionBounds,
    select_how: SelectHow,
    lon_name: &str,
    lat_name: &str,
) -> GridResult<Grid> {
    mask_bounds_with_options(grid, bounds, select_how, &GridOptions::new(lon_name, lat_name))
}

/// Select inside or outside the region bounds using explicit options
pub fn mask_bounds_with_options(
    grid: &Grid,
    bounds: &RegionBounds,
    select_how: SelectHow,
    options: &GridOptions,
) -> GridResult<Grid> {
    options.validate()?;
    let lon_name = options.lon_name.as_str();
    let lat_name = options.lat_name.as_str();
    let (lon_lo, lon_hi) = bounds.lon_or_default();
    let (lat_lo, lat_hi) = bounds.lat_or_default();

    // Current minimum longitude, restored after masking
    let original_lon_min = grid
        .coord_values(lon_name)?
        .fold(FloatValue::INFINITY, |acc, &x| acc.min(x));
    monotonic_direction(grid.coord_values(lat_name)?, lat_name)?;

    let mut data = shift_lon(grid, lon_lo, lon_name)?;
    let lon = data.coord_values(lon_name)?.to_owned();
    let lat = data.coord_values(lat_name)?.to_owned();

    data = match select_how {
        SelectHow::Inside => {
            let lon_keep: Vec<bool> = lon.iter().map(|&x| x >= lon_lo && x <= lon_hi).collect();
            let lat_keep: Vec<bool> = lat.iter().map(|&y| y >= lat_lo && y <= lat_hi).collect();
            data.mask_along(lon_name, &lon_keep)?
                .mask_along(lat_name, &lat_keep)?
        }
        SelectHow::Outside => data.mask_pairs(lon_name, lat_name, |i, j| {
            lon[i] < lon_lo || lon[i] > lon_hi || lat[j] < lat_lo || lat[j] > lat_hi
        }),
    };

    data = shift_lon(&data, original_lon_min, lon_name)?;
    restore_coordinates(grid, data, select_how, options)
}

/// Put `data` back onto the lon/lat coordinates of `original`
///
/// Shifting longitudes there and back may not be exact, in which case the
/// data is reindexed to the nearest original coordinate.
fn restore_coordinates(
    original: &Grid,
    data: Grid,
    select_how: SelectHow,
    options: &GridOptions,
) -> GridResult<Grid> {
    let lon_name = options.lon_name.as_str();
    let lat_name = options.lat_name.as_str();
    if check_lon_lat_match(original, &data, lon_name, lat_name)? {
        return Ok(data);
    }

    warn!(
        %select_how,
        tolerance = options.reindex_tolerance,
        "Input and output lon/lat coordinates not equal. Attempting to reindex."
    );
    let data = data.reindex_nearest(original, &[lon_name, lat_name], options.reindex_tolerance)?;
    if !check_lon_lat_match(original, &data, lon_name, lat_name)? {
        return Err(GridError::RuntimeInvariant(
            "Input and output lon/lat coordinates not equal. Failed to solve by reindexing."
                .to_string(),
        ));
    }
    Ok(data)
}
