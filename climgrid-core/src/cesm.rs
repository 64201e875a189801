//! Time axis helpers for CESM output
//!
//! CESM history files stamp monthly means at the end of each averaging
//! period. The midpoints of `time_bnds` give a more useful time axis.

use crate::calendar::{convert_to_datetime, Calendar};
use crate::errors::{GridError, GridResult};
use crate::grid::{FloatValue, Grid};
use chrono::NaiveDateTime;
use ndarray::{Axis, Ix2, IxDyn};

/// Earliest reference year accepted by [`time_from_bounds`] unless overridden
pub const DEFAULT_MIN_YEAR: i32 = 1701;

/// Names CESM (and CDO post-processing) use for the bounds dimension
const BOUNDS_DIMS: [&str; 2] = ["bnds", "nb2"];

/// Decoded time axis and bounds
#[derive(Debug, Clone, PartialEq)]
pub struct CesmTime {
    /// Midpoint of each averaging period
    pub time: Vec<NaiveDateTime>,
    /// Start and end of each averaging period
    pub time_bounds: Vec<[NaiveDateTime; 2]>,
}

/// Decode the midpoints of `time_bnds` into timestamps
///
/// The `units` and `calendar` attributes are read from the `time`
/// coordinate. If the reference year in the units is earlier than
/// `min_year` it is moved to `min_year`, which keeps dates from early model
/// years within the range supported by most datetime libraries.
///
/// # Errors
///
/// * [`GridError::KeyNotFound`] if `time`, `time_bnds` or the `units` and
///   `calendar` attributes are missing
/// * [`GridError::InvalidInput`] if `time_bnds` is not `(time, bnds)` or
///   `(time, nb2)` with two bounds per step
/// * Any error from [`convert_to_datetime`]
pub fn time_from_bounds(grid: &Grid, min_year: i32) -> GridResult<CesmTime> {
    let time = grid.coord("time")?;
    let units = time
        .attr("units")
        .ok_or_else(|| GridError::KeyNotFound("units attribute of time".to_string()))?;
    let calendar: Calendar = time
        .attr("calendar")
        .ok_or_else(|| GridError::KeyNotFound("calendar attribute of time".to_string()))?
        .parse()?;

    let bounds = grid.variable("time_bnds")?;
    let bounds_axis = BOUNDS_DIMS
        .iter()
        .find_map(|dim| bounds.axis_of(dim))
        .ok_or_else(|| {
            GridError::InvalidInput(format!(
                "time_bnds needs a {} dimension, has {:?}",
                BOUNDS_DIMS.join(" or "),
                bounds.dims()
            ))
        })?;
    let time_axis = bounds.axis_of("time").ok_or_else(|| {
        GridError::InvalidInput(format!(
            "time_bnds needs a time dimension, has {:?}",
            bounds.dims()
        ))
    })?;
    if bounds.dims().len() != 2 || bounds.shape()[bounds_axis] != 2 {
        return Err(GridError::InvalidInput(format!(
            "time_bnds must have shape (time, 2), has dims {:?} and shape {:?}",
            bounds.dims(),
            bounds.shape()
        )));
    }

    // Rows are time steps, columns are the two bounds
    let rows = bounds
        .values()
        .view()
        .permuted_axes(IxDyn(&[time_axis, bounds_axis]))
        .into_dimensionality::<Ix2>()
        .map_err(|e| GridError::RuntimeInvariant(format!("time_bnds is not 2-D: {}", e)))?;
    let midpoints: Vec<FloatValue> = rows
        .axis_iter(Axis(0))
        .map(|row| (row[0] + row[1]) / 2.0)
        .collect();
    let flat: Vec<FloatValue> = rows.iter().copied().collect();

    let time = convert_to_datetime(&midpoints, units, calendar, Some(min_year))?;
    let decoded_bounds = convert_to_datetime(&flat, units, calendar, Some(min_year))?;
    let time_bounds = decoded_bounds
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .collect();

    Ok(CesmTime { time, time_bounds })
}
