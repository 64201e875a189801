//! Longitude normalisation
//!
//! Rewraps a longitude coordinate into a 360 degree window and rolls the data
//! so the coordinate stays monotonic.

use crate::coords::{monotonic_direction, Direction};
use crate::errors::GridResult;
use crate::grid::{FloatValue, Grid};
use tracing::debug;

/// Shift longitudes into the range `[lon_min, lon_min + 360)`
///
/// Each longitude is moved by at most one multiple of 360 degrees, so values
/// more than one revolution outside the window stay outside it. When any
/// value moves, the coordinate and every variable carrying the longitude
/// dimension are rolled so that the new minimum (increasing axis) or new
/// maximum (decreasing axis) comes first.
///
/// Returns a copy of `grid`; the input is never modified.
///
/// # Errors
///
/// * [`GridError::KeyNotFound`](crate::errors::GridError::KeyNotFound) if the
///   longitude coordinate is missing
/// * [`GridError::InvalidInput`](crate::errors::GridError::InvalidInput) if the
///   longitudes are not monotonic
///
/// # Examples
///
/// ```rust
/// use climgrid_core::grid::Grid;
/// use climgrid_core::shift::shift_lon;
/// use ndarray::array;
///
/// let mut grid = Grid::new();
/// grid.insert_coord("lon", array![0.0, 90.0, 180.0, 270.0]).unwrap();
///
/// let shifted = shift_lon(&grid, -180.0, "lon").unwrap();
/// assert_eq!(shifted.coord_values("lon").unwrap(), array![-180.0, -90.0, 0.0, 90.0]);
/// ```
pub fn shift_lon(grid: &Grid, lon_min: FloatValue, lon_name: &str) -> GridResult<Grid> {
    let lon = grid.coord_values(lon_name)?;
    let direction = monotonic_direction(lon, lon_name)?;

    let lon_max = lon_min + 360.0;
    let offsets = lon.mapv(|x| {
        if x < lon_min {
            360.0
        } else if x >= lon_max {
            -360.0
        } else {
            0.0
        }
    });
    if offsets.iter().all(|&offset| offset == 0.0) {
        return Ok(grid.clone());
    }

    let shifted = &lon + &offsets;
    let first = match direction {
        Direction::Increasing => position_of_extreme(shifted.iter(), |a, b| a < b),
        Direction::Decreasing => position_of_extreme(shifted.iter(), |a, b| a > b),
    };
    debug!(
        lon_name,
        lon_min,
        roll = first,
        "Rewrapping longitudes"
    );

    let mut result = grid.clone();
    result.replace_coord_values(lon_name, shifted)?;
    Ok(result.roll(lon_name, -(first as isize)))
}

/// Index of the first element that no other element beats
fn position_of_extreme<'a>(
    values: impl Iterator<Item = &'a FloatValue>,
    beats: impl Fn(FloatValue, FloatValue) -> bool,
) -> usize {
    values
        .enumerate()
        .fold((0, FloatValue::NAN), |(best_i, best), (i, &v)| {
            if best.is_nan() || beats(v, best) {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}
