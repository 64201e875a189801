//! Coordinate checks shared by the grid operations
//!
//! [`check_lon_lat_match`] is used after every transformation to confirm that
//! longitude and latitude values have not drifted, and [`monotonic_direction`]
//! guards the operations that need ordered axes.

use crate::errors::{GridError, GridResult};
use crate::grid::{FloatValue, Grid};
use ndarray::ArrayView1;

/// Anything that exposes named one-dimensional coordinates
pub trait CoordinateSource {
    /// Look up a coordinate by name
    ///
    /// Returns [`GridError::KeyNotFound`] if the coordinate does not exist.
    fn coordinate(&self, name: &str) -> GridResult<ArrayView1<'_, FloatValue>>;
}

impl CoordinateSource for Grid {
    fn coordinate(&self, name: &str) -> GridResult<ArrayView1<'_, FloatValue>> {
        self.coord_values(name)
    }
}

/// Ordering of a coordinate axis
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Determine whether `values` strictly increase or strictly decrease
///
/// An axis with fewer than two points is treated as increasing. Ties,
/// reversals and NaN values are rejected with [`GridError::InvalidInput`].
pub fn monotonic_direction(
    values: ArrayView1<'_, FloatValue>,
    name: &str,
) -> GridResult<Direction> {
    let steps: Vec<FloatValue> = values
        .windows(2)
        .into_iter()
        .map(|w| w[1] - w[0])
        .collect();

    if steps.iter().all(|&d| d > 0.0) {
        Ok(Direction::Increasing)
    } else if steps.iter().all(|&d| d < 0.0) {
        Ok(Direction::Decreasing)
    } else {
        Err(GridError::InvalidInput(format!(
            "{} values must increase or decrease monotonically",
            name
        )))
    }
}

/// Check whether longitude and latitude coordinates are equal
///
/// Both coordinates are compared element by element for exact equality.
/// Coordinates of different lengths do not match.
///
/// # Errors
///
/// [`GridError::KeyNotFound`] if either coordinate is missing from either source.
///
/// # Examples
///
/// ```rust
/// use climgrid_core::coords::check_lon_lat_match;
/// use climgrid_core::grid::Grid;
/// use ndarray::array;
///
/// let mut grid = Grid::new();
/// grid.insert_coord("lon", array![0.0, 180.0]).unwrap();
/// grid.insert_coord("lat", array![-45.0, 45.0]).unwrap();
///
/// assert!(check_lon_lat_match(&grid, &grid.clone(), "lon", "lat").unwrap());
/// ```
pub fn check_lon_lat_match<A, B>(
    first: &A,
    second: &B,
    lon_name: &str,
    lat_name: &str,
) -> GridResult<bool>
where
    A: CoordinateSource + ?Sized,
    B: CoordinateSource + ?Sized,
{
    let lon_match = first.coordinate(lon_name)? == second.coordinate(lon_name)?;
    let lat_match = first.coordinate(lat_name)? == second.coordinate(lat_name)?;
    Ok(lon_match && lat_match)
}
