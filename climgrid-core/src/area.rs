//! Grid-cell surface areas
//!
//! Cell boundaries are inferred from the cell centres: each axis is extended
//! by one extrapolated point at either end and the boundaries are the linear
//! interpolation half-way between neighbouring points. The area of a cell
//! bounded by longitudes `λ₁, λ₂` and latitudes `φ₁, φ₂` is then
//!
//! $$A = R^2 \left(\sin\varphi_2 - \sin\varphi_1\right) \left(\lambda_2 - \lambda_1\right)$$
//!
//! with `R` the mean radius of the Earth and longitudes in radians.
//!
//! # Examples
//!
//! ```rust
//! use climgrid_core::area::{area, EARTH_RADIUS};
//! use climgrid_core::grid::Grid;
//! use ndarray::array;
//!
//! let mut grid = Grid::new();
//! grid.insert_coord("lon", array![0.0, 90.0, 180.0, 270.0]).unwrap();
//! grid.insert_coord("lat", array![-60.0, 0.0, 60.0]).unwrap();
//!
//! let cell_area = area(&grid, "lon", "lat").unwrap();
//! let sphere = 4.0 * std::f64::consts::PI * EARTH_RADIUS.powi(2);
//! assert!((cell_area.total() - sphere).abs() / sphere < 1e-12);
//! ```

use crate::coords::{check_lon_lat_match, monotonic_direction, CoordinateSource, Direction};
use crate::errors::{GridError, GridResult};
use crate::grid::{FloatValue, Grid, Variable};
use crate::interpolate::interp;
use crate::options::{GridOptions, MonotonicPolicy};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::warn;

/// Mean radius of the Earth (m)
pub const EARTH_RADIUS: FloatValue = 6_371_000.0;

/// Surface area of each grid cell, indexed `[lon, lat]`
#[derive(Debug, Clone, PartialEq)]
pub struct CellArea {
    lon_name: String,
    lat_name: String,
    lon: Array1<FloatValue>,
    lat: Array1<FloatValue>,
    values: Array2<FloatValue>,
}

impl CellArea {
    pub const NAME: &'static str = "area";
    pub const UNITS: &'static str = "m2";

    /// Area of each cell (m²)
    pub fn values(&self) -> ArrayView2<'_, FloatValue> {
        self.values.view()
    }

    pub fn lon(&self) -> ArrayView1<'_, FloatValue> {
        self.lon.view()
    }

    pub fn lat(&self) -> ArrayView1<'_, FloatValue> {
        self.lat.view()
    }

    /// Summed area of all cells (m²)
    pub fn total(&self) -> FloatValue {
        self.values.sum()
    }

    /// The areas as a variable with dimensions `(lon, lat)`
    pub fn to_variable(&self) -> GridResult<Variable> {
        let variable = Variable::new(
            &[self.lon_name.as_str(), self.lat_name.as_str()],
            self.values.clone().into_dyn(),
        )?;
        Ok(variable.with_attr("units", Self::UNITS))
    }

    /// A grid holding the longitude and latitude coordinates and the `area` variable
    pub fn to_grid(&self) -> GridResult<Grid> {
        let mut grid = Grid::new();
        grid.insert_coord(&self.lon_name, self.lon.clone())?;
        grid.insert_coord(&self.lat_name, self.lat.clone())?;
        grid.insert_variable(Self::NAME, self.to_variable()?)?;
        Ok(grid)
    }
}

impl CoordinateSource for CellArea {
    fn coordinate(&self, name: &str) -> GridResult<ArrayView1<'_, FloatValue>> {
        if name == self.lon_name {
            Ok(self.lon.view())
        } else if name == self.lat_name {
            Ok(self.lat.view())
        } else {
            Err(GridError::KeyNotFound(format!("coordinate {}", name)))
        }
    }
}

/// Calculate the surface area of every grid cell
///
/// Both coordinates must be strictly monotonic (increasing or decreasing) and
/// have at least two points. Use [`area_with_options`] to opt in to unwrapping
/// longitudes that cross a 360 degree seam.
///
/// # Errors
///
/// * [`GridError::KeyNotFound`] if either coordinate is missing
/// * [`GridError::InvalidInput`] for non-monotonic or single-point axes, or
///   if both coordinate names are the same
/// * [`GridError::RuntimeInvariant`] if a negative cell width is produced
pub fn area(grid: &Grid, lon_name: &str, lat_name: &str) -> GridResult<CellArea> {
    area_with_options(grid, &GridOptions::new(lon_name, lat_name))
}

/// Calculate the surface area of every grid cell using explicit options
pub fn area_with_options(grid: &Grid, options: &GridOptions) -> GridResult<CellArea> {
    options.validate()?;
    let lon_name = options.lon_name.as_str();
    let lat_name = options.lat_name.as_str();
    let lon = grid.coord_values(lon_name)?;
    let lat = grid.coord_values(lat_name)?;
    require_two_points(lon, lon_name)?;
    require_two_points(lat, lat_name)?;

    let (lon_for_bounds, lon_direction) = match options.monotonic_policy {
        MonotonicPolicy::Strict => (lon.to_owned(), monotonic_direction(lon, lon_name)?),
        MonotonicPolicy::WrapCorrect => {
            let unwrapped = unwrap_longitudes(lon);
            let direction = monotonic_direction(unwrapped.view(), lon_name)?;
            (unwrapped, direction)
        }
    };
    let lat_direction = monotonic_direction(lat, lat_name)?;

    // Zonal width of grid cells in terms of longitude
    let lon_bounds = cell_boundaries(lon_for_bounds.view());
    let x_width = widths(&lon_bounds, lon_direction);
    check_non_negative(&x_width, lon_name)?;
    let (x_min, x_max) = min_max(&x_width);
    if x_max > 2.0 * x_min {
        warn!(
            max_width = x_max,
            min_width = x_min,
            "Max longitude width > 2x min longitude width"
        );
    }

    // Meridional width of grid cells in terms of sin(latitude)
    let lat_bounds: Vec<FloatValue> = cell_boundaries(lat)
        .into_iter()
        .map(|b| b.clamp(-90.0, 90.0).to_radians().sin())
        .collect();
    let y_width = widths(&lat_bounds, lat_direction);
    check_non_negative(&y_width, lat_name)?;

    let radius_squared = EARTH_RADIUS * EARTH_RADIUS;
    let values = Array2::from_shape_fn((x_width.len(), y_width.len()), |(i, j)| {
        radius_squared * y_width[j] * x_width[i].to_radians()
    });

    let cell_area = CellArea {
        lon_name: lon_name.to_string(),
        lat_name: lat_name.to_string(),
        lon: lon.to_owned(),
        lat: lat.to_owned(),
        values,
    };

    if !check_lon_lat_match(grid, &cell_area, lon_name, lat_name)? {
        return Err(GridError::RuntimeInvariant(
            "Input and output lon/lat coordinates not equal.".to_string(),
        ));
    }

    // Compare against the surface area of a sphere
    let sphere = 4.0 * std::f64::consts::PI * radius_squared;
    let percent_difference = 100.0 * (cell_area.total() - sphere) / sphere;
    if percent_difference.abs() > options.area_tolerance_percent {
        warn!(
            percent_difference,
            "Total area calculated differs from spherical Earth"
        );
    }

    Ok(cell_area)
}

fn require_two_points(values: ArrayView1<'_, FloatValue>, name: &str) -> GridResult<()> {
    if values.len() < 2 {
        return Err(GridError::InvalidInput(format!(
            "{} needs at least two points to infer cell boundaries, got {}",
            name,
            values.len()
        )));
    }
    Ok(())
}

/// Boundaries of the `n` cells centred on `centres` (`n + 1` values)
fn cell_boundaries(centres: ArrayView1<'_, FloatValue>) -> Vec<FloatValue> {
    let n = centres.len();
    let mut extended = Vec::with_capacity(n + 2);
    extended.push(centres[0] - (centres[1] - centres[0]));
    extended.extend(centres.iter().copied());
    extended.push(centres[n - 1] + (centres[n - 1] - centres[n - 2]));

    let index: Vec<FloatValue> = (0..n + 2).map(|i| i as FloatValue).collect();
    let half_steps: Vec<FloatValue> = (0..=n).map(|i| i as FloatValue + 0.5).collect();
    interp(&half_steps, &index, &extended)
}

/// Width of each cell, positive for either axis direction
fn widths(bounds: &[FloatValue], direction: Direction) -> Vec<FloatValue> {
    bounds
        .windows(2)
        .map(|w| match direction {
            Direction::Increasing => w[1] - w[0],
            Direction::Decreasing => w[0] - w[1],
        })
        .collect()
}

fn check_non_negative(widths: &[FloatValue], name: &str) -> GridResult<()> {
    if widths.iter().any(|&w| w < 0.0) {
        return Err(GridError::RuntimeInvariant(format!(
            "Negative value(s) encountered in {} widths",
            name
        )));
    }
    Ok(())
}

fn min_max(values: &[FloatValue]) -> (FloatValue, FloatValue) {
    values.iter().fold(
        (FloatValue::INFINITY, FloatValue::NEG_INFINITY),
        |(lo, hi), &v| (lo.min(v), hi.max(v)),
    )
}

/// Remove 360 degree jumps so that longitudes crossing a seam become monotonic
fn unwrap_longitudes(lon: ArrayView1<'_, FloatValue>) -> Array1<FloatValue> {
    let mut offset = 0.0;
    let mut previous = lon[0];
    let mut unwrapped = Vec::with_capacity(lon.len());
    for &x in lon.iter() {
        let step = x - previous;
        if step < -180.0 {
            offset += 360.0;
        } else if step > 180.0 {
            offset -= 360.0;
        }
        previous = x;
        unwrapped.push(x + offset);
    }
    Array1::from(unwrapped)
}
