//! Area-weighted statistics
//!
//! Reduces the longitude and latitude axes of a variable to a single value,
//! weighting each cell by its surface area. Any other dimensions of the
//! variable (e.g. time) are kept in their original order.

use crate::area::area_with_options;
use crate::coords::check_lon_lat_match;
use crate::errors::{GridError, GridResult};
use crate::grid::{FloatValue, Grid};
use crate::mask::{mask_bounds_with_options, RegionBounds, SelectHow};
use crate::options::GridOptions;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Statistic calculated by [`area_weighted_stat`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    /// `Σ data·area / Σ area` over the cells holding data
    #[default]
    Mean,
    /// `Σ data·area`
    Sum,
}

impl FromStr for Stat {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Stat::Mean),
            "sum" => Ok(Stat::Sum),
            other => Err(GridError::InvalidInput(format!(
                "stat must be \"mean\" or \"sum\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Mean => write!(f, "mean"),
            Stat::Sum => write!(f, "sum"),
        }
    }
}

/// Area-weighted mean or sum of a variable over the globe or a region
///
/// If either bound is set the variable is first masked to the inside of the
/// region. Cell areas always come from the unmasked grid. Missing values
/// (NaN) do not contribute to the sum, and are excluded from the area used
/// to normalise the mean. A slice with no data gives NaN for the mean and
/// zero for the sum.
///
/// The result has the variable's dimensions other than longitude and
/// latitude, so a `(time, lat, lon)` variable gives one value per time step.
///
/// # Errors
///
/// * [`GridError::KeyNotFound`] if the variable or a coordinate is missing
/// * [`GridError::InvalidInput`] if the variable lacks the longitude or
///   latitude dimension, an axis is not monotonic, or both names are the same
pub fn area_weighted_stat(
    grid: &Grid,
    variable: &str,
    stat: Stat,
    bounds: &RegionBounds,
    lon_name: &str,
    lat_name: &str,
) -> GridResult<ArrayD<FloatValue>> {
    area_weighted_stat_with_options(
        grid,
        variable,
        stat,
        bounds,
        &GridOptions::new(lon_name, lat_name),
    )
}

/// Area-weighted mean or sum of a variable using explicit options
pub fn area_weighted_stat_with_options(
    grid: &Grid,
    variable: &str,
    stat: Stat,
    bounds: &RegionBounds,
    options: &GridOptions,
) -> GridResult<ArrayD<FloatValue>> {
    options.validate()?;
    let lon_name = options.lon_name.as_str();
    let lat_name = options.lat_name.as_str();

    let source = grid.variable(variable)?;
    let lon_axis = require_axis(source.axis_of(lon_name), variable, lon_name)?;
    let lat_axis = require_axis(source.axis_of(lat_name), variable, lat_name)?;

    let masked;
    let data = if bounds.is_global() {
        grid
    } else {
        masked = mask_bounds_with_options(grid, bounds, SelectHow::Inside, options)?;
        &masked
    };

    let cell_area = area_with_options(grid, options)?;
    if !check_lon_lat_match(grid, &cell_area, lon_name, lat_name)? {
        warn!(variable, "Longitudes and/or latitudes not equal.");
    }

    // Move longitude then latitude to the end so each cell block is contiguous
    // and matches the [lon, lat] layout of the areas
    let values = data.variable(variable)?.values();
    let mut order: Vec<usize> = (0..values.ndim())
        .filter(|&axis| axis != lon_axis && axis != lat_axis)
        .collect();
    let rest_shape: Vec<usize> = order.iter().map(|&axis| values.shape()[axis]).collect();
    order.push(lon_axis);
    order.push(lat_axis);
    let permuted = values.view().permuted_axes(IxDyn(&order));

    let weights: Vec<FloatValue> = cell_area.values().iter().copied().collect();
    let block = weights.len();
    if block == 0 || permuted.len() % block != 0 {
        return Err(GridError::ShapeMismatch {
            name: variable.to_string(),
            expected: cell_area.values().shape().to_vec(),
            got: vec![values.shape()[lon_axis], values.shape()[lat_axis]],
        });
    }

    let flat: Vec<FloatValue> = permuted.iter().copied().collect();
    let reduced: Vec<FloatValue> = flat
        .chunks_exact(block)
        .map(|cells| reduce(cells, &weights, stat))
        .collect();

    ArrayD::from_shape_vec(IxDyn(&rest_shape), reduced)
        .map_err(|e| GridError::RuntimeInvariant(format!("could not shape result: {}", e)))
}

/// Area-weighted statistic of a variable holding only longitude and latitude
///
/// # Errors
///
/// As [`area_weighted_stat`], plus [`GridError::InvalidInput`] if the
/// variable has any other dimension.
pub fn area_weighted_stat_scalar(
    grid: &Grid,
    variable: &str,
    stat: Stat,
    bounds: &RegionBounds,
    lon_name: &str,
    lat_name: &str,
) -> GridResult<FloatValue> {
    let result = area_weighted_stat(grid, variable, stat, bounds, lon_name, lat_name)?;
    if result.ndim() != 0 {
        return Err(GridError::InvalidInput(format!(
            "{} has dimensions other than {} and {}; result shape is {:?}",
            variable,
            lon_name,
            lat_name,
            result.shape()
        )));
    }
    result
        .iter()
        .next()
        .copied()
        .ok_or_else(|| GridError::RuntimeInvariant("empty result".to_string()))
}

fn require_axis(axis: Option<usize>, variable: &str, dim: &str) -> GridResult<usize> {
    axis.ok_or_else(|| {
        GridError::InvalidInput(format!("{} does not have dimension {}", variable, dim))
    })
}

fn reduce(cells: &[FloatValue], weights: &[FloatValue], stat: Stat) -> FloatValue {
    let (weighted, total_area) = cells
        .iter()
        .zip(weights)
        .filter(|(value, _)| !value.is_nan())
        .fold((0.0, 0.0), |(sum, area), (value, weight)| {
            (sum + value * weight, area + weight)
        });
    match stat {
        Stat::Sum => weighted,
        Stat::Mean => weighted / total_area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::EARTH_RADIUS;
    use crate::grid::Variable;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1, Array2, Array3};

    /// 4 x 3 global grid whose latitude bands have weights 0.5, 1, 0.5
    fn coarse_grid() -> Grid {
        let mut grid = Grid::new();
        grid.insert_coord("lon", array![0.0, 90.0, 180.0, 270.0]).unwrap();
        grid.insert_coord("lat", array![-60.0, 0.0, 60.0]).unwrap();
        grid
    }

    fn with_lat_lon(grid: &mut Grid, name: &str, by_lat: [f64; 3]) {
        let values = Array2::from_shape_fn((3, 4), |(j, _)| by_lat[j]);
        grid.insert_variable(name, Variable::new(&["lat", "lon"], values.into_dyn()).unwrap())
            .unwrap();
    }

    fn sphere() -> f64 {
        4.0 * std::f64::consts::PI * EARTH_RADIUS * EARTH_RADIUS
    }

    #[test]
    fn stat_from_str() {
        assert_eq!("mean".parse::<Stat>().unwrap(), Stat::Mean);
        assert_eq!("sum".parse::<Stat>().unwrap(), Stat::Sum);
        assert!(matches!("median".parse::<Stat>(), Err(GridError::InvalidInput(_))));
    }

    #[test]
    fn uniform_field() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [288.0; 3]);
        let global = RegionBounds::global();

        let mean = area_weighted_stat_scalar(&grid, "TS", Stat::Mean, &global, "lon", "lat")
            .unwrap();
        assert_relative_eq!(mean, 288.0, max_relative = 1e-12);

        let sum = area_weighted_stat_scalar(&grid, "TS", Stat::Sum, &global, "lon", "lat")
            .unwrap();
        assert_relative_eq!(sum, 288.0 * sphere(), max_relative = 1e-12);
    }

    #[test]
    fn mean_weights_by_latitude_band() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [0.0, 0.0, 4.0]);

        // (0.5 * 4) / (0.5 + 1 + 0.5)
        let mean = area_weighted_stat_scalar(
            &grid,
            "TS",
            Stat::Mean,
            &RegionBounds::global(),
            "lon",
            "lat",
        )
        .unwrap();
        assert_relative_eq!(mean, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn regional_mean_uses_region_area() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [0.0, 0.0, 4.0]);
        let north = RegionBounds::new(None, Some((0.0, 90.0)));

        // (1 * 0 + 0.5 * 4) / (1 + 0.5)
        let mean = area_weighted_stat_scalar(&grid, "TS", Stat::Mean, &north, "lon", "lat")
            .unwrap();
        assert_relative_eq!(mean, 4.0 / 3.0, max_relative = 1e-12);

        let sum = area_weighted_stat_scalar(&grid, "TS", Stat::Sum, &north, "lon", "lat")
            .unwrap();
        assert_relative_eq!(sum, sphere(), max_relative = 1e-12);
    }

    #[test]
    fn extra_dimensions_are_kept() {
        let mut grid = coarse_grid();
        let values = Array3::from_shape_fn((2, 3, 4), |(t, _, _)| (t + 1) as f64);
        grid.insert_variable(
            "TS",
            Variable::new(&["time", "lat", "lon"], values.into_dyn()).unwrap(),
        )
        .unwrap();

        let means =
            area_weighted_stat(&grid, "TS", Stat::Mean, &RegionBounds::global(), "lon", "lat")
                .unwrap();
        assert_eq!(means.shape(), &[2]);
        assert_relative_eq!(means[[0]], 1.0, max_relative = 1e-12);
        assert_relative_eq!(means[[1]], 2.0, max_relative = 1e-12);

        let scalar = area_weighted_stat_scalar(
            &grid,
            "TS",
            Stat::Mean,
            &RegionBounds::global(),
            "lon",
            "lat",
        );
        assert!(matches!(scalar, Err(GridError::InvalidInput(_))));
    }

    #[test]
    fn transposed_layout_gives_same_result() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [1.0, 2.0, 5.0]);
        let transposed = grid.variable("TS").unwrap().values().t().to_owned();
        grid.insert_variable("TS_T", Variable::new(&["lon", "lat"], transposed).unwrap())
            .unwrap();

        let global = RegionBounds::global();
        let a = area_weighted_stat_scalar(&grid, "TS", Stat::Mean, &global, "lon", "lat").unwrap();
        let b = area_weighted_stat_scalar(&grid, "TS_T", Stat::Mean, &global, "lon", "lat")
            .unwrap();
        assert_relative_eq!(a, b, max_relative = 1e-12);
    }

    #[test]
    fn missing_values_are_skipped() {
        let mut grid = coarse_grid();
        let mut values = Array2::from_elem((3, 4), 1.0);
        values[[2, 0]] = f64::NAN;
        values[[1, 1]] = 3.0;
        grid.insert_variable("TS", Variable::new(&["lat", "lon"], values.into_dyn()).unwrap())
            .unwrap();
        let global = RegionBounds::global();

        // Cell areas in units of sphere / 16: polar cells 1, equatorial cells 2
        let sum = area_weighted_stat_scalar(&grid, "TS", Stat::Sum, &global, "lon", "lat").unwrap();
        assert_relative_eq!(sum, sphere() * 19.0 / 16.0, max_relative = 1e-12);

        let mean =
            area_weighted_stat_scalar(&grid, "TS", Stat::Mean, &global, "lon", "lat").unwrap();
        assert_relative_eq!(mean, 19.0 / 15.0, max_relative = 1e-12);
    }

    #[test]
    fn all_missing_slice() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [f64::NAN; 3]);
        let global = RegionBounds::global();

        let mean =
            area_weighted_stat_scalar(&grid, "TS", Stat::Mean, &global, "lon", "lat").unwrap();
        assert!(mean.is_nan());
        let sum = area_weighted_stat_scalar(&grid, "TS", Stat::Sum, &global, "lon", "lat").unwrap();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn variable_must_carry_lon_and_lat() {
        let mut grid = coarse_grid();
        grid.insert_variable(
            "zonal",
            Variable::new(&["lat"], Array1::from_elem(3, 1.0).into_dyn()).unwrap(),
        )
        .unwrap();
        let global = RegionBounds::global();

        assert!(matches!(
            area_weighted_stat(&grid, "zonal", Stat::Mean, &global, "lon", "lat"),
            Err(GridError::InvalidInput(_))
        ));
        assert!(matches!(
            area_weighted_stat(&grid, "PRECL", Stat::Mean, &global, "lon", "lat"),
            Err(GridError::KeyNotFound(_))
        ));
    }

    #[test]
    fn same_name_for_both_axes_rejected() {
        let mut grid = coarse_grid();
        with_lat_lon(&mut grid, "TS", [1.0, 2.0, 3.0]);
        let global = RegionBounds::global();

        for (lon_name, lat_name) in [("lon", "lon"), ("lat", "lat")] {
            let result = area_weighted_stat(&grid, "TS", Stat::Mean, &global, lon_name, lat_name);
            assert!(matches!(result, Err(GridError::InvalidInput(_))));
        }
    }
}
