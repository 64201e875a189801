//! Python bindings for the grid operations
//!
//! Grids are built from numpy arrays and every operation returns a new grid,
//! mirroring the Rust API.
//!
//! ```python
//! import numpy as np
//! from climgrid._lib.core import Grid, area_weighted_stat
//!
//! grid = Grid()
//! grid.add_coord("lon", np.arange(0.0, 360.0, 2.5))
//! grid.add_coord("lat", np.linspace(-90.0, 90.0, 96))
//! grid.add_variable("TS", ["lat", "lon"], np.full((96, 144), 288.0))
//!
//! area_weighted_stat(grid, "TS", lat_bounds=(-30.0, 30.0))
//! ```

use crate::area::{area as cell_areas, EARTH_RADIUS};
use crate::calendar::{self, Calendar};
use crate::cesm;
use crate::coords;
use crate::fdr;
use crate::grid::{Coordinate, FloatValue, Grid, Variable};
use crate::mask::{self, RegionBounds, SelectHow};
use crate::shift;
use crate::stat::{self, Stat};
use chrono::NaiveDateTime;
use numpy::{IntoPyArray, PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArrayDyn, ToPyArray};
use pyo3::prelude::*;
use pyo3::types::PyFloat;
use std::collections::BTreeMap;

type Bounds = Option<(FloatValue, FloatValue)>;

/// Labelled grid of coordinates and data variables.
///
/// Coordinates are one-dimensional float arrays. Variables are float arrays
/// of any dimension, with one name per axis.
#[pyclass(name = "Grid", module = "climgrid.core")]
#[derive(Debug, Clone, Default)]
pub struct PyGrid(pub Grid);

#[pymethods]
impl PyGrid {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Add or replace a coordinate.
    #[pyo3(signature = (name, values, attrs=None))]
    fn add_coord(
        &mut self,
        name: &str,
        values: PyReadonlyArray1<'_, FloatValue>,
        attrs: Option<BTreeMap<String, String>>,
    ) -> PyResult<()> {
        let coord = attrs
            .unwrap_or_default()
            .iter()
            .fold(Coordinate::new(values.as_array().to_owned()), |c, (k, v)| {
                c.with_attr(k, v)
            });
        Ok(self.0.insert_coord(name, coord)?)
    }

    /// Add or replace a variable.
    ///
    /// `dims` names each axis of `values` in order.
    #[pyo3(signature = (name, dims, values, attrs=None))]
    fn add_variable(
        &mut self,
        name: &str,
        dims: Vec<String>,
        values: PyReadonlyArrayDyn<'_, FloatValue>,
        attrs: Option<BTreeMap<String, String>>,
    ) -> PyResult<()> {
        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        let variable = attrs
            .unwrap_or_default()
            .iter()
            .fold(Variable::new(&dims, values.as_array().to_owned())?, |v, (k, a)| {
                v.with_attr(k, a)
            });
        Ok(self.0.insert_variable(name, variable)?)
    }

    /// Values of a coordinate.
    fn coord<'py>(&self, py: Python<'py>, name: &str) -> PyResult<Bound<'py, PyArray1<FloatValue>>> {
        Ok(self.0.coord_values(name)?.to_pyarray(py))
    }

    fn coord_attrs(&self, name: &str) -> PyResult<BTreeMap<String, String>> {
        Ok(self.0.coord(name)?.attrs().clone())
    }

    /// Values of a variable.
    fn variable<'py>(
        &self,
        py: Python<'py>,
        name: &str,
    ) -> PyResult<Bound<'py, PyArrayDyn<FloatValue>>> {
        Ok(self.0.variable(name)?.values().to_pyarray(py))
    }

    /// Dimension names of a variable, in axis order.
    fn variable_dims(&self, name: &str) -> PyResult<Vec<String>> {
        Ok(self.0.variable(name)?.dims().to_vec())
    }

    fn variable_attrs(&self, name: &str) -> PyResult<BTreeMap<String, String>> {
        Ok(self.0.variable(name)?.attrs().clone())
    }

    #[getter]
    fn coord_names(&self) -> Vec<String> {
        self.0.coords().map(|(name, _)| name.to_string()).collect()
    }

    #[getter]
    fn variable_names(&self) -> Vec<String> {
        self.0.variables().map(|(name, _)| name.to_string()).collect()
    }

    fn __eq__(&self, other: &PyGrid) -> bool {
        self.0 == other.0
    }

    fn __repr__(&self) -> String {
        let coords: Vec<String> = self
            .0
            .coords()
            .map(|(name, c)| format!("{}: {}", name, c.len()))
            .collect();
        format!(
            "Grid(coords={{{}}}, variables={:?})",
            coords.join(", "),
            self.0.variable_names()
        )
    }
}

/// Check whether longitude and latitude coordinates of two grids are equal.
#[pyfunction]
#[pyo3(signature = (first, second, lon_name="lon", lat_name="lat"))]
pub fn check_lon_lat_match(
    first: &PyGrid,
    second: &PyGrid,
    lon_name: &str,
    lat_name: &str,
) -> PyResult<bool> {
    Ok(coords::check_lon_lat_match(&first.0, &second.0, lon_name, lat_name)?)
}

/// Shift longitudes into the range [lon_min, lon_min + 360).
#[pyfunction]
#[pyo3(signature = (grid, lon_min=-180.0, lon_name="lon"))]
pub fn shift_lon(grid: &PyGrid, lon_min: FloatValue, lon_name: &str) -> PyResult<PyGrid> {
    Ok(PyGrid(shift::shift_lon(&grid.0, lon_min, lon_name)?))
}

/// Grid-cell areas (m2), returned as a grid holding an "area" variable.
#[pyfunction]
#[pyo3(signature = (grid, lon_name="lon", lat_name="lat"))]
pub fn area(grid: &PyGrid, lon_name: &str, lat_name: &str) -> PyResult<PyGrid> {
    let cell_area = cell_areas(&grid.0, lon_name, lat_name)?;
    Ok(PyGrid(cell_area.to_grid()?))
}

/// Mask the inside or outside of a longitude/latitude box with NaN.
///
/// ```python
/// from climgrid._lib.core import mask_bounds
///
/// # Everything except the tropics
/// extratropics = mask_bounds(grid, lat_bounds=(-30.0, 30.0), select_how="outside")
/// ```
#[pyfunction]
#[pyo3(signature = (grid, lon_bounds=None, lat_bounds=None, select_how="inside", lon_name="lon", lat_name="lat"))]
pub fn mask_bounds(
    grid: &PyGrid,
    lon_bounds: Bounds,
    lat_bounds: Bounds,
    select_how: &str,
    lon_name: &str,
    lat_name: &str,
) -> PyResult<PyGrid> {
    let select_how: SelectHow = select_how.parse()?;
    let bounds = RegionBounds::new(lon_bounds, lat_bounds);
    Ok(PyGrid(mask::mask_bounds(
        &grid.0, &bounds, select_how, lon_name, lat_name,
    )?))
}

/// Area-weighted mean or sum over the globe or a region.
///
/// Returns a float for a variable with only longitude and latitude
/// dimensions, otherwise an array over the remaining dimensions.
#[pyfunction]
#[pyo3(signature = (grid, variable, stat="mean", lon_bounds=None, lat_bounds=None, lon_name="lon", lat_name="lat"))]
#[allow(clippy::too_many_arguments)]
pub fn area_weighted_stat(
    py: Python<'_>,
    grid: &PyGrid,
    variable: &str,
    stat: &str,
    lon_bounds: Bounds,
    lat_bounds: Bounds,
    lon_name: &str,
    lat_name: &str,
) -> PyResult<PyObject> {
    let stat: Stat = stat.parse()?;
    let bounds = RegionBounds::new(lon_bounds, lat_bounds);
    let result = stat::area_weighted_stat(&grid.0, variable, stat, &bounds, lon_name, lat_name)?;
    if result.ndim() == 0 {
        let value = result.iter().next().copied().unwrap_or(FloatValue::NAN);
        Ok(PyFloat::new(py, value).into_any().unbind())
    } else {
        Ok(result.into_pyarray(py).into_any().unbind())
    }
}

/// p-value threshold controlling the false discovery rate.
#[pyfunction]
#[pyo3(signature = (p_values, alpha=fdr::DEFAULT_ALPHA))]
pub fn fdr_threshold(p_values: PyReadonlyArrayDyn<'_, FloatValue>, alpha: FloatValue) -> PyResult<FloatValue> {
    Ok(fdr::fdr_threshold(p_values.as_array(), alpha)?)
}

/// Convert "days since" values to datetimes.
#[pyfunction]
#[pyo3(signature = (values, units="days since 1-1-1 00:00:00", calendar="365_day", min_year=None))]
pub fn convert_to_datetime(
    values: Vec<FloatValue>,
    units: &str,
    calendar: &str,
    min_year: Option<i32>,
) -> PyResult<Vec<NaiveDateTime>> {
    let calendar: Calendar = calendar.parse()?;
    Ok(calendar::convert_to_datetime(&values, units, calendar, min_year)?)
}

/// Decode the midpoints and bounds of a CESM `time_bnds` variable.
#[pyfunction]
#[pyo3(signature = (grid, min_year=cesm::DEFAULT_MIN_YEAR))]
pub fn cesm_time_from_bounds(
    grid: &PyGrid,
    min_year: i32,
) -> PyResult<(Vec<NaiveDateTime>, Vec<(NaiveDateTime, NaiveDateTime)>)> {
    let decoded = cesm::time_from_bounds(&grid.0, min_year)?;
    let bounds = decoded
        .time_bounds
        .iter()
        .map(|[start, end]| (*start, *end))
        .collect();
    Ok((decoded.time, bounds))
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGrid>()?;
    m.add_function(wrap_pyfunction!(check_lon_lat_match, m)?)?;
    m.add_function(wrap_pyfunction!(shift_lon, m)?)?;
    m.add_function(wrap_pyfunction!(area, m)?)?;
    m.add_function(wrap_pyfunction!(mask_bounds, m)?)?;
    m.add_function(wrap_pyfunction!(area_weighted_stat, m)?)?;
    m.add_function(wrap_pyfunction!(fdr_threshold, m)?)?;
    m.add_function(wrap_pyfunction!(convert_to_datetime, m)?)?;
    m.add_function(wrap_pyfunction!(cesm_time_from_bounds, m)?)?;
    m.add("EARTH_RADIUS", EARTH_RADIUS)?;
    Ok(())
}
