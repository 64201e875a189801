//! Labelled container for gridded model output
//!
//! A [`Grid`] holds named one-dimensional coordinates and named N-dimensional
//! variables. Each variable lists its dimension names in axis order, so the
//! same variable may be stored as `(time, lat, lon)` or `(lon, lat)` and the
//! grid operations look axes up by name rather than by position.
//!
//! # Examples
//!
//! ```rust
//! use climgrid_core::grid::{Grid, Variable};
//! use ndarray::{array, Array2};
//!
//! let mut grid = Grid::new();
//! grid.insert_coord("lon", array![0.0, 90.0, 180.0, 270.0]).unwrap();
//! grid.insert_coord("lat", array![-45.0, 45.0]).unwrap();
//! grid.insert_variable(
//!     "TS",
//!     Variable::new(&["lon", "lat"], Array2::from_elem((4, 2), 288.0).into_dyn()).unwrap(),
//! )
//! .unwrap();
//!
//! assert_eq!(grid.dim_len("lon"), Some(4));
//! assert_eq!(grid.variable("TS").unwrap().axis_of("lat"), Some(1));
//! ```

use crate::errors::{GridError, GridResult};
use ndarray::{Array1, ArrayD, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FloatValue = f64;

/// Free-form string metadata (e.g. `units`, `calendar`)
pub type Attributes = BTreeMap<String, String>;

/// A one-dimensional coordinate vector with its attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    values: Array1<FloatValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
}

impl Coordinate {
    pub fn new(values: Array1<FloatValue>) -> Self {
        Self {
            values,
            attrs: Attributes::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn values(&self) -> ArrayView1<'_, FloatValue> {
        self.values.view()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Array1<FloatValue>> for Coordinate {
    fn from(values: Array1<FloatValue>) -> Self {
        Self::new(values)
    }
}

/// An N-dimensional data variable labelled by dimension names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVariable")]
pub struct Variable {
    dims: Vec<String>,
    values: ArrayD<FloatValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
}

impl Variable {
    /// Create a new variable
    ///
    /// The number of dimension names must match the number of axes in `values`
    /// and every name must be unique.
    pub fn new(dims: &[&str], values: ArrayD<FloatValue>) -> GridResult<Self> {
        if dims.len() != values.ndim() {
            return Err(GridError::InvalidInput(format!(
                "{} dimension names given for an array with {} axes",
                dims.len(),
                values.ndim()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(GridError::InvalidInput(format!(
                    "dimension {} is repeated",
                    dim
                )));
            }
        }
        Ok(Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            values,
            attrs: Attributes::new(),
        })
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    pub fn into_values(self) -> ArrayD<FloatValue> {
        self.values
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Position of the named dimension within this variable's axes
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis_of(dim).is_some()
    }

    /// Set every element whose index along `dim` is not kept to NaN
    fn mask_along(&mut self, dim: &str, keep: &[bool]) {
        if let Some(axis) = self.axis_of(dim) {
            for (i, mut lane) in self.values.axis_iter_mut(Axis(axis)).enumerate() {
                if !keep[i] {
                    lane.fill(FloatValue::NAN);
                }
            }
        }
    }
}

/// Variable as written on disk, checked by [`Variable::new`] when loaded
#[derive(Deserialize)]
struct RawVariable {
    dims: Vec<String>,
    values: ArrayD<FloatValue>,
    #[serde(default)]
    attrs: Attributes,
}

impl TryFrom<RawVariable> for Variable {
    type Error = GridError;

    fn try_from(raw: RawVariable) -> Result<Self, Self::Error> {
        let dims: Vec<&str> = raw.dims.iter().map(String::as_str).collect();
        let mut variable = Variable::new(&dims, raw.values)?;
        variable.attrs = raw.attrs;
        Ok(variable)
    }
}

/// Collection of named coordinates and the variables defined on them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct Grid {
    coords: BTreeMap<String, Coordinate>,
    variables: BTreeMap<String, Variable>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a coordinate
    ///
    /// Fails with [`GridError::ShapeMismatch`] if a variable already uses the
    /// dimension with a different length.
    pub fn insert_coord(
        &mut self,
        name: &str,
        coord: impl Into<Coordinate>,
    ) -> GridResult<()> {
        let coord = coord.into();
        if let Some(existing) = self.variable_dim_len(name) {
            if existing != coord.len() {
                return Err(GridError::ShapeMismatch {
                    name: name.to_string(),
                    expected: vec![existing],
                    got: vec![coord.len()],
                });
            }
        }
        self.coords.insert(name.to_string(), coord);
        Ok(())
    }

    /// Add or replace a variable
    ///
    /// Each dimension of the variable must agree in length with the coordinate
    /// of the same name (if any) and with every other variable using it.
    pub fn insert_variable(&mut self, name: &str, variable: Variable) -> GridResult<()> {
        let expected: Vec<usize> = variable
            .dims()
            .iter()
            .zip(variable.shape())
            .map(|(dim, &len)| self.dim_len_excluding(dim, name).unwrap_or(len))
            .collect();
        if expected != variable.shape() {
            return Err(GridError::ShapeMismatch {
                name: name.to_string(),
                expected,
                got: variable.shape().to_vec(),
            });
        }
        self.variables.insert(name.to_string(), variable);
        Ok(())
    }

    pub fn coord(&self, name: &str) -> GridResult<&Coordinate> {
        self.coords
            .get(name)
            .ok_or_else(|| GridError::KeyNotFound(format!("coordinate {}", name)))
    }

    pub fn coord_values(&self, name: &str) -> GridResult<ArrayView1<'_, FloatValue>> {
        self.coord(name).map(Coordinate::values)
    }

    pub fn variable(&self, name: &str) -> GridResult<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| GridError::KeyNotFound(format!("variable {}", name)))
    }

    pub fn coords(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
        self.coords.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    /// Length of a dimension, from its coordinate or from any variable using it
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.coords
            .get(dim)
            .map(Coordinate::len)
            .or_else(|| self.variable_dim_len(dim))
    }

    fn variable_dim_len(&self, dim: &str) -> Option<usize> {
        self.variables
            .values()
            .find_map(|v| v.axis_of(dim).map(|axis| v.shape()[axis]))
    }

    fn dim_len_excluding(&self, dim: &str, variable: &str) -> Option<usize> {
        self.coords.get(dim).map(Coordinate::len).or_else(|| {
            self.variables
                .iter()
                .filter(|(name, _)| name.as_str() != variable)
                .find_map(|(_, v)| v.axis_of(dim).map(|axis| v.shape()[axis]))
        })
    }

    /// Replace the values of an existing coordinate, keeping its attributes
    pub(crate) fn replace_coord_values(
        &mut self,
        name: &str,
        values: Array1<FloatValue>,
    ) -> GridResult<()> {
        let coord = self
            .coords
            .get_mut(name)
            .ok_or_else(|| GridError::KeyNotFound(format!("coordinate {}", name)))?;
        if coord.len() != values.len() {
            return Err(GridError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![coord.len()],
                got: vec![values.len()],
            });
        }
        coord.values = values;
        Ok(())
    }

    /// Circularly shift a dimension, `numpy.roll` style
    ///
    /// Element `i` of the result is element `(i - shift) mod n` of the input.
    /// The coordinate (if present) and every variable using `dim` are rolled.
    pub(crate) fn roll(&self, dim: &str, shift: isize) -> Grid {
        let n = match self.dim_len(dim) {
            Some(n) if n > 0 => n as isize,
            _ => return self.clone(),
        };
        let indices: Vec<usize> = (0..n)
            .map(|i| (i - shift).rem_euclid(n) as usize)
            .collect();
        self.select(dim, &indices)
    }

    /// Take the given positions along a dimension from the coordinate and variables
    fn select(&self, dim: &str, indices: &[usize]) -> Grid {
        let mut result = self.clone();
        if let Some(coord) = result.coords.get_mut(dim) {
            coord.values = coord.values.select(Axis(0), indices);
        }
        for variable in result.variables.values_mut() {
            if let Some(axis) = variable.axis_of(dim) {
                variable.values = variable.values.select(Axis(axis), indices);
            }
        }
        result
    }

    /// Replace data with NaN at positions along `dim` that are not kept
    ///
    /// Variables without `dim` are left untouched.
    pub(crate) fn mask_along(&self, dim: &str, keep: &[bool]) -> GridResult<Grid> {
        self.check_len(dim, keep.len())?;
        let mut result = self.clone();
        for variable in result.variables.values_mut() {
            variable.mask_along(dim, keep);
        }
        Ok(result)
    }

    /// Replace data with NaN wherever `keep(x_index, y_index)` is false
    ///
    /// Only variables carrying both dimensions are masked.
    pub(crate) fn mask_pairs(
        &self,
        x_dim: &str,
        y_dim: &str,
        keep: impl Fn(usize, usize) -> bool,
    ) -> Grid {
        let mut result = self.clone();
        for variable in result.variables.values_mut() {
            let (x_axis, y_axis) = match (variable.axis_of(x_dim), variable.axis_of(y_dim)) {
                (Some(x), Some(y)) => (x, y),
                _ => continue,
            };
            variable
                .values
                .indexed_iter_mut()
                .filter(|(index, _)| !keep(index[x_axis], index[y_axis]))
                .for_each(|(_, value)| *value = FloatValue::NAN);
        }
        result
    }

    /// Conform this grid to the coordinates of `other` along `dims`
    ///
    /// Each target coordinate value takes the data of the nearest source value
    /// lying within `tolerance`; targets without such a neighbour become NaN.
    /// The coordinate values are copied from `other`.
    pub(crate) fn reindex_nearest(
        &self,
        other: &Grid,
        dims: &[&str],
        tolerance: FloatValue,
    ) -> GridResult<Grid> {
        let mut result = self.clone();
        for &dim in dims {
            let source = result.coord_values(dim)?.to_owned();
            let target = other.coord_values(dim)?.to_owned();
            let matches: Vec<Option<usize>> = target
                .iter()
                .map(|&t| nearest_within(source.view(), t, tolerance))
                .collect();
            if source.is_empty() && !target.is_empty() {
                return Err(GridError::ShapeMismatch {
                    name: dim.to_string(),
                    expected: vec![target.len()],
                    got: vec![0],
                });
            }
            let indices: Vec<usize> = matches.iter().map(|m| m.unwrap_or(0)).collect();
            let found: Vec<bool> = matches.iter().map(Option::is_some).collect();

            // Selecting may change the dimension length, so rebuild the coordinate too
            let mut reindexed = result.select(dim, &indices);
            if let Some(coord) = reindexed.coords.get_mut(dim) {
                coord.values = target;
            }
            result = reindexed.mask_along(dim, &found)?;
        }
        Ok(result)
    }

    fn check_len(&self, dim: &str, len: usize) -> GridResult<()> {
        match self.dim_len(dim) {
            Some(n) if n != len => Err(GridError::ShapeMismatch {
                name: dim.to_string(),
                expected: vec![n],
                got: vec![len],
            }),
            _ => Ok(()),
        }
    }
}

/// Grid as written on disk; variables are inserted one by one when loaded so
/// every dimension length is checked
#[derive(Deserialize)]
struct RawGrid {
    #[serde(default)]
    coords: BTreeMap<String, Coordinate>,
    #[serde(default)]
    variables: BTreeMap<String, Variable>,
}

impl TryFrom<RawGrid> for Grid {
    type Error = GridError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        let mut grid = Grid::new();
        for (name, coord) in raw.coords {
            grid.insert_coord(&name, coord)?;
        }
        for (name, variable) in raw.variables {
            grid.insert_variable(&name, variable)?;
        }
        Ok(grid)
    }
}

fn nearest_within(
    values: ArrayView1<'_, FloatValue>,
    target: FloatValue,
    tolerance: FloatValue,
) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (i, (v - target).abs()))
        .filter(|(_, distance)| *distance <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn small_grid() -> Grid {
        let mut grid = Grid::new();
        grid.insert_coord("lon", array![0.0, 120.0, 240.0]).unwrap();
        grid.insert_coord("lat", array![-30.0, 30.0]).unwrap();
        let values = Array2::from_shape_fn((2, 3), |(j, i)| (10 * j + i) as f64);
        grid.insert_variable(
            "TS",
            Variable::new(&["lat", "lon"], values.into_dyn()).unwrap(),
        )
        .unwrap();
        grid
    }

    #[test]
    fn variable_rejects_wrong_number_of_dims() {
        let result = Variable::new(&["lon"], Array2::<f64>::zeros((2, 2)).into_dyn());
        assert!(matches!(result, Err(GridError::InvalidInput(_))));
    }

    #[test]
    fn variable_rejects_repeated_dims() {
        let result = Variable::new(&["lon", "lon"], Array2::<f64>::zeros((2, 2)).into_dyn());
        assert!(matches!(result, Err(GridError::InvalidInput(_))));
    }

    #[test]
    fn insert_variable_checks_coordinate_lengths() {
        let mut grid = small_grid();
        let wrong = Variable::new(&["lon", "lat"], Array2::zeros((4, 2)).into_dyn()).unwrap();
        let result = grid.insert_variable("bad", wrong);
        assert!(matches!(result, Err(GridError::ShapeMismatch { .. })));
    }

    #[test]
    fn insert_variable_replaces_same_name() {
        let mut grid = small_grid();
        let replacement = Variable::new(&["lon", "lat"], Array2::zeros((3, 2)).into_dyn()).unwrap();
        grid.insert_variable("TS", replacement).unwrap();
        assert_eq!(grid.variable("TS").unwrap().dims(), ["lon", "lat"]);
    }

    #[test]
    fn missing_names_are_key_errors() {
        let grid = small_grid();
        assert!(matches!(grid.coord("time"), Err(GridError::KeyNotFound(_))));
        assert!(matches!(grid.variable("PRECL"), Err(GridError::KeyNotFound(_))));
    }

    #[test]
    fn roll_moves_coordinate_and_data_together() {
        let grid = small_grid();
        let rolled = grid.roll("lon", -1);
        assert_eq!(
            rolled.coord_values("lon").unwrap(),
            array![120.0, 240.0, 0.0]
        );
        let ts = rolled.variable("TS").unwrap().values();
        assert_eq!(ts[[0, 0]], 1.0);
        assert_eq!(ts[[1, 2]], 10.0);
        // Latitude untouched
        assert_eq!(rolled.coord_values("lat").unwrap(), array![-30.0, 30.0]);
    }

    #[test]
    fn mask_along_sets_nan() {
        let grid = small_grid();
        let masked = grid.mask_along("lat", &[true, false]).unwrap();
        let ts = masked.variable("TS").unwrap().values();
        assert_eq!(ts[[0, 1]], 1.0);
        assert!(ts[[1, 0]].is_nan());
        assert!(grid.mask_along("lat", &[true]).is_err());
    }

    #[test]
    fn reindex_nearest_snaps_to_target_coordinates() {
        let grid = small_grid();
        let mut drifted = grid.clone();
        drifted
            .replace_coord_values("lon", array![0.0004, 119.9996, 240.0])
            .unwrap();

        let reindexed = drifted.reindex_nearest(&grid, &["lon"], 1e-3).unwrap();
        assert_eq!(
            reindexed.coord_values("lon").unwrap(),
            grid.coord_values("lon").unwrap()
        );
        assert_eq!(
            reindexed.variable("TS").unwrap().values(),
            grid.variable("TS").unwrap().values()
        );
    }

    #[test]
    fn reindex_nearest_leaves_gaps_as_nan() {
        let grid = small_grid();
        let mut drifted = grid.clone();
        drifted
            .replace_coord_values("lon", array![0.0, 125.0, 240.0])
            .unwrap();

        let reindexed = drifted.reindex_nearest(&grid, &["lon"], 1e-3).unwrap();
        let ts = reindexed.variable("TS").unwrap().values();
        assert!(ts[[0, 1]].is_nan());
        assert_eq!(ts[[0, 2]], 2.0);
    }

    #[test]
    fn grid_serialises_to_json() {
        let grid = small_grid();
        let serialised = serde_json::to_string(&grid).unwrap();
        let deserialised: Grid = serde_json::from_str(&serialised).unwrap();
        assert_eq!(deserialised, grid);
    }

    #[test]
    fn deserialising_checks_dimension_lengths() {
        // lon has 3 values but TS is stored with 5 along lon
        let mut document = serde_json::to_value(small_grid()).unwrap();
        document["variables"]["TS"]["values"] =
            serde_json::to_value(Array2::<f64>::zeros((2, 5)).into_dyn()).unwrap();

        let result: Result<Grid, _> = serde_json::from_value(document);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("TS"), "{}", message);
    }

    #[test]
    fn deserialising_checks_dimension_names() {
        let mut repeated = serde_json::to_value(small_grid()).unwrap();
        repeated["variables"]["TS"]["dims"] = serde_json::json!(["lat", "lat"]);
        assert!(serde_json::from_value::<Grid>(repeated).is_err());

        let mut too_few = serde_json::to_value(small_grid()).unwrap();
        too_few["variables"]["TS"]["dims"] = serde_json::json!(["lat"]);
        assert!(serde_json::from_value::<Grid>(too_few).is_err());
    }

    #[test]
    fn deserialising_checks_variables_against_each_other() {
        // No lon coordinate, so the two variables disagree with nothing but each other
        let mut grid = Grid::new();
        grid.insert_variable(
            "a",
            Variable::new(&["lon"], ndarray::Array1::<f64>::zeros(3).into_dyn()).unwrap(),
        )
        .unwrap();
        let mut document = serde_json::to_value(&grid).unwrap();
        document["variables"]["b"] = document["variables"]["a"].clone();
        document["variables"]["b"]["values"] =
            serde_json::to_value(ndarray::Array1::<f64>::zeros(4).into_dyn()).unwrap();

        assert!(serde_json::from_value::<Grid>(document).is_err());
    }
}
