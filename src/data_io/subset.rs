//! Copy netCDF files with renamed dimensions and a lat/lon crop, and
//! in-place edits of gridded variables.

use super::utils::{attribute_as_f64, default_fill_values, is_missing_value, FILL_ATTRIBUTES};
use super::WriteError;
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayD, IxDyn, Slice};
use netcdf::types::NcVariableType;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

/// Inclusive longitude/latitude box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

/// How to derive a regional file from a global one
#[derive(Debug, Clone, Default)]
pub struct SubsetOptions {
    /// Dimension renames, e.g. `("x", "lon")`
    pub renames: Vec<(String, String)>,
    /// Coordinate values written as f4 `lat`/`lon` variables before cropping
    pub coords: Option<(Array1<f64>, Array1<f64>)>,
    pub bbox: Option<BoundingBox>,
}

impl SubsetOptions {
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_string(), to.to_string()));
        self
    }

    pub fn with_coords(mut self, lat: Array1<f64>, lon: Array1<f64>) -> Self {
        self.coords = Some((lat, lon));
        self
    }

    pub fn crop(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    fn renamed(&self, name: &str) -> String {
        self.renames
            .iter()
            .find(|(from, _)| from == name)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

/// Contiguous index range of the values inside `[min, max]`
pub fn index_range(values: &Array1<f64>, min: f64, max: f64) -> Option<Range<usize>> {
    let inside: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v >= min && v <= max)
        .map(|(i, _)| i)
        .collect();
    match (inside.first(), inside.last()) {
        (Some(&first), Some(&last)) => Some(first..last + 1),
        _ => None,
    }
}

fn read_values(var: &netcdf::Variable) -> Result<ArrayD<f64>, WriteError> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values: Vec<f64> = if shape.is_empty() {
        vec![var.get_value::<f64, _>(..)?]
    } else {
        var.get_values::<f64, _>(..)?
    };
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| WriteError::InvalidData(format!("{}: {}", var.name(), e)))
}

fn read_coordinate(file: &netcdf::File, name: &str) -> Result<Array1<f64>, WriteError> {
    let var = file
        .variable(name)
        .ok_or_else(|| WriteError::MissingVariable(name.to_string()))?;
    read_values(&var)?
        .into_dimensionality()
        .map_err(|_| WriteError::InvalidData(format!("{} is not one-dimensional", name)))
}

/// Copy `src` to `dst`, renaming dimensions, optionally adding `lat`/`lon`
/// coordinates and cropping to a bounding box. Numeric variables keep their
/// source type and attributes; the crop keeps every cell whose centre lies
/// inside the box.
pub fn subset_file(src: &Path, dst: &Path, options: &SubsetOptions) -> Result<(), WriteError> {
    debug!("Subsetting {} -> {}", src.display(), dst.display());
    let input = netcdf::open(src)?;

    let (lat, lon) = match &options.coords {
        Some((lat, lon)) => (lat.clone(), lon.clone()),
        None => (read_coordinate(&input, "lat")?, read_coordinate(&input, "lon")?),
    };

    // Output dimension name -> (source length, kept index range)
    let mut ranges: HashMap<String, Range<usize>> = HashMap::new();
    let mut dims: Vec<(String, usize)> = Vec::new();
    for dim in input.dimensions() {
        let name = options.renamed(&dim.name());
        ranges.insert(name.clone(), 0..dim.len());
        dims.push((name, dim.len()));
    }

    for (name, values) in [("lat", &lat), ("lon", &lon)] {
        let len = dims
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| *len)
            .ok_or_else(|| WriteError::InvalidData(format!("{} has no {} dimension", src.display(), name)))?;
        if len != values.len() {
            return Err(WriteError::InvalidData(format!(
                "{} coordinate has {} values for a dimension of {}",
                name,
                values.len(),
                len
            )));
        }
    }

    if let Some(bbox) = options.bbox {
        let lat_range = index_range(&lat, bbox.lat_min, bbox.lat_max)
            .ok_or_else(|| WriteError::InvalidData("no latitudes inside the box".to_string()))?;
        let lon_range = index_range(&lon, bbox.lon_min, bbox.lon_max)
            .ok_or_else(|| WriteError::InvalidData("no longitudes inside the box".to_string()))?;
        ranges.insert("lat".to_string(), lat_range);
        ranges.insert("lon".to_string(), lon_range);
    }

    let mut output = netcdf::create(dst)?;
    for attr in input.attributes() {
        let name = attr.name().to_string();
        output.add_attribute(&name, attr.value()?)?;
    }
    for (name, _) in &dims {
        output.add_dimension(name, ranges[name].len())?;
    }

    let injected = options.coords.is_some();
    for var in input.variables() {
        let name = var.name();
        if injected && (name == "lat" || name == "lon") {
            continue;
        }
        let vartype = var.vartype();
        if !matches!(vartype, NcVariableType::Int(_) | NcVariableType::Float(_)) {
            warn!("Skipping non-numeric variable {}", name);
            continue;
        }
        let var_dims: Vec<String> = var.dimensions().iter().map(|d| options.renamed(&d.name())).collect();

        // Values pass through f64; the library converts back on write
        let values = read_values(&var)?;
        let cropped = values.slice_each_axis(|ax| {
            let range = &ranges[&var_dims[ax.axis.index()]];
            Slice::from(range.clone())
        });

        let dim_refs: Vec<&str> = var_dims.iter().map(String::as_str).collect();
        let mut out = output.add_variable_with_type(&name, &dim_refs, &vartype)?;
        for attr in var.attributes() {
            out.put_attribute(attr.name(), attr.value()?)?;
        }
        let data: Vec<f64> = cropped.iter().copied().collect();
        if var_dims.is_empty() {
            out.put_value(data[0], ..)?;
        } else {
            out.put_values(&data, ..)?;
        }
    }

    if injected {
        for (name, values, units) in [("lat", &lat, "degrees North"), ("lon", &lon, "degrees East")] {
            let range = ranges[name].clone();
            let data: Vec<f32> = values.slice(ndarray::s![range]).iter().map(|&v| v as f32).collect();
            let mut var = output.add_variable::<f32>(name, &[name])?;
            var.put_attribute("units", units)?;
            var.put_values(&data, ..)?;
        }
    }

    Ok(())
}

/// Apply `op` to every element of `var` using the matching cell of `field`,
/// which must match the variable's trailing `(lat, lon)` shape. Elements
/// holding a fill value are passed with `missing = true`.
pub fn update_on_grid<T, F>(path: &Path, var_name: &str, field: &Array2<T>, op: F) -> Result<usize, WriteError>
where
    F: Fn(f64, &T, bool) -> f64,
{
    let mut file = netcdf::append(path)?;
    let mut var = file
        .variable_mut(var_name)
        .ok_or_else(|| WriteError::MissingVariable(var_name.to_string()))?;

    let mut fills = default_fill_values();
    for attr in FILL_ATTRIBUTES {
        if let Some(value) = var.attribute_value(attr) {
            if let Some(fill) = attribute_as_f64(&value?) {
                fills.push(fill);
            }
        }
    }

    let mut values = read_values(&var)?;
    let shape = values.shape().to_vec();
    let n = shape.len();
    if n < 2 || (shape[n - 2], shape[n - 1]) != field.dim() {
        return Err(WriteError::InvalidData(format!(
            "{} has shape {:?}, grid is {:?}",
            var_name,
            shape,
            field.dim()
        )));
    }

    let mut changed = 0usize;
    for (idx, v) in values.indexed_iter_mut() {
        let cell = &field[[idx[n - 2], idx[n - 1]]];
        let updated = op(*v, cell, is_missing_value(*v, &fills));
        if updated != *v {
            changed += 1;
            *v = updated;
        }
    }

    let data: Vec<f64> = values.iter().copied().collect();
    var.put_values(&data, ..)?;
    Ok(changed)
}

/// Set `var` to zero wherever `mask` is true
pub fn zero_where(path: &Path, var_name: &str, mask: &Array2<bool>) -> Result<usize, WriteError> {
    update_on_grid(path, var_name, mask, |v, &m, _| if m { 0.0 } else { v })
}

/// Multiply the non-missing values of `var` by `factor`
pub fn multiply_by(path: &Path, var_name: &str, factor: &Array2<f64>) -> Result<usize, WriteError> {
    update_on_grid(path, var_name, factor, |v, &f, missing| if missing { v } else { v * f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_index_range() {
        let lat = array![19.75, 20.25, 20.75, 39.75, 40.25];
        assert_eq!(index_range(&lat, 20.0, 40.0), Some(1..4));
        assert_eq!(index_range(&lat, 50.0, 60.0), None);

        let edges = array![59.5, 60.0, 100.0, 100.5];
        assert_eq!(index_range(&edges, 60.0, 100.0), Some(1..3));
    }

    #[test]
    fn test_renamed() {
        let options = SubsetOptions::default().rename("x", "lon").rename("y", "lat");
        assert_eq!(options.renamed("x"), "lon");
        assert_eq!(options.renamed("y"), "lat");
        assert_eq!(options.renamed("z"), "z");
    }
}
