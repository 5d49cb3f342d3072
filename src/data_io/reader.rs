use super::utils::{attribute_as_f64, attribute_as_string, default_fill_values, is_missing_value};
use super::MaskedArrayD;
use crate::time_utils::{check_calendar, TimeUnits};
use ndarray::{Array1, ArrayD, IxDyn};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Variable not found: {0}")]
    MissingVariable(String),

    #[error("Dimension not found: {0}")]
    MissingDimension(String),

    #[error("Attribute {attribute} not found on {variable}")]
    MissingAttribute { variable: String, attribute: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid time axis: {0}")]
    TimeUnits(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Read-only access to one netCDF file
pub struct NetCDFReader {
    file: netcdf::File,
}

impl NetCDFReader {
    /// Open a netCDF file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReaderError::FileNotFound(path.display().to_string()));
        }
        let file = netcdf::open(path)?;
        Ok(Self { file })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>, ReaderError> {
        self.file
            .variable(name)
            .ok_or_else(|| ReaderError::MissingVariable(name.to_string()))
    }

    /// Length of a named dimension
    pub fn dimension_len(&self, name: &str) -> Result<usize, ReaderError> {
        self.file
            .dimension(name)
            .map(|d| d.len())
            .ok_or_else(|| ReaderError::MissingDimension(name.to_string()))
    }

    /// Dimension names of a variable, in order
    pub fn variable_dims(&self, name: &str) -> Result<Vec<String>, ReaderError> {
        Ok(self
            .variable(name)?
            .dimensions()
            .iter()
            .map(|d| d.name())
            .collect())
    }

    /// String attribute of a variable
    pub fn string_attribute(&self, var: &str, name: &str) -> Result<String, ReaderError> {
        let missing = || ReaderError::MissingAttribute {
            variable: var.to_string(),
            attribute: name.to_string(),
        };
        let value = self.variable(var)?.attribute_value(name).ok_or_else(missing)??;
        attribute_as_string(&value).ok_or_else(missing)
    }

    /// Numeric attribute of a variable, `None` if absent
    pub fn numeric_attribute(&self, var: &str, name: &str) -> Result<Option<f64>, ReaderError> {
        match self.variable(var)?.attribute_value(name) {
            Some(value) => Ok(attribute_as_f64(&value?)),
            None => Ok(None),
        }
    }

    /// Values declared as missing for a variable plus the netCDF defaults
    fn fill_values(&self, var: &str) -> Result<Vec<f64>, ReaderError> {
        let mut fills = default_fill_values();
        for attr in ["_FillValue", "missing_value"] {
            if let Some(v) = self.numeric_attribute(var, attr)? {
                fills.push(v);
            }
        }
        Ok(fills)
    }

    /// Read a whole variable as f64 without masking
    pub fn read_array(&self, name: &str) -> Result<ArrayD<f64>, ReaderError> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = if shape.is_empty() {
            vec![var.get_value::<f64, _>(..)?]
        } else {
            var.get_values::<f64, _>(..)?
        };
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| ReaderError::ShapeMismatch(format!("{}: {}", name, e)))
    }

    /// Read a whole variable with fill values and NaNs masked
    pub fn read_masked(&self, name: &str) -> Result<MaskedArrayD, ReaderError> {
        let fills = self.fill_values(name)?;
        let data = self.read_array(name)?;
        Ok(MaskedArrayD::from_data(data, |v| is_missing_value(v, &fills)))
    }

    /// Read a one-dimensional coordinate variable
    pub fn read_coordinate(&self, name: &str) -> Result<Array1<f64>, ReaderError> {
        self.read_array(name)?
            .into_dimensionality()
            .map_err(|_| ReaderError::ShapeMismatch(format!("{} is not one-dimensional", name)))
    }

    /// Parsed `units` of a time variable, checking its calendar
    pub fn time_units(&self, name: &str) -> Result<TimeUnits, ReaderError> {
        let units = self.string_attribute(name, "units")?;
        if let Ok(calendar) = self.string_attribute(name, "calendar") {
            check_calendar(&calendar).map_err(ReaderError::TimeUnits)?;
        }
        units.parse().map_err(ReaderError::TimeUnits)
    }

    /// Units and calendar strings of a time variable, for copying to outputs
    pub fn time_attributes(&self, name: &str) -> Result<(String, String), ReaderError> {
        let units = self.string_attribute(name, "units")?;
        let calendar = self
            .string_attribute(name, "calendar")
            .unwrap_or_else(|_| "gregorian".to_string());
        Ok((units, calendar))
    }

    /// Position of a named dimension within a variable
    pub fn axis_of(&self, var: &str, dim: &str) -> Result<usize, ReaderError> {
        self.variable_dims(var)?
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| ReaderError::MissingDimension(format!("{} in {}", dim, var)))
    }
}
