//! netCDF writers for the ANTS and JULES ancillary layouts.
//!
//! ANTS files use `latitude`/`longitude` f8 coordinates with bounds and a
//! `latitude_longitude` grid mapping, latitude in raster order. JULES files
//! use f4 `lat`/`lon` with latitude increasing.

use super::utils::NC_FILL_DOUBLE;
use super::MaskedArray;
use crate::config::Constants;
use crate::grid::RegionGrid;
use chrono::NaiveDateTime;
use log::debug;
use ndarray::{Array1, Array4, Dimension, Ix2, Ix3, Ix4};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Variable not found: {0}")]
    MissingVariable(String),
}

/// Vegetation climatology variable of an ANTS file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VegVariable {
    LeafAreaIndex,
    CanopyHeight,
}

impl VegVariable {
    pub fn name(self) -> &'static str {
        match self {
            VegVariable::LeafAreaIndex => "leaf_area_index",
            VegVariable::CanopyHeight => "canopy_height",
        }
    }

    pub fn units(self) -> &'static str {
        match self {
            VegVariable::LeafAreaIndex => "1",
            VegVariable::CanopyHeight => "m",
        }
    }

    fn stash(self, constants: &Constants) -> &'static str {
        match self {
            VegVariable::LeafAreaIndex => constants.lai_stash,
            VegVariable::CanopyHeight => constants.canopy_height_stash,
        }
    }
}

const CLIMATOLOGY_CELL_METHODS: &str = "time: mean within days time: mean over years";
const CLIMATOLOGY_TIME_UNITS: &str = "hours since 1970-01-01 00:00:00";

fn check_grid_shape(shape: &[usize], grid: &RegionGrid) -> Result<(), WriteError> {
    let n = shape.len();
    if n < 2 || shape[n - 2] != grid.nlat() || shape[n - 1] != grid.nlon() {
        return Err(WriteError::InvalidData(format!(
            "array shape {:?} does not end with grid shape {:?}",
            shape,
            grid.shape()
        )));
    }
    Ok(())
}

/// Flatten masked data, writing `fill` on missing elements
fn filled_values<D: Dimension>(array: &MaskedArray<D>, fill: f64) -> Vec<f64> {
    array
        .data
        .iter()
        .zip(array.mask.iter())
        .map(|(&v, &m)| if m { fill } else { v })
        .collect()
}

/// Add the ANTS lat/lon dimensions, coordinates, bounds and grid mapping
pub fn add_lat_lon_dims(
    file: &mut netcdf::FileMut,
    grid: &RegionGrid,
    constants: &Constants,
) -> Result<(), WriteError> {
    file.add_dimension("latitude", grid.nlat())?;
    file.add_dimension("longitude", grid.nlon())?;
    file.add_dimension("bnds", 2)?;

    let mut var = file.add_variable::<f64>("longitude", &["longitude"])?;
    var.put_attribute("axis", "X")?;
    var.put_attribute("bounds", "longitude_bnds")?;
    var.put_attribute("units", "degrees_east")?;
    var.put_attribute("standard_name", "longitude")?;
    var.put_values(&grid.lon.to_vec(), ..)?;

    let bounds = grid.lon_bounds();
    let mut var = file.add_variable::<f64>("longitude_bnds", &["longitude", "bnds"])?;
    var.put_values(&bounds.iter().copied().collect::<Vec<_>>(), ..)?;

    let mut var = file.add_variable::<f64>("latitude", &["latitude"])?;
    var.put_attribute("axis", "Y")?;
    var.put_attribute("bounds", "latitude_bnds")?;
    var.put_attribute("units", "degrees_north")?;
    var.put_attribute("standard_name", "latitude")?;
    var.put_values(&grid.lat.to_vec(), ..)?;

    let bounds = grid.lat_bounds();
    let mut var = file.add_variable::<f64>("latitude_bnds", &["latitude", "bnds"])?;
    var.put_values(&bounds.iter().copied().collect::<Vec<_>>(), ..)?;

    let mut var = file.add_variable::<i32>("latitude_longitude", &[])?;
    var.put_attribute("grid_mapping_name", "latitude_longitude")?;
    var.put_attribute("longitude_of_prime_meridian", 0.0f64)?;
    var.put_attribute("earth_radius", constants.earth_radius)?;

    Ok(())
}

fn add_pseudo_level(file: &mut netcdf::FileMut, dim: &str, levels: &[i32]) -> Result<(), WriteError> {
    let mut var = file.add_variable::<i32>("pseudo_level", &[dim])?;
    var.put_attribute("units", "1")?;
    var.put_attribute("long_name", "pseudo_level")?;
    var.put_values(levels, ..)?;
    Ok(())
}

/// Write land cover fractions `(type, lat, lon)` in ANTS layout
pub fn write_frac_ants(
    path: impl AsRef<Path>,
    frac: &MaskedArray<Ix3>,
    grid: &RegionGrid,
    constants: &Constants,
) -> Result<(), WriteError> {
    check_grid_shape(frac.shape(), grid)?;
    let ntype = frac.shape()[0];
    debug!("Writing {} land cover types to {}", ntype, path.as_ref().display());

    let mut file = netcdf::create(path.as_ref())?;
    file.add_dimension("dim0", ntype)?;
    add_lat_lon_dims(&mut file, grid, constants)?;

    let mut var = file.add_variable::<f64>("land_cover_lccs", &["dim0", "latitude", "longitude"])?;
    var.set_fill_value(constants.f8_fill)?;
    var.put_attribute("units", "1")?;
    var.put_attribute("um_stash_source", constants.frac_stash)?;
    var.put_attribute("standard_name", "land_cover_lccs")?;
    var.put_attribute("grid_mapping", "latitude_longitude")?;
    var.put_attribute("coordinates", "pseudo_level")?;
    var.put_values(&filled_values(frac, constants.f8_fill), ..)?;

    let levels: Vec<i32> = (1..=ntype as i32).collect();
    add_pseudo_level(&mut file, "dim0", &levels)?;
    Ok(())
}

/// Rewrite the values of an existing f8 variable, filling masked elements
pub fn overwrite_variable<D: Dimension>(
    path: impl AsRef<Path>,
    name: &str,
    values: &MaskedArray<D>,
) -> Result<(), WriteError> {
    let mut file = netcdf::append(path.as_ref())?;
    let mut var = file
        .variable_mut(name)
        .ok_or_else(|| WriteError::MissingVariable(name.to_string()))?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    if shape != values.shape() {
        return Err(WriteError::InvalidData(format!(
            "{} has shape {:?}, data has {:?}",
            name,
            shape,
            values.shape()
        )));
    }
    var.put_values(&filled_values(values, NC_FILL_DOUBLE), ..)?;
    Ok(())
}

fn add_climatology_time(
    file: &mut netcdf::FileMut,
    times: &[NaiveDateTime],
) -> Result<usize, WriteError> {
    let units: crate::time_utils::TimeUnits = CLIMATOLOGY_TIME_UNITS
        .parse()
        .map_err(WriteError::InvalidData)?;
    let values: Vec<i32> = crate::time_utils::date2num(times, &units)
        .iter()
        .map(|&v| v.round() as i32)
        .collect();

    file.add_unlimited_dimension("time")?;
    let mut var = file.add_variable::<i32>("time", &["time"])?;
    var.put_attribute("axis", "T")?;
    var.put_attribute("units", CLIMATOLOGY_TIME_UNITS)?;
    var.put_attribute("standard_name", "time")?;
    var.put_attribute("calendar", "gregorian")?;
    var.put_values(&values, 0..values.len())?;
    Ok(values.len())
}

/// Write a vegetation climatology `(time, type, lat, lon)` in ANTS layout
pub fn write_veg_climatology(
    path: impl AsRef<Path>,
    grid: &RegionGrid,
    kind: VegVariable,
    times: &[NaiveDateTime],
    values: &MaskedArray<Ix4>,
    constants: &Constants,
) -> Result<(), WriteError> {
    check_grid_shape(values.shape(), grid)?;
    let (nt, nveg, nlat, nlon) = values.data.dim();
    if nt != times.len() {
        return Err(WriteError::InvalidData(format!(
            "{} time steps but {} timestamps",
            nt,
            times.len()
        )));
    }
    debug!("Writing {} steps of {} to {}", nt, kind.name(), path.as_ref().display());

    let mut file = netcdf::create(path.as_ref())?;
    add_climatology_time(&mut file, times)?;
    file.add_dimension("dim1", nveg)?;
    add_lat_lon_dims(&mut file, grid, constants)?;

    let levels: Vec<i32> = (1..=nveg as i32).collect();
    add_pseudo_level(&mut file, "dim1", &levels)?;

    let mut var = file.add_variable::<f64>(kind.name(), &["time", "dim1", "latitude", "longitude"])?;
    var.set_fill_value(constants.f8_fill)?;
    var.put_attribute("units", kind.units())?;
    var.put_attribute("um_stash_source", kind.stash(constants))?;
    var.put_attribute("standard_name", kind.name())?;
    var.put_attribute("grid_mapping", "latitude_longitude")?;
    var.put_attribute("coordinates", "pseudo_level")?;
    var.put_attribute("cell_methods", CLIMATOLOGY_CELL_METHODS)?;
    var.put_values(
        &filled_values(values, constants.f8_fill),
        (0..nt, 0..nveg, 0..nlat, 0..nlon),
    )?;
    Ok(())
}

/// Write one land cover's LAI climatology `(time, lat, lon)` in ANTS layout
pub fn write_lai_single(
    path: impl AsRef<Path>,
    grid: &RegionGrid,
    times: &[NaiveDateTime],
    lai: &MaskedArray<Ix3>,
    constants: &Constants,
) -> Result<(), WriteError> {
    check_grid_shape(lai.shape(), grid)?;
    let (nt, nlat, nlon) = lai.data.dim();
    if nt != times.len() {
        return Err(WriteError::InvalidData(format!(
            "{} time steps but {} timestamps",
            nt,
            times.len()
        )));
    }

    let mut file = netcdf::create(path.as_ref())?;
    add_climatology_time(&mut file, times)?;
    add_lat_lon_dims(&mut file, grid, constants)?;

    let mut var = file.add_variable::<f64>("leaf_area_index", &["time", "latitude", "longitude"])?;
    var.set_fill_value(constants.f8_fill)?;
    var.put_attribute("units", "1")?;
    var.put_attribute("um_stash_source", constants.lai_stash)?;
    var.put_attribute("standard_name", "leaf_area_index")?;
    var.put_attribute("grid_mapping", "latitude_longitude")?;
    var.put_attribute("cell_methods", CLIMATOLOGY_CELL_METHODS)?;
    var.put_values(&filled_values(lai, constants.f8_fill), (0..nt, 0..nlat, 0..nlon))?;
    Ok(())
}

/// JULES model-grid coordinates, latitude increasing
#[derive(Debug, Clone)]
pub struct JulesCoords {
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
}

impl JulesCoords {
    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }
}

/// Time axis copied from a source file: values plus `units`/`calendar`
#[derive(Debug, Clone)]
pub struct TimeAxis {
    pub values: Vec<i32>,
    pub units: String,
    pub calendar: String,
}

fn add_jules_lat_lon(file: &mut netcdf::FileMut, coords: &JulesCoords) -> Result<(), WriteError> {
    file.add_dimension("lat", coords.nlat())?;
    file.add_dimension("lon", coords.nlon())?;

    let mut var = file.add_variable::<f32>("lat", &["lat"])?;
    var.put_attribute("units", "degrees North")?;
    var.put_values(&coords.lat.iter().map(|&v| v as f32).collect::<Vec<_>>(), ..)?;

    let mut var = file.add_variable::<f32>("lon", &["lon"])?;
    var.put_attribute("units", "degrees East")?;
    var.put_values(&coords.lon.iter().map(|&v| v as f32).collect::<Vec<_>>(), ..)?;
    Ok(())
}

fn add_tstep(file: &mut netcdf::FileMut, time: &TimeAxis) -> Result<(), WriteError> {
    file.add_unlimited_dimension("tstep")?;
    let mut var = file.add_variable::<i32>("tstep", &["tstep"])?;
    var.put_attribute("units", time.units.as_str())?;
    var.put_attribute("calendar", time.calendar.as_str())?;
    var.put_values(&time.values, 0..time.values.len())?;
    Ok(())
}

fn check_coords(shape: &[usize], coords: &JulesCoords) -> Result<(), WriteError> {
    let n = shape.len();
    if n < 2 || shape[n - 2] != coords.nlat() || shape[n - 1] != coords.nlon() {
        return Err(WriteError::InvalidData(format!(
            "array shape {:?} does not match {} x {} grid",
            shape,
            coords.nlat(),
            coords.nlon()
        )));
    }
    Ok(())
}

/// Write land cover fractions `(type, lat, lon)` in JULES layout
pub fn write_frac_jules(
    path: impl AsRef<Path>,
    frac: &MaskedArray<Ix3>,
    coords: &JulesCoords,
) -> Result<(), WriteError> {
    check_coords(frac.shape(), coords)?;
    let ntype = frac.shape()[0];

    let mut file = netcdf::create(path.as_ref())?;
    file.add_dimension("dim0", ntype)?;
    add_jules_lat_lon(&mut file, coords)?;

    let levels: Vec<i32> = (1..=ntype as i32).collect();
    add_pseudo_level(&mut file, "dim0", &levels)?;

    let mut var = file.add_variable::<f64>("land_cover_lccs", &["dim0", "lat", "lon"])?;
    var.set_fill_value(NC_FILL_DOUBLE)?;
    var.put_attribute("units", "1")?;
    var.put_attribute("standard_name", "land_cover_lccs")?;
    var.put_values(&filled_values(frac, NC_FILL_DOUBLE), ..)?;
    Ok(())
}

/// Canopy height and LAI `(tstep, type, lat, lon)` in JULES layout
pub struct VegFunc<'a> {
    pub time: &'a TimeAxis,
    pub pseudo_level: &'a [i32],
    pub canopy_height: &'a MaskedArray<Ix4>,
    pub leaf_area_index: &'a MaskedArray<Ix4>,
}

pub fn write_veg_func_jules(
    path: impl AsRef<Path>,
    coords: &JulesCoords,
    veg: &VegFunc,
) -> Result<(), WriteError> {
    let (nt, nveg, nlat, nlon) = veg.canopy_height.data.dim();
    check_coords(veg.canopy_height.shape(), coords)?;
    if veg.leaf_area_index.shape() != veg.canopy_height.shape() {
        return Err(WriteError::InvalidData(format!(
            "LAI shape {:?} differs from canopy height {:?}",
            veg.leaf_area_index.shape(),
            veg.canopy_height.shape()
        )));
    }
    if nt != veg.time.values.len() || nveg != veg.pseudo_level.len() {
        return Err(WriteError::InvalidData(format!(
            "shape {:?} does not match {} steps and {} levels",
            veg.canopy_height.shape(),
            veg.time.values.len(),
            veg.pseudo_level.len()
        )));
    }

    let mut file = netcdf::create(path.as_ref())?;
    add_tstep(&mut file, veg.time)?;
    file.add_dimension("dim1", nveg)?;
    add_jules_lat_lon(&mut file, coords)?;
    add_pseudo_level(&mut file, "dim1", veg.pseudo_level)?;

    for (kind, values) in [
        (VegVariable::CanopyHeight, veg.canopy_height),
        (VegVariable::LeafAreaIndex, veg.leaf_area_index),
    ] {
        let mut var = file.add_variable::<f64>(kind.name(), &["tstep", "dim1", "lat", "lon"])?;
        var.set_fill_value(NC_FILL_DOUBLE)?;
        var.put_attribute("standard_name", kind.name())?;
        var.put_attribute("units", kind.units())?;
        var.put_values(
            &filled_values(values, NC_FILL_DOUBLE),
            (0..nt, 0..nveg, 0..nlat, 0..nlon),
        )?;
    }
    Ok(())
}

/// Write an irrigation schedule `(tstep, type, lat, lon)` in JULES layout
pub fn write_irrig_schedule(
    path: impl AsRef<Path>,
    coords: &JulesCoords,
    time: &TimeAxis,
    pseudo_level: &[i32],
    schedule: &Array4<i32>,
) -> Result<(), WriteError> {
    check_coords(schedule.shape(), coords)?;
    let (nt, ntype, nlat, nlon) = schedule.dim();
    if nt != time.values.len() || ntype != pseudo_level.len() {
        return Err(WriteError::InvalidData(format!(
            "schedule shape {:?} does not match {} steps and {} levels",
            schedule.shape(),
            time.values.len(),
            pseudo_level.len()
        )));
    }

    let mut file = netcdf::create(path.as_ref())?;
    add_tstep(&mut file, time)?;
    file.add_dimension("dim0", ntype)?;
    add_jules_lat_lon(&mut file, coords)?;
    add_pseudo_level(&mut file, "dim0", pseudo_level)?;

    let mut var = file.add_variable::<i32>("irr_schedule", &["tstep", "dim0", "lat", "lon"])?;
    var.put_attribute("standard_name", "irr_schedule")?;
    var.put_attribute("units", "1")?;
    var.put_values(
        &schedule.iter().copied().collect::<Vec<_>>(),
        (0..nt, 0..ntype, 0..nlat, 0..nlon),
    )?;
    Ok(())
}

/// Stack equally shaped `(lat, lon)` slices of a `(t, lat, lon)` series
pub fn stack_time(slices: Vec<MaskedArray<Ix2>>) -> Result<MaskedArray<Ix3>, WriteError> {
    super::stack_masked(&slices).map_err(WriteError::InvalidData)
}

/// All-missing `(time, type, lat, lon)` array
pub fn empty_climatology(nt: usize, nveg: usize, nlat: usize, nlon: usize) -> MaskedArray<Ix4> {
    MaskedArray {
        data: Array4::zeros((nt, nveg, nlat, nlon)),
        mask: Array4::from_elem((nt, nveg, nlat, nlon), true),
    }
}
