//! Geometry of the target region grid, derived from a template GeoTIFF.
//!
//! Coordinates are cell centres. Latitude follows the raster row order, so
//! for a north-up raster it runs from north to south.

use crate::data_io::{read_band, ReaderError};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Dimension};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone)]
pub struct RegionGrid {
    pub lon: Array1<f64>,
    pub lat: Array1<f64>,
    pub extent: Extent,
    /// Land fraction of each cell, row-major `(lat, lon)`
    pub land_frac: Array2<f64>,
}

impl RegionGrid {
    /// Build the grid from a geotransform and the land fraction raster
    pub fn from_geotransform(gt: &[f64; 6], land_frac: Array2<f64>) -> Self {
        let (nlat, nlon) = land_frac.dim();
        let lon = Array1::from_iter((0..nlon).map(|i| gt[0] + i as f64 * gt[1] + gt[1] / 2.0));
        let lat = Array1::from_iter((0..nlat).map(|j| gt[3] + j as f64 * gt[5] + gt[5] / 2.0));
        let extent = Extent {
            left: gt[0],
            right: gt[0] + nlon as f64 * gt[1],
            top: gt[3],
            bottom: gt[3] + nlat as f64 * gt[5],
        };
        Self {
            lon,
            lat,
            extent,
            land_frac,
        }
    }

    /// Read band 1 of a template GeoTIFF; nodata is kept as-is
    pub fn from_geotiff(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let (land_frac, metadata) = read_band(path)?;
        Ok(Self::from_geotransform(&metadata.geotransform, land_frac))
    }

    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nlat(), self.nlon())
    }

    /// Longitude cell bounds, west to east
    pub fn lon_bounds(&self) -> Array2<f64> {
        cell_bounds(self.nlon(), self.extent.left, self.extent.right)
    }

    /// Latitude cell bounds, in row order (top to bottom)
    pub fn lat_bounds(&self) -> Array2<f64> {
        cell_bounds(self.nlat(), self.extent.top, self.extent.bottom)
    }

    /// 2D latitude and longitude of every cell centre
    pub fn lat_lon_grids(&self) -> (Array2<f64>, Array2<f64>) {
        let (nlat, nlon) = self.shape();
        let lat = Array2::from_shape_fn((nlat, nlon), |(j, _)| self.lat[j]);
        let lon = Array2::from_shape_fn((nlat, nlon), |(_, i)| self.lon[i]);
        (lat, lon)
    }

    /// `true` where a cell holds no land
    pub fn land_mask(&self) -> Array2<bool> {
        self.land_frac.mapv(|v| v == 0.0)
    }
}

/// `n` cells between `start` and `end` as `(lower, upper)` edge pairs
pub fn cell_bounds(n: usize, start: f64, end: f64) -> Array2<f64> {
    let edges = Array1::linspace(start, end, n + 1);
    Array2::from_shape_fn((n, 2), |(i, k)| edges[i + k])
}

/// Reverse the latitude axis (north-up raster order <-> south-up model order)
pub fn flip_lat<S, D>(array: &ArrayBase<S, D>, lat_axis: usize) -> ndarray::Array<S::Elem, D>
where
    S: Data,
    S::Elem: Clone,
    D: Dimension,
{
    let mut view = array.view();
    view.invert_axis(Axis(lat_axis));
    view.as_standard_layout().into_owned()
}
