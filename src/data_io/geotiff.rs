use super::reader::ReaderError;
use super::MaskedArray2;
use gdal::raster::{Buffer, RasterBand};
use gdal::{Dataset, DriverManager};
use log::debug;
use ndarray::Array2;
use std::path::Path;

/// Georeferencing of a single-band raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
    pub nodata: Option<f64>,
}

/// Read band 1 of a raster as f64, without masking
pub fn read_band(path: impl AsRef<Path>) -> Result<(Array2<f64>, RasterMetadata), ReaderError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReaderError::FileNotFound(path.display().to_string()));
    }
    debug!("Opening raster: {}", path.display());
    let dataset = Dataset::open(path)?;
    let band: RasterBand = dataset.rasterband(1)?;

    let width = band.x_size();
    let height = band.y_size();
    if width == 0 || height == 0 {
        return Err(ReaderError::ShapeMismatch(format!(
            "{} has invalid dimensions {}x{}",
            path.display(),
            width,
            height
        )));
    }

    let metadata = RasterMetadata {
        width,
        height,
        geotransform: dataset.geo_transform()?,
        nodata: band.no_data_value(),
    };

    let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
    let values: Vec<f64> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((height, width), values)
        .map_err(|e| ReaderError::ShapeMismatch(format!("{}: {}", path.display(), e)))?;

    Ok((data, metadata))
}

/// Read band 1 of a raster, masking nodata and NaN cells
pub fn read_band_masked(path: impl AsRef<Path>) -> Result<MaskedArray2, ReaderError> {
    let (data, metadata) = read_band(path)?;
    let nodata = metadata.nodata;
    Ok(MaskedArray2::from_data(data, |v| {
        v.is_nan() || nodata.map_or(false, |nd| v == nd)
    }))
}

/// Write a single-band float GeoTIFF
pub fn write_band(
    path: impl AsRef<Path>,
    data: &Array2<f64>,
    geotransform: &[f64; 6],
    nodata: Option<f64>,
) -> Result<(), ReaderError> {
    let (height, width) = data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f64, _>(path.as_ref(), width, height, 1)?;
    dataset.set_geo_transform(geotransform)?;

    let mut band = dataset.rasterband(1)?;
    let mut buffer = Buffer::new((width, height), data.iter().copied().collect());
    band.write((0, 0), (width, height), &mut buffer)?;
    if nodata.is_some() {
        band.set_no_data_value(nodata)?;
    }
    Ok(())
}
