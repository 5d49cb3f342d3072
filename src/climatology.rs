//! Leaf area index and canopy height climatologies.

use crate::config::Config;
use crate::data_io::{
    empty_climatology, read_band_masked, stack_time, write_lai_single, write_veg_climatology,
    MaskedArray, NetCDFReader, ReaderError, VegVariable,
};
use crate::grid::RegionGrid;
use crate::math::interp_periodic;
use crate::parallel::map_parallel;
use crate::pipeline::{PipelineError, Result};
use crate::time_utils::{climatology_times, daily_range, TimeUnits};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use ndarray::{s, Ix4};
use std::path::{Path, PathBuf};

/// Land covers with their own LAI tiles
pub const LAI_TILE_COVERS: [&str; 8] = [
    "combined",
    "natural",
    "rainfed_cropland",
    "irrigated_cropland_1",
    "irrigated_cropland_2",
    "irrigated_cropland_3",
    "irrigated_cropland_c",
    "fallow_cropland",
];

/// Where one vegetated type of the combined climatology comes from
#[derive(Debug, Clone, Copy)]
pub struct VegSource {
    pub name: &'static str,
    pub lai_file: &'static str,
    pub canopy_height_file: &'static str,
    /// Pseudo level index within the source file
    pub source_index: usize,
    /// Pseudo level index within the combined file
    pub jules_index: usize,
}

const NATURAL_LAI: &str = "lai_natural_igp_0.500000Deg.nc";
const NATURAL_CANHT: &str = "canopy_height_natural_igp_0.500000Deg.nc";

/// Crops take the c3 grass level of their no-c4 source files
pub const VEG_SOURCES: [VegSource; 11] = [
    VegSource { name: "tree_broadleaf", lai_file: NATURAL_LAI, canopy_height_file: NATURAL_CANHT, source_index: 0, jules_index: 0 },
    VegSource { name: "tree_needleleaf", lai_file: NATURAL_LAI, canopy_height_file: NATURAL_CANHT, source_index: 1, jules_index: 1 },
    VegSource { name: "c3_grass", lai_file: NATURAL_LAI, canopy_height_file: NATURAL_CANHT, source_index: 2, jules_index: 2 },
    VegSource { name: "c4_grass", lai_file: NATURAL_LAI, canopy_height_file: NATURAL_CANHT, source_index: 3, jules_index: 3 },
    VegSource { name: "shrub", lai_file: NATURAL_LAI, canopy_height_file: NATURAL_CANHT, source_index: 4, jules_index: 4 },
    VegSource {
        name: "fallow",
        lai_file: "lai_fallow_cropland_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_fallow_cropland_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 5,
    },
    VegSource {
        name: "rainfed",
        lai_file: "lai_rainfed_cropland_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_rainfed_cropland_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 6,
    },
    VegSource {
        name: "irrigated_single",
        lai_file: "lai_irrigated_cropland_1_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_irrigated_cropland_1_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 7,
    },
    VegSource {
        name: "irrigated_double",
        lai_file: "lai_irrigated_cropland_2_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_irrigated_cropland_2_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 8,
    },
    VegSource {
        name: "irrigated_triple",
        lai_file: "lai_irrigated_cropland_3_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_irrigated_cropland_3_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 9,
    },
    VegSource {
        name: "irrigated_continuous",
        lai_file: "lai_irrigated_cropland_c_no_c4_crops_igp_0.500000Deg.nc",
        canopy_height_file: "canopy_height_irrigated_cropland_c_no_c4_crops_igp_0.500000Deg.nc",
        source_index: 2,
        jules_index: 10,
    },
];

impl VegSource {
    fn file(&self, kind: VegVariable) -> &'static str {
        match kind {
            VegVariable::LeafAreaIndex => self.lai_file,
            VegVariable::CanopyHeight => self.canopy_height_file,
        }
    }
}

fn lai_dir(config: &Config) -> PathBuf {
    config.data_dir.join("aux").join("lai")
}

fn lai_tile_path(dir: &Path, cover: &str, step: usize) -> PathBuf {
    dir.join(format!("lai_{}_avg_{}_igp_0.041667Deg.tif", cover, step))
}

/// Stack the 36 LAI tiles of each land cover into one netCDF per cover
pub fn write_lai_tiles(config: &Config) -> Result<Vec<PathBuf>> {
    let c = &config.constants;
    let dir = lai_dir(config);
    let grid = RegionGrid::from_geotiff(lai_tile_path(&dir, "natural", 1))?;
    let times = climatology_times(c.climatology_year, c.climatology_steps, c.climatology_step_days);
    info!("Writing LAI climatologies for {} land covers", LAI_TILE_COVERS.len());

    map_parallel(&LAI_TILE_COVERS, |cover| {
        let slices = (1..=c.climatology_steps)
            .map(|step| read_band_masked(lai_tile_path(&dir, cover, step)))
            .collect::<std::result::Result<Vec<_>, ReaderError>>()?;
        let lai = stack_time(slices)?;

        let path = dir.join(format!("lai_{}_igp.nc", cover));
        debug!("Writing {}", path.display());
        write_lai_single(&path, &grid, &times, &lai, c)?;
        Ok(path)
    })
}

/// Combine per-source climatologies into one `(time, type, lat, lon)` array.
/// Levels without a source stay missing.
pub fn combine_sources(
    source_dir: &Path,
    kind: VegVariable,
    nt: usize,
    grid: &RegionGrid,
) -> Result<MaskedArray<Ix4>> {
    let (nlat, nlon) = grid.shape();
    let mut combined = empty_climatology(nt, VEG_SOURCES.len(), nlat, nlon);

    for source in VEG_SOURCES.iter() {
        let path = source_dir.join(source.file(kind));
        let values = NetCDFReader::open(&path)?
            .read_masked(kind.name())?
            .into_dimensionality::<Ix4>()
            .map_err(PipelineError::InvalidData)?;

        let (src_nt, src_nveg, src_nlat, src_nlon) = values.data.dim();
        if src_nt < nt || source.source_index >= src_nveg || (src_nlat, src_nlon) != (nlat, nlon) {
            return Err(PipelineError::InvalidData(format!(
                "{} has shape {:?}, expected at least ({}, {}, {}, {})",
                path.display(),
                values.shape(),
                nt,
                source.source_index + 1,
                nlat,
                nlon
            )));
        }

        combined
            .data
            .slice_mut(s![.., source.jules_index, .., ..])
            .assign(&values.data.slice(s![..nt, source.source_index, .., ..]));
        combined
            .mask
            .slice_mut(s![.., source.jules_index, .., ..])
            .assign(&values.mask.slice(s![..nt, source.source_index, .., ..]));
    }

    Ok(combined)
}

/// Write the combined LAI and canopy height ANTS files
pub fn write_veg_climatologies(config: &Config, lai_path: &Path, canopy_height_path: &Path) -> Result<()> {
    let c = &config.constants;
    let grid = RegionGrid::from_geotiff(&config.land_frac_file)?;
    let times = climatology_times(c.climatology_year, c.climatology_steps, c.climatology_step_days);
    let source_dir = config.netcdf_dir();

    for (kind, path) in [
        (VegVariable::LeafAreaIndex, lai_path),
        (VegVariable::CanopyHeight, canopy_height_path),
    ] {
        info!("Writing {} climatology to {}", kind.name(), path.display());
        let combined = combine_sources(&source_dir, kind, times.len(), &grid)?;
        write_veg_climatology(path, &grid, kind, &times, &combined, c)?;
    }
    Ok(())
}

/// Daily timestamps and the climatology interpolated onto them
pub struct DailySeries {
    pub times: Vec<NaiveDateTime>,
    pub values: MaskedArray<Ix4>,
}

/// Interpolate a periodic climatology `(time, type, lat, lon)` to daily
/// midnight steps from `start` to `end` inclusive. `times` are offsets in
/// `units`; the year is taken to repeat every 365 days.
pub fn interpolate_daily(
    times: &[f64],
    units: &TimeUnits,
    values: &MaskedArray<Ix4>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DailySeries> {
    let year = units.from_days(365.0);

    let daily = daily_range(start, end);
    let targets: Vec<f64> = daily.iter().map(|t| units.encode(t)).collect();
    let (data, mask) = interp_periodic(times, &values.data, &values.mask, year, &targets)
        .map_err(PipelineError::InvalidData)?;

    Ok(DailySeries {
        times: daily,
        values: MaskedArray { data, mask },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_veg_sources_cover_each_level_once() {
        let mut levels: Vec<usize> = VEG_SOURCES.iter().map(|s| s.jules_index).collect();
        levels.sort();
        assert_eq!(levels, (0..11).collect::<Vec<_>>());
        assert!(VEG_SOURCES.iter().skip(5).all(|s| s.source_index == 2));
    }

    #[test]
    fn test_interpolate_daily_hours() {
        let units: TimeUnits = "hours since 1970-01-01 00:00:00".parse().unwrap();
        let clim = climatology_times(2015, 36, 10);
        let times: Vec<f64> = clim.iter().map(|t| units.encode(t)).collect();

        // Constant field interpolates to itself everywhere
        let values = MaskedArray::unmasked(Array4::from_elem((36, 2, 1, 1), 4.0));
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        let series = interpolate_daily(&times, &units, &values, start, end).unwrap();

        assert_eq!(series.times.len(), 366);
        assert_eq!(series.values.data.dim(), (366, 2, 1, 1));
        assert!(series.values.data.iter().all(|&v| (v - 4.0).abs() < 1e-12));
        assert_eq!(series.values.count_missing(), 0);
    }

    #[test]
    fn test_interpolate_daily_linear_ramp() {
        let units: TimeUnits = "days since 2015-01-01".parse().unwrap();
        let clim = climatology_times(2015, 36, 10);
        let times: Vec<f64> = clim.iter().map(|t| units.encode(t)).collect();

        let mut values = MaskedArray::unmasked(Array4::zeros((36, 1, 1, 1)));
        for t in 0..36 {
            values.data[[t, 0, 0, 0]] = t as f64;
        }
        let start = NaiveDate::from_ymd_opt(2015, 1, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2015, 1, 20).unwrap();
        let series = interpolate_daily(&times, &units, &values, start, end).unwrap();

        assert_eq!(series.values.data[[0, 0, 0, 0]], 0.0);
        assert!((series.values.data[[5, 0, 0, 0]] - 0.5).abs() < 1e-12);
        assert_eq!(series.values.data[[10, 0, 0, 0]], 1.0);
    }
}
