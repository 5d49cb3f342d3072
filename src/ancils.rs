//! WFDEI ancillaries on the model grid: regional subsets of the global
//! soil, topography and vegetation files plus JULES-layout vegetation
//! inputs derived from the ANTS files.

use crate::config::Config;
use crate::data_io::{
    multiply_by, read_band, subset_file, write_frac_jules, write_veg_func_jules, zero_where, BoundingBox,
    JulesCoords, MaskedArray, NetCDFReader, SubsetOptions, TimeAxis, VegFunc, VegVariable,
};
use crate::climatology::interpolate_daily;
use crate::grid::flip_lat;
use crate::irrigation::read_jules_frac;
use crate::landcover::FracArray;
use crate::parallel::for_each_year;
use crate::pipeline::{
    adjusted_frac_file, ancil_file, copy_file, env_path, land_fraction_file, veg_frac_file,
    veg_func_file, PipelineError, Result,
};
use chrono::NaiveDate;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis, Ix3, Ix4};
use std::path::{Path, PathBuf};

/// How a global WFDEI ancillary is brought onto the regional grid
#[derive(Debug, Clone, Copy)]
pub struct WfdeiAncil {
    pub file: &'static str,
    /// Name given to the `z` dimension, if the file has one
    pub z_dim: Option<&'static str>,
    /// File already carries `lat`/`lon` dimensions and coordinates
    pub has_lat_lon: bool,
}

pub const WFDEI_ANCILS: [WfdeiAncil; 8] = [
    WfdeiAncil { file: "topoidx_WFDEI_0p5_2D_global.nc", z_dim: None, has_lat_lon: false },
    WfdeiAncil { file: "WFDEI-long-lat-2d.nc", z_dim: None, has_lat_lon: false },
    WfdeiAncil { file: LAND_FRACTION, z_dim: None, has_lat_lon: false },
    WfdeiAncil { file: "qrparm.veg.frac2d.nc", z_dim: Some("dim0"), has_lat_lon: false },
    WfdeiAncil { file: "qrparm.veg.func2d.nc", z_dim: Some("dim1"), has_lat_lon: false },
    WfdeiAncil { file: SOIL_CLASS3, z_dim: None, has_lat_lon: false },
    WfdeiAncil { file: SOIL_ALBEDO, z_dim: None, has_lat_lon: true },
    WfdeiAncil { file: SOIL_COSBY, z_dim: None, has_lat_lon: false },
];

const LAND_FRACTION: &str = "WFD-EI-LandFraction2d.nc";
const SOIL_CLASS3: &str = "qrparm.soil_HWSD_class3_van_genuchten2d.nc";
const SOIL_ALBEDO: &str = "qrparm.soil_HWSD_class3_van_genuchtenNew_NewSoilAlbedo-rfu-2D-LatLon-grid.nc";
const SOIL_COSBY: &str = "qrparm.soil_HWSD_cont_cosby2d.nc";

/// Soil files and the saturated water content variable each holds
const TH_SAT_VARIABLES: [(&str, &str); 3] = [(SOIL_CLASS3, "field332"), (SOIL_ALBEDO, "sm_sat"), (SOIL_COSBY, "field332")];

impl WfdeiAncil {
    fn options(&self, lat: &Array1<f64>, lon: &Array1<f64>, bbox: BoundingBox) -> SubsetOptions {
        let mut options = SubsetOptions::default().crop(bbox);
        if !self.has_lat_lon {
            options = options.rename("x", "lon").rename("y", "lat").with_coords(lat.clone(), lon.clone());
        }
        if let Some(z) = self.z_dim {
            options = options.rename("z", z);
        }
        options
    }
}

/// `<stem>_<suffix>.nc`
fn regional_name(file: &str, suffix: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    format!("{}_{}.nc", stem, suffix)
}

fn region_bbox(config: &Config) -> BoundingBox {
    let c = &config.constants;
    BoundingBox {
        lon_min: c.lon_min,
        lon_max: c.lon_max,
        lat_min: c.lat_min,
        lat_max: c.lat_max,
    }
}

/// Global WFDEI ancillaries directory
pub fn wfdei_ancil_dir(config: &Config) -> PathBuf {
    env_path("WFDEI_ANCIL_DIR", config.raw_dir.join("wfdei_ancils"))
}

/// Forcing file whose `lat`/`lon` define the WFDEI grid
pub fn wfdei_coords_file(config: &Config) -> PathBuf {
    env_path(
        "WFDEI_LATLON_FN",
        config.raw_dir.join("WFDEI").join("LWdown_WFDEI_197901.nc"),
    )
}

/// Subset every global ancillary to the region. The land fraction is kept
/// as a `_south_asia` file and restricted to the river basins in the
/// regional one.
pub fn select_wfdei(config: &Config) -> Result<Vec<PathBuf>> {
    config.ensure_out_dir()?;
    let src_dir = wfdei_ancil_dir(config);
    let coords = NetCDFReader::open(wfdei_coords_file(config))?;
    let lat = coords.read_coordinate("lat")?;
    let lon = coords.read_coordinate("lon")?;
    let bbox = region_bbox(config);

    let mut written = Vec::with_capacity(WFDEI_ANCILS.len());
    for ancil in WFDEI_ANCILS.iter() {
        let suffix = if ancil.file == LAND_FRACTION { "south_asia" } else { config.region.as_str() };
        let dst = ancil_file(config, &regional_name(ancil.file, suffix));
        info!("Subsetting {}", ancil.file);
        subset_file(&src_dir.join(ancil.file), &dst, &ancil.options(&lat, &lon, bbox))?;
        written.push(dst);
    }

    let south_asia = ancil_file(config, &regional_name(LAND_FRACTION, "south_asia"));
    let basin_path = land_fraction_file(config);
    let (basins, _) = read_band(config.data_dir.join(format!("{}_basins.tif", config.region)))?;
    let basins = flip_lat(&basins, 0);
    copy_file(&south_asia, &basin_path)?;
    let changed = multiply_by(&basin_path, "lsmask", &basins)?;
    debug!("{} land fraction values outside the basins", changed);
    written.push(basin_path);

    Ok(written)
}

fn read_climatology(reader: &NetCDFReader, kind: VegVariable) -> Result<MaskedArray<Ix4>> {
    let lat_axis = reader.axis_of(kind.name(), "latitude")?;
    let mut values = reader
        .read_masked(kind.name())?
        .into_dimensionality::<Ix4>()
        .map_err(PipelineError::InvalidData)?;
    values.flip_axis(Axis(lat_axis));
    Ok(values)
}

fn jules_coords(reader: &NetCDFReader) -> Result<JulesCoords> {
    let mut lat = reader.read_coordinate("latitude")?;
    lat.invert_axis(Axis(0));
    Ok(JulesCoords {
        lat: lat.as_standard_layout().to_owned(),
        lon: reader.read_coordinate("longitude")?,
    })
}

/// Convert the prescribed LAI and canopy height climatologies to the JULES
/// layout, then interpolate them to daily steps over the climatology year.
pub fn write_veg_func(config: &Config, lai_path: &Path, canopy_height_path: &Path) -> Result<(PathBuf, PathBuf)> {
    config.ensure_out_dir()?;
    let canht = NetCDFReader::open(canopy_height_path)?;
    let lai = NetCDFReader::open(lai_path)?;

    let coords = jules_coords(&canht)?;
    let pseudo_level: Vec<i32> = canht
        .read_coordinate("pseudo_level")?
        .iter()
        .map(|&v| v as i32)
        .collect();
    let (units_str, calendar) = canht.time_attributes("time")?;
    let units = canht.time_units("time")?;
    let times = canht.read_coordinate("time")?.to_vec();

    let canopy_height = read_climatology(&canht, VegVariable::CanopyHeight)?;
    let leaf_area_index = read_climatology(&lai, VegVariable::LeafAreaIndex)?;

    let time = TimeAxis {
        values: times.iter().map(|&v| v.round() as i32).collect(),
        units: units_str.clone(),
        calendar: calendar.clone(),
    };
    let path = veg_func_file(config, false);
    info!("Writing {}", path.display());
    write_veg_func_jules(
        &path,
        &coords,
        &VegFunc {
            time: &time,
            pseudo_level: &pseudo_level,
            canopy_height: &canopy_height,
            leaf_area_index: &leaf_area_index,
        },
    )?;

    let year = config.constants.climatology_year;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| PipelineError::Config(format!("Invalid climatology year {}", year)))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
        .ok_or_else(|| PipelineError::Config(format!("Invalid climatology year {}", year)))?;

    let canopy_daily = interpolate_daily(&times, &units, &canopy_height, start, end)?;
    let lai_daily = interpolate_daily(&times, &units, &leaf_area_index, start, end)?;
    let daily_time = TimeAxis {
        values: canopy_daily
            .times
            .iter()
            .map(|t| units.encode(t).round() as i32)
            .collect(),
        units: units_str,
        calendar,
    };

    let interp_path = veg_func_file(config, true);
    info!("Writing {} daily steps to {}", daily_time.values.len(), interp_path.display());
    write_veg_func_jules(
        &interp_path,
        &coords,
        &VegFunc {
            time: &daily_time,
            pseudo_level: &pseudo_level,
            canopy_height: &canopy_daily.values,
            leaf_area_index: &lai_daily.values,
        },
    )?;

    Ok((path, interp_path))
}

/// Convert one adjusted ANTS fraction file to the JULES layout
pub fn convert_frac(src: &Path, dst: &Path) -> Result<()> {
    let reader = NetCDFReader::open(src)?;
    let lat_axis = reader.axis_of("land_cover_lccs", "latitude")?;
    let mut frac: FracArray = reader
        .read_masked("land_cover_lccs")?
        .into_dimensionality::<Ix3>()
        .map_err(PipelineError::InvalidData)?;
    frac.flip_axis(Axis(lat_axis));
    write_frac_jules(dst, &frac, &jules_coords(&reader)?)?;
    Ok(())
}

/// JULES fractions for every ICRISAT year
pub fn write_veg_frac_years(config: &Config) -> Result<Vec<PathBuf>> {
    config.ensure_out_dir()?;
    for_each_year(&config.constants.icrisat_years(), |year| {
        let dst = veg_frac_file(config, year);
        convert_frac(&adjusted_frac_file(config, year), &dst)?;
        Ok(dst)
    })
}

/// Cells whose snow/ice fraction is positive; missing counts as no ice
pub fn ice_cells(frac: &FracArray) -> Array2<bool> {
    let last = frac.data.len_of(Axis(0)) - 1;
    frac.filled(0.0)
        .index_axis(Axis(0), last)
        .mapv(|v| v > 0.0)
}

/// Zero the saturated soil water content on land ice
pub fn zero_th_sat_on_ice(config: &Config) -> Result<usize> {
    let frac = read_jules_frac(&veg_frac_file(config, config.constants.landuse_year))?;
    let ice = ice_cells(&frac);
    info!("{} land ice cells", ice.iter().filter(|&&i| i).count());

    let mut total = 0;
    for (file, var) in TH_SAT_VARIABLES {
        let path = ancil_file(config, &regional_name(file, &config.region));
        total += zero_where(&path, var, &ice)?;
    }
    Ok(total)
}

/// Run every ancillary step in order
pub fn run_ancils(config: &Config, lai_path: &Path, canopy_height_path: &Path) -> Result<()> {
    select_wfdei(config)?;
    write_veg_func(config, lai_path, canopy_height_path)?;
    write_veg_frac_years(config)?;
    let zeroed = zero_th_sat_on_ice(config)?;
    info!("Zeroed {} saturated water content values on ice", zeroed);
    Ok(())
}
