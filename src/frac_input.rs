//! Land cover fraction inputs: the per-land-use and with-crops ANTS files
//! built from the ESA CCI rasters, and their yearly ICRISAT adjustment.

use crate::config::Config;
use crate::data_io::{overwrite_variable, read_band, read_band_masked, write_frac_ants, MaskedArray, MaskedArray2, NetCDFReader};
use crate::grid::RegionGrid;
use crate::landcover::{
    build_frac, cropland_total, reconcile, remove_c4_crops, FracArray, IcrisatYear, LandUse, PftScheme,
    ICRISAT_CATEGORIES,
};
use crate::parallel::{for_each_year, map_parallel};
use crate::pipeline::{adjusted_frac_file, baseline_frac_file, copy_file, env_path, PipelineError, Result};
use log::{debug, info};
use ndarray::Ix3;
use std::path::PathBuf;

/// Raster holding the fraction of `name` in `year`. `LC_<NAME>_<YEAR>_FN`
/// overrides the default location.
pub fn input_raster(config: &Config, name: &str, year: i32) -> PathBuf {
    env_path(
        &format!("LC_{}_{}_FN", name.to_uppercase(), year),
        config.geotiff_dir().join(format!(
            "jamr_esa_cci_lc_frac_{}_{}_{}.tif",
            name, year, config.region
        )),
    )
}

/// `jules_frac[_<landuse>][_no_c4_crops]_<scheme>_ants_<year>_<product>_<region>.nc`
pub fn frac_file_name(config: &Config, landuse: Option<LandUse>, no_c4: bool, scheme: PftScheme, year: i32) -> String {
    let mut name = String::from("jules_frac");
    if let Some(lu) = landuse {
        name.push('_');
        name.push_str(lu.name());
    }
    if no_c4 {
        name.push_str("_no_c4_crops");
    }
    format!("{}_{}_ants_{}_{}", name, scheme.tag(), year, config.file_suffix())
}

fn schemes(config: &Config) -> Vec<PftScheme> {
    let mut out = Vec::new();
    if config.five_pft {
        out.push(PftScheme::FivePft);
    }
    if config.nine_pft {
        out.push(PftScheme::NinePft);
    }
    out
}

/// Read the named rasters and build normalised fractions on `grid`
pub fn load_frac(config: &Config, names: &[String], year: i32, grid: &RegionGrid) -> Result<FracArray> {
    let mut layers = Vec::with_capacity(names.len());
    for name in names {
        let path = input_raster(config, name, year);
        debug!("Reading {}", path.display());
        let (data, _) = read_band(&path)?;
        if data.dim() != grid.shape() {
            return Err(PipelineError::InvalidData(format!(
                "{} is {:?}, target grid is {:?}",
                path.display(),
                data.dim(),
                grid.shape()
            )));
        }
        layers.push(MaskedArray::unmasked(data));
    }
    Ok(build_frac(&layers, &grid.land_frac)?)
}

/// Per-land-use fractions for each enabled scheme. Cropland uses also get a
/// copy with all crops treated as c3, and the rainfed files double as the
/// fallow ones.
pub fn write_landuse_fracs(config: &Config) -> Result<Vec<PathBuf>> {
    let grid = RegionGrid::from_geotiff(&config.land_frac_file)?;
    let year = config.constants.landuse_year;
    let dir = config.netcdf_dir();
    std::fs::create_dir_all(&dir)?;

    let tasks: Vec<(LandUse, PftScheme)> = LandUse::MAPPED
        .iter()
        .flat_map(|&lu| schemes(config).into_iter().map(move |s| (lu, s)))
        .collect();
    info!("Writing {} land use fraction files", tasks.len());

    let written = map_parallel(&tasks, |&(landuse, scheme)| {
        let frac = load_frac(config, &scheme.landuse_names(landuse), year, &grid)?;
        let path = dir.join(frac_file_name(config, Some(landuse), false, scheme, year));
        write_frac_ants(&path, &frac, &grid, &config.constants)?;
        let mut paths = vec![path.clone()];

        if landuse.is_cropland() {
            let mut no_c4 = frac;
            remove_c4_crops(&mut no_c4, scheme);
            let no_c4_path = dir.join(frac_file_name(config, Some(landuse), true, scheme, year));
            write_frac_ants(&no_c4_path, &no_c4, &grid, &config.constants)?;
            paths.push(no_c4_path.clone());

            if landuse == LandUse::Rainfed {
                for (src, c3_only) in [(&path, false), (&no_c4_path, true)] {
                    let fallow = dir.join(frac_file_name(config, Some(LandUse::Fallow), c3_only, scheme, year));
                    copy_file(src, &fallow)?;
                    paths.push(fallow);
                }
            }
        }
        Ok(paths)
    })?;

    Ok(written.into_iter().flatten().collect())
}

/// Fractions with explicit crop types for each enabled scheme
pub fn write_crop_fracs(config: &Config) -> Result<Vec<PathBuf>> {
    let grid = RegionGrid::from_geotiff(&config.land_frac_file)?;
    let year = config.constants.landuse_year;
    let dir = config.netcdf_dir();
    std::fs::create_dir_all(&dir)?;

    map_parallel(&schemes(config), |&scheme| {
        let names = scheme.with_crops_names();
        info!("Writing {} {} land cover types", names.len(), scheme.tag());
        let frac = load_frac(config, &names, year, &grid)?;
        let path = dir.join(frac_file_name(config, None, false, scheme, year));
        write_frac_ants(&path, &frac, &grid, &config.constants)?;
        Ok(path)
    })
}

fn icrisat_raster(config: &Config, name: &str, year: i32) -> PathBuf {
    config
        .irrigated_area_dir()
        .join(format!("icrisat_{}_frac_{}_india_0.500000Deg.tif", name, year))
}

/// ICRISAT cropland fractions of one year
pub fn read_icrisat_year(config: &Config, year: i32, india_frac: &MaskedArray2) -> Result<IcrisatYear> {
    let targets = ICRISAT_CATEGORIES
        .iter()
        .map(|(name, _)| read_band_masked(icrisat_raster(config, name, year)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(IcrisatYear {
        india_frac: india_frac.clone(),
        targets,
    })
}

/// Reconcile the baseline 5-PFT fractions with every ICRISAT year, writing
/// one adjusted copy of the baseline file per year
pub fn adjust_frac(config: &Config) -> Result<Vec<PathBuf>> {
    let base_path = baseline_frac_file(config, config.constants.landuse_year);
    info!("Adjusting {} with ICRISAT", base_path.display());
    let base: FracArray = NetCDFReader::open(&base_path)?
        .read_masked("land_cover_lccs")?
        .into_dimensionality::<Ix3>()
        .map_err(PipelineError::InvalidData)?;
    let india = read_band_masked(config.irrigated_area_dir().join("icrisat_india_frac.tif"))?;

    for_each_year(&config.constants.icrisat_years(), |year| {
        let icrisat = read_icrisat_year(config, year, &india)?;
        debug!("{} ICRISAT category totals: {:?}", year, cropland_total(&icrisat).to_vec());
        let adjusted = reconcile(&base, &icrisat)?;

        let dst = adjusted_frac_file(config, year);
        copy_file(&base_path, &dst)?;
        overwrite_variable(&dst, "land_cover_lccs", &adjusted)?;
        Ok(dst)
    })
}
