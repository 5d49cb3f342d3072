//! Daily irrigation schedules for the irrigated crop types.
//!
//! Seasons follow Biemans et al. (2016): Kharif runs from monsoon onset to
//! the end of October, Rabi from November to the end of March. The Zaid
//! (April-May) season is not irrigated.

use crate::config::{Config, Constants};
use crate::data_io::{read_band, JulesCoords, NetCDFReader, TimeAxis, write_irrig_schedule};
use crate::grid::flip_lat;
use crate::landcover::{FracArray, LandCover};
use crate::pipeline::{ancil_file, land_fraction_file, veg_frac_file, veg_func_file, PipelineError, Result};
use log::info;
use ndarray::{Array2, Array4, Axis, Ix3, Zip};
use std::path::{Path, PathBuf};

/// Cells irrigated in any year, restricted to land
pub fn irrigated_mask(frac_years: &[FracArray], land: &Array2<f64>) -> Result<Array2<f64>> {
    let mut total = Array2::<f64>::zeros(land.dim());
    for frac in frac_years {
        let filled = frac.filled(0.0);
        let (_, nlat, nlon) = filled.dim();
        if (nlat, nlon) != land.dim() {
            return Err(PipelineError::InvalidData(format!(
                "land cover grid {:?} differs from land mask {:?}",
                (nlat, nlon),
                land.dim()
            )));
        }
        for lc in LandCover::IRRIGATED {
            total += &filled.index_axis(Axis(0), lc.index());
        }
    }
    Ok(Zip::from(&total)
        .and(land)
        .map_collect(|&t, &l| if t > 0.0 { l } else { 0.0 }))
}

/// Irrigation schedules `(day, type, lat, lon)` for days 1..=`ndays`:
/// the plain schedule marks irrigated days with 1, the policy variant marks
/// Kharif days with 1 and other irrigated days with 2.
pub struct Schedules {
    pub schedule: Array4<i32>,
    pub policy: Array4<i32>,
}

/// Build the schedules from the monsoon onset day (south-up, already on the
/// model grid) and the irrigated mask
pub fn build_schedules(
    onset: &Array2<f64>,
    mask: &Array2<f64>,
    ntype: usize,
    ndays: usize,
    constants: &Constants,
) -> Result<Schedules> {
    if onset.dim() != mask.dim() {
        return Err(PipelineError::InvalidData(format!(
            "onset grid {:?} differs from irrigated mask {:?}",
            onset.dim(),
            mask.dim()
        )));
    }
    if ntype <= LandCover::IrrigatedContinuous.index() {
        return Err(PipelineError::InvalidData(format!(
            "{} land cover types cannot hold the irrigated types",
            ntype
        )));
    }

    let (nlat, nlon) = mask.dim();
    let onset = onset * mask;
    let kharif_end = constants.kharif_end_doy as f64;
    let rabi_start = constants.rabi_start_doy as f64;
    let rabi_end = constants.rabi_end_doy as f64;

    let mut schedule = Array4::<i32>::zeros((ndays, ntype, nlat, nlon));
    let mut policy = Array4::<i32>::zeros((ndays, ntype, nlat, nlon));

    let single = LandCover::IrrigatedSingleSeason.index();
    let double = LandCover::IrrigatedDoubleSeason.index();
    let continuous = LandCover::IrrigatedContinuous.index();

    for day in 0..ndays {
        let jd = (day + 1) as f64;
        let rabi = jd >= rabi_start || jd <= rabi_end;
        for j in 0..nlat {
            for i in 0..nlon {
                if mask[[j, i]] == 0.0 {
                    continue;
                }
                // Integer schedules truncate partial land cells to zero
                let scale = mask[[j, i]] as i32;
                let kharif = jd >= onset[[j, i]] && jd <= kharif_end;
                let season_code = |in_kharif: bool| if in_kharif { 1 } else { 2 };

                if kharif {
                    schedule[[day, single, j, i]] = scale;
                    policy[[day, single, j, i]] = scale;
                }
                if kharif || rabi {
                    schedule[[day, double, j, i]] = scale;
                    policy[[day, double, j, i]] = season_code(kharif) * scale;
                }
                schedule[[day, continuous, j, i]] = scale;
                policy[[day, continuous, j, i]] = season_code(kharif) * scale;
            }
        }
    }

    Ok(Schedules { schedule, policy })
}

pub(crate) fn read_jules_frac(path: &Path) -> Result<FracArray> {
    NetCDFReader::open(path)?
        .read_masked("land_cover_lccs")?
        .into_dimensionality::<Ix3>()
        .map_err(PipelineError::InvalidData)
}

/// Build and write the plain and policy irrigation schedules
pub fn write_irrig_schedules(config: &Config) -> Result<(PathBuf, PathBuf)> {
    let c = &config.constants;

    let land = NetCDFReader::open(land_fraction_file(config))?
        .read_masked("lsmask")?
        .into_dimensionality::<ndarray::Ix2>()
        .map_err(PipelineError::InvalidData)?
        .filled(0.0);

    let fracs = c
        .icrisat_years()
        .into_iter()
        .map(|year| read_jules_frac(&veg_frac_file(config, year)))
        .collect::<Result<Vec<_>>>()?;
    let mask = irrigated_mask(&fracs, &land)?;
    info!(
        "{} of {} cells irrigated",
        mask.iter().filter(|&&m| m > 0.0).count(),
        mask.len()
    );

    let (onset, _) = read_band(config.data_dir.join("igp_wet_season_onset.tif"))?;
    let onset = flip_lat(&onset, 0);

    let template = NetCDFReader::open(veg_frac_file(config, c.landuse_year))?;
    let pseudo_level: Vec<i32> = template
        .read_coordinate("pseudo_level")?
        .iter()
        .map(|&v| v as i32)
        .collect();
    let coords = JulesCoords {
        lat: template.read_coordinate("lat")?,
        lon: template.read_coordinate("lon")?,
    };

    let veg_func = NetCDFReader::open(veg_func_file(config, true))?;
    let (units, calendar) = veg_func.time_attributes("tstep")?;
    let time = TimeAxis {
        values: veg_func
            .read_coordinate("tstep")?
            .iter()
            .map(|&v| v.round() as i32)
            .collect(),
        units,
        calendar,
    };
    if time.values.len() != c.schedule_days {
        return Err(PipelineError::InvalidData(format!(
            "expected {} daily steps, found {}",
            c.schedule_days,
            time.values.len()
        )));
    }

    let schedules = build_schedules(&onset, &mask, pseudo_level.len(), c.schedule_days, c)?;

    let plain_path = ancil_file(config, "jules_5pft_w_crops_irrig_schedule.nc");
    let policy_path = ancil_file(config, "jules_5pft_w_crops_irrig_schedule_policy.nc");
    write_irrig_schedule(&plain_path, &coords, &time, &pseudo_level, &schedules.schedule)?;
    write_irrig_schedule(&policy_path, &coords, &time, &pseudo_level, &schedules.policy)?;
    info!("Wrote {} and {}", plain_path.display(), policy_path.display());
    Ok((plain_path, policy_path))
}
