use super::{FracArray, FracError, LandCover, PftScheme};
use crate::data_io::{stack_masked, MaskedArray2};
use log::warn;
use ndarray::{Array2, Array3, Axis, Zip};

/// Ice fraction above which a cell is treated as fully glaciated
pub const ICE_THRESHOLD: f64 = 0.5;

/// Absolute and relative tolerance of the sum-to-one check
const ATOL: f64 = 1e-8;
const RTOL: f64 = 1e-5;

fn type_sum(frac: &Array3<f64>) -> Array2<f64> {
    frac.sum_axis(Axis(0))
}

/// Divide each cell by its total where positive, otherwise zero the cell.
/// A cell with any NaN has a NaN total and is zeroed.
pub fn normalise(frac: &mut Array3<f64>) {
    let total = type_sum(frac);
    for mut layer in frac.axis_iter_mut(Axis(0)) {
        Zip::from(&mut layer).and(&total).for_each(|v, &s| {
            *v = if s.is_finite() && s > 0.0 { *v / s } else { 0.0 };
        });
    }
}

/// Glaciated cells become pure ice; elsewhere ice is moved into bare soil.
/// Snow/ice must be the last type and bare soil the one before it.
pub fn consolidate_ice(frac: &mut Array3<f64>) -> Result<(), FracError> {
    let ntype = frac.len_of(Axis(0));
    if ntype < 2 {
        return Err(FracError::TypeCount {
            expected: 2,
            found: ntype,
        });
    }
    let (ice_idx, soil_idx) = (ntype - 1, ntype - 2);
    let ice_orig = frac.index_axis(Axis(0), ice_idx).to_owned();
    let soil_orig = frac.index_axis(Axis(0), soil_idx).to_owned();

    for ((j, i), &ice) in ice_orig.indexed_iter() {
        let glaciated = ice > ICE_THRESHOLD;
        for k in 0..ntype {
            frac[[k, j, i]] = if glaciated { 0.0 } else { frac[[k, j, i]] };
        }
        if glaciated {
            frac[[ice_idx, j, i]] = 1.0;
        } else {
            frac[[ice_idx, j, i]] = 0.0;
            frac[[soil_idx, j, i]] = soil_orig[[j, i]] + ice;
        }
    }

    normalise(frac);
    Ok(())
}

/// Combine per-type rasters into a masked fraction array.
/// Cells with zero land fraction are masked.
pub fn build_frac(layers: &[MaskedArray2], land_frac: &Array2<f64>) -> Result<FracArray, FracError> {
    let stacked = stack_masked(layers).map_err(FracError::ShapeMismatch)?;
    let (_, nlat, nlon) = stacked.data.dim();
    if land_frac.dim() != (nlat, nlon) {
        return Err(FracError::ShapeMismatch(format!(
            "land fraction {:?} vs cover {:?}",
            land_frac.dim(),
            (nlat, nlon)
        )));
    }

    // Input rasters are read unmasked; cells with missing cover end up empty
    let mut data = stacked.data;
    normalise(&mut data);
    consolidate_ice(&mut data)?;

    let mask = Array3::from_shape_fn(data.raw_dim(), |(_, j, i)| land_frac[[j, i]] == 0.0);
    Ok(FracArray { data, mask })
}

/// Treat all crops as c3 by moving c4 grass into c3 grass
pub fn remove_c4_crops(frac: &mut FracArray, scheme: PftScheme) {
    let (c3, c4) = scheme.grass_indices();
    let c4_frac = frac.data.index_axis(Axis(0), c4).to_owned();
    frac.data.index_axis_mut(Axis(0), c3).zip_mut_with(&c4_frac, |a, &b| *a += b);
    frac.data.index_axis_mut(Axis(0), c4).fill(0.0);
}

/// Fold triple-season and continuous irrigation into double-season
pub fn merge_irrigation_seasons(frac: &mut Array3<f64>) {
    let double = LandCover::IrrigatedDoubleSeason.index();
    for lc in [LandCover::IrrigatedTripleSeason, LandCover::IrrigatedContinuous] {
        let extra = frac.index_axis(Axis(0), lc.index()).to_owned();
        frac.index_axis_mut(Axis(0), double)
            .zip_mut_with(&extra, |a, &b| *a += b);
        frac.index_axis_mut(Axis(0), lc.index()).fill(0.0);
    }
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ATOL + RTOL * b.abs()
}

/// Every unmasked cell holding any cover must sum to one
pub fn check_sum_to_one(frac: &FracArray) -> Result<(), FracError> {
    let total = type_sum(&frac.data);
    let masked = frac.mask.map_axis(Axis(0), |lane| lane.iter().any(|&m| m));

    let mut bad = 0usize;
    let mut empty = 0usize;
    let mut worst = 1.0f64;
    Zip::from(&total).and(&masked).for_each(|&s, &m| {
        if m {
            return;
        }
        if s == 0.0 {
            empty += 1;
        } else if !is_close(s, 1.0) {
            bad += 1;
            if (s - 1.0).abs() > (worst - 1.0).abs() {
                worst = s;
            }
        }
    });

    if empty > 0 {
        warn!("{} land cells have no land cover", empty);
    }
    if bad > 0 {
        return Err(FracError::SumNotOne { cells: bad, worst });
    }
    Ok(())
}
