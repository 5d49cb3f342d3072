//! Adjust baseline land cover fractions against ICRISAT cropland statistics.
//!
//! Within the part of each cell covered by ICRISAT, agricultural types are
//! replaced by the ICRISAT areas. Urban, water and ice keep their share, and
//! the natural covers grow or shrink to make room. Outside the ICRISAT
//! coverage the baseline is kept as is.

use super::{check_sum_to_one, merge_irrigation_seasons, normalise, FracArray, FracError, LandCover};
use crate::data_io::MaskedArray2;
use ndarray::{Array1, Array3, ArrayView1, ArrayViewMut1, Axis, Zip};

const NTYPE: usize = 15;

/// ICRISAT crop categories, in the order their rasters are stacked
pub const ICRISAT_CATEGORIES: [(&str, LandCover); 5] = [
    ("rainfed", LandCover::Rainfed),
    ("irrigated_single", LandCover::IrrigatedSingleSeason),
    ("irrigated_double", LandCover::IrrigatedDoubleSeason),
    ("irrigated_triple", LandCover::IrrigatedTripleSeason),
    ("irrigated_continuous", LandCover::IrrigatedContinuous),
];

/// ICRISAT inputs for one year
#[derive(Debug, Clone)]
pub struct IcrisatYear {
    /// Share of each cell covered by ICRISAT districts
    pub india_frac: MaskedArray2,
    /// Cell fractions per category, ordered as [`ICRISAT_CATEGORIES`]
    pub targets: Vec<MaskedArray2>,
}

fn sum_of(values: &[f64], covers: &[LandCover]) -> f64 {
    covers.iter().map(|lc| values[lc.index()]).sum()
}

/// Reconcile a single cell. `base` holds the 15 baseline fractions, `targets`
/// the five ICRISAT fractions and `india` the ICRISAT coverage of the cell.
pub fn reconcile_cell(base: ArrayView1<f64>, targets: ArrayView1<f64>, india: f64, mut out: ArrayViewMut1<f64>) {
    let target_sum: f64 = targets.sum();

    let inside: Vec<f64> = base.iter().map(|&f| f * india).collect();
    let inside_sum: f64 = inside.iter().sum();
    let mut rel: Vec<f64> = inside
        .iter()
        .map(|&v| if inside_sum > 0.0 { v / inside_sum } else { 0.0 })
        .collect();
    let rel_sum: f64 = rel.iter().sum();

    let fixed_sum = sum_of(&rel, &LandCover::CANNOT_VARY);
    let max_agri = (rel_sum - fixed_sum).clamp(0.0, 1.0);
    let target_sum_adj = target_sum.clamp(0.0, max_agri);
    let remaining = (rel_sum - fixed_sum - target_sum).clamp(0.0, 1.0);

    // Fallow becomes natural grass, split like the existing grass
    let (c3, c4, fallow) = (
        LandCover::C3Grass.index(),
        LandCover::C4Grass.index(),
        LandCover::Fallow.index(),
    );
    let grass_sum = rel[c3] + rel[c4];
    let c3_share = if grass_sum > 0.0 { rel[c3] / grass_sum } else { 1.0 };
    rel[c3] += rel[fallow] * c3_share;
    rel[c4] += rel[fallow] * (1.0 - c3_share);
    rel[fallow] = 0.0;

    let agri_sum = sum_of(&rel, &LandCover::AGRICULTURAL);
    let vary_sum = sum_of(&rel, &LandCover::CAN_VARY);

    let mut adjusted = [0.0f64; NTYPE];
    if target_sum <= agri_sum {
        // Less cropland: natural covers keep their area, grass fills the gap
        for lc in LandCover::CAN_VARY {
            adjusted[lc.index()] = rel[lc.index()];
        }
        let diff = remaining - vary_sum;
        adjusted[c3] += diff * c3_share;
        adjusted[c4] += diff * (1.0 - c3_share);
    } else if vary_sum > 0.0 {
        // More cropland: natural covers shrink in proportion
        for lc in LandCover::CAN_VARY {
            adjusted[lc.index()] = rel[lc.index()] / vary_sum * remaining;
        }
    } else {
        adjusted[c3] = remaining * c3_share;
        adjusted[c4] = remaining * (1.0 - c3_share);
    }

    for lc in LandCover::CANNOT_VARY {
        adjusted[lc.index()] = rel[lc.index()];
    }

    for (k, (_, lc)) in ICRISAT_CATEGORIES.iter().enumerate() {
        let share = if target_sum > 0.0 { targets[k] / target_sum } else { 0.0 };
        adjusted[lc.index()] = share * target_sum_adj;
    }

    for k in 0..NTYPE {
        out[k] = base[k] * (1.0 - india) + adjusted[k] * india;
    }
}

/// Reconcile a full baseline fraction array with one year of ICRISAT data.
/// Missing ICRISAT values count as zero.
pub fn reconcile(base: &FracArray, icrisat: &IcrisatYear) -> Result<FracArray, FracError> {
    let (ntype, nlat, nlon) = base.data.dim();
    if ntype != NTYPE {
        return Err(FracError::TypeCount {
            expected: NTYPE,
            found: ntype,
        });
    }
    if icrisat.targets.len() != ICRISAT_CATEGORIES.len() {
        return Err(FracError::TypeCount {
            expected: ICRISAT_CATEGORIES.len(),
            found: icrisat.targets.len(),
        });
    }
    let india = icrisat.india_frac.filled(0.0);
    if india.dim() != (nlat, nlon) {
        return Err(FracError::ShapeMismatch(format!(
            "ICRISAT coverage {:?} vs land cover {:?}",
            india.dim(),
            (nlat, nlon)
        )));
    }

    let mut targets = Array3::<f64>::zeros((ICRISAT_CATEGORIES.len(), nlat, nlon));
    for (k, target) in icrisat.targets.iter().enumerate() {
        let filled = target.filled(0.0);
        if filled.dim() != (nlat, nlon) {
            return Err(FracError::ShapeMismatch(format!(
                "ICRISAT {} {:?} vs land cover {:?}",
                ICRISAT_CATEGORIES[k].0,
                filled.dim(),
                (nlat, nlon)
            )));
        }
        targets.index_axis_mut(Axis(0), k).assign(&filled);
    }

    let baseline = base.filled(0.0);
    let mut updated = Array3::<f64>::zeros((ntype, nlat, nlon));
    Zip::from(updated.lanes_mut(Axis(0)))
        .and(baseline.lanes(Axis(0)))
        .and(targets.lanes(Axis(0)))
        .and(&india)
        .par_for_each(|out, f, t, &india| reconcile_cell(f, t, india, out));

    merge_irrigation_seasons(&mut updated);

    let mut result = FracArray {
        data: updated,
        mask: base.mask.clone(),
    };
    check_sum_to_one(&result)?;
    normalise(&mut result.data);
    Ok(result)
}

/// Cell totals of the ICRISAT categories, for logging
pub fn cropland_total(icrisat: &IcrisatYear) -> Array1<f64> {
    icrisat
        .targets
        .iter()
        .map(|t| t.filled(0.0).sum())
        .collect()
}
