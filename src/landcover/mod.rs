//! JULES land cover classification and fractional cover operations.

pub mod frac;
pub mod reconcile;

pub use frac::*;
pub use reconcile::*;

use crate::data_io::MaskedArray;
use ndarray::Ix3;
use std::fmt;
use thiserror::Error;

/// Land cover fractions laid out as `(type, lat, lon)`
pub type FracArray = MaskedArray<Ix3>;

#[derive(Error, Debug)]
pub enum FracError {
    #[error("{cells} cells do not sum to one (worst sum {worst})")]
    SumNotOne { cells: usize, worst: f64 },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Expected {expected} land cover types, found {found}")]
    TypeCount { expected: usize, found: usize },
}

/// The 15 types of the 5-PFT scheme with crops, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandCover {
    TreeBroadleaf,
    TreeNeedleleaf,
    C3Grass,
    C4Grass,
    Shrub,
    Rainfed,
    /// Kharif only
    IrrigatedSingleSeason,
    /// Kharif and Rabi
    IrrigatedDoubleSeason,
    /// Kharif, Rabi and Zaid
    IrrigatedTripleSeason,
    IrrigatedContinuous,
    Fallow,
    Urban,
    Water,
    BareSoil,
    SnowIce,
}

impl LandCover {
    pub const ALL: [LandCover; 15] = [
        LandCover::TreeBroadleaf,
        LandCover::TreeNeedleleaf,
        LandCover::C3Grass,
        LandCover::C4Grass,
        LandCover::Shrub,
        LandCover::Rainfed,
        LandCover::IrrigatedSingleSeason,
        LandCover::IrrigatedDoubleSeason,
        LandCover::IrrigatedTripleSeason,
        LandCover::IrrigatedContinuous,
        LandCover::Fallow,
        LandCover::Urban,
        LandCover::Water,
        LandCover::BareSoil,
        LandCover::SnowIce,
    ];

    pub const AGRICULTURAL: [LandCover; 6] = [
        LandCover::Rainfed,
        LandCover::IrrigatedSingleSeason,
        LandCover::IrrigatedDoubleSeason,
        LandCover::IrrigatedTripleSeason,
        LandCover::IrrigatedContinuous,
        LandCover::Fallow,
    ];

    /// Natural covers that absorb changes in agricultural area.
    /// Shrub is in no group: inside ICRISAT coverage its area is given up.
    pub const CAN_VARY: [LandCover; 5] = [
        LandCover::TreeBroadleaf,
        LandCover::TreeNeedleleaf,
        LandCover::C3Grass,
        LandCover::C4Grass,
        LandCover::BareSoil,
    ];

    pub const CANNOT_VARY: [LandCover; 3] =
        [LandCover::Urban, LandCover::Water, LandCover::SnowIce];

    pub const IRRIGATED: [LandCover; 4] = [
        LandCover::IrrigatedSingleSeason,
        LandCover::IrrigatedDoubleSeason,
        LandCover::IrrigatedTripleSeason,
        LandCover::IrrigatedContinuous,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based pseudo level used in the ancillary files
    pub fn pseudo_level(self) -> i32 {
        self.index() as i32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            LandCover::TreeBroadleaf => "tree_broadleaf",
            LandCover::TreeNeedleleaf => "tree_needleleaf",
            LandCover::C3Grass => "c3_grass",
            LandCover::C4Grass => "c4_grass",
            LandCover::Shrub => "shrub",
            LandCover::Rainfed => "rainfed",
            LandCover::IrrigatedSingleSeason => "irrigated_single_season",
            LandCover::IrrigatedDoubleSeason => "irrigated_double_season",
            LandCover::IrrigatedTripleSeason => "irrigated_triple_season",
            LandCover::IrrigatedContinuous => "irrigated_continuous",
            LandCover::Fallow => "fallow",
            LandCover::Urban => "urban",
            LandCover::Water => "water",
            LandCover::BareSoil => "bare_soil",
            LandCover::SnowIce => "snow_ice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|lc| lc.name() == name)
    }
}

impl fmt::Display for LandCover {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plant functional type scheme of the output files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PftScheme {
    FivePft,
    NinePft,
}

const NATURAL_5PFT: [&str; 9] = [
    "tree_broadleaf",
    "tree_needleleaf",
    "c3_grass",
    "c4_grass",
    "shrub",
    "urban",
    "water",
    "bare_soil",
    "snow_ice",
];

const NATURAL_9PFT: [&str; 13] = [
    "tree_broadleaf_evergreen_tropical",
    "tree_broadleaf_evergreen_temperate",
    "tree_broadleaf_deciduous",
    "tree_needleleaf_evergreen",
    "tree_needleleaf_deciduous",
    "c3_grass",
    "c4_grass",
    "shrub_evergreen",
    "shrub_deciduous",
    "urban",
    "water",
    "bare_soil",
    "snow_ice",
];

const CROP_TYPES: [&str; 6] = [
    "rainfed",
    "irrigated_single_season",
    "irrigated_double_season",
    "irrigated_triple_season",
    "irrigated_continuous",
    "fallow",
];

impl PftScheme {
    pub fn tag(self) -> &'static str {
        match self {
            PftScheme::FivePft => "5pft",
            PftScheme::NinePft => "9pft",
        }
    }

    fn natural_types(self) -> &'static [&'static str] {
        match self {
            PftScheme::FivePft => &NATURAL_5PFT,
            PftScheme::NinePft => &NATURAL_9PFT,
        }
    }

    /// Number of vegetation (PFT) types before urban
    fn n_pft(self) -> usize {
        match self {
            PftScheme::FivePft => 5,
            PftScheme::NinePft => 9,
        }
    }

    /// Per-land-use raster names, e.g. `c3_grass_rainfed`
    pub fn landuse_names(self, landuse: LandUse) -> Vec<String> {
        self.natural_types()
            .iter()
            .map(|lc| format!("{}_{}", lc, landuse.name()))
            .collect()
    }

    /// Raster names of the composition with explicit crop types
    pub fn with_crops_names(self) -> Vec<String> {
        let natural = self.natural_types();
        let (pfts, rest) = natural.split_at(self.n_pft());
        pfts.iter()
            .map(|lc| format!("{}_natural", lc))
            .chain(CROP_TYPES.iter().map(|c| c.to_string()))
            .chain(rest.iter().map(|lc| format!("{}_natural", lc)))
            .collect()
    }

    /// Indices of (c3, c4) grass in the per-land-use layout
    pub fn grass_indices(self) -> (usize, usize) {
        match self {
            PftScheme::FivePft => (2, 3),
            PftScheme::NinePft => (5, 6),
        }
    }
}

/// Land use a fraction map refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandUse {
    Combined,
    Natural,
    Rainfed,
    Irrigated,
    Fallow,
}

impl LandUse {
    /// Land uses with their own input rasters; fallow is derived from rainfed
    pub const MAPPED: [LandUse; 4] = [
        LandUse::Combined,
        LandUse::Natural,
        LandUse::Rainfed,
        LandUse::Irrigated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LandUse::Combined => "combined",
            LandUse::Natural => "natural",
            LandUse::Rainfed => "rainfed",
            LandUse::Irrigated => "irrigated",
            LandUse::Fallow => "fallow",
        }
    }

    /// Cropland uses also get a copy with all crops treated as c3
    pub fn is_cropland(self) -> bool {
        matches!(self, LandUse::Rainfed | LandUse::Irrigated | LandUse::Fallow)
    }
}
