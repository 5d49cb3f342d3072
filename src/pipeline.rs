//! Error type shared by the subcommands and helpers for their file layout.

use crate::config::Config;
use crate::data_io::{ReaderError, VegVariable, WriteError};
use crate::landcover::FracError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Read failed: {0}")]
    Reader(#[from] ReaderError),

    #[error("Write failed: {0}")]
    Write(#[from] WriteError),

    #[error("Land cover fractions invalid: {0}")]
    Frac(#[from] FracError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Worker thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Copy `src` to `dst`, creating the destination directory
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        return Err(ReaderError::FileNotFound(src.display().to_string()).into());
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Path from an environment variable, falling back to `default`
pub fn env_path(var: &str, default: PathBuf) -> PathBuf {
    std::env::var_os(var).map(PathBuf::from).unwrap_or(default)
}

/// File in the output (ancillary) directory
pub fn ancil_file(config: &Config, name: &str) -> PathBuf {
    config.out_dir.join(name)
}

/// Baseline ANTS fractions written by `frac crops`
pub fn baseline_frac_file(config: &Config, year: i32) -> PathBuf {
    config
        .netcdf_dir()
        .join(format!("jules_frac_5pft_ants_{}_{}", year, config.file_suffix()))
}

/// ANTS fractions after the ICRISAT adjustment
pub fn adjusted_frac_file(config: &Config, year: i32) -> PathBuf {
    config.data_dir.join(format!(
        "jules_frac_5pft_ants_{}_{}_{}_adjusted.nc",
        year, config.product, config.region
    ))
}

/// Combined LAI or canopy height climatology in ANTS layout
pub fn prescribed_veg_file(config: &Config, kind: VegVariable) -> PathBuf {
    let tag = match kind {
        VegVariable::LeafAreaIndex => "lai",
        VegVariable::CanopyHeight => "canopy_height",
    };
    config
        .data_dir
        .join(format!("jules_5pft_w_crops_prescribed_{}_{}.nc", tag, config.region))
}

/// JULES land cover fractions for one year
pub fn veg_frac_file(config: &Config, year: i32) -> PathBuf {
    ancil_file(
        config,
        &format!("jules_5pft_w_crops_veg_frac_{}_{}_wfdei.nc", year, config.region),
    )
}

/// JULES vegetation functional file, optionally the daily interpolated one
pub fn veg_func_file(config: &Config, daily: bool) -> PathBuf {
    let suffix = if daily { "_interp" } else { "" };
    ancil_file(
        config,
        &format!("jules_5pft_w_crops_veg_func_{}_wfdei{}.nc", config.region, suffix),
    )
}

/// Regional WFDEI land fraction restricted to the basins
pub fn land_fraction_file(config: &Config) -> PathBuf {
    ancil_file(config, &format!("WFD-EI-LandFraction2d_{}.nc", config.region))
}
