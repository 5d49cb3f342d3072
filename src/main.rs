use clap::{Arg, ArgMatches, Command};
use env_logger::Env;
use jules_ancil::{
    ancils, climatology,
    config::Config,
    data_io::VegVariable,
    frac_input, irrigation,
    parallel::init_thread_pool,
    pipeline::prescribed_veg_file,
    PipelineError, Result,
};
use log::info;
use std::path::PathBuf;

fn main() {
    let matches = build_cli().get_matches();

    let config = match Config::from_matches(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level())).init();
    if let Err(e) = init_thread_pool(config.num_threads) {
        eprintln!("Thread pool error: {}", e);
        std::process::exit(1);
    }

    let result = match matches.subcommand() {
        Some(("frac", sub_matches)) => run_frac(&config, sub_matches),
        Some(("adjust-frac", _)) => run_adjust_frac(&config),
        Some(("lai-tiles", _)) => run_lai_tiles(&config),
        Some(("veg-climatology", sub_matches)) => run_veg_climatology(&config, sub_matches),
        Some(("ancils", sub_matches)) => run_ancils(&config, sub_matches),
        Some(("irrig-schedule", _)) => run_irrig_schedule(&config),
        _ => Err(PipelineError::Config(
            "Please specify a subcommand. Use --help for more information.".to_string(),
        )),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_frac(config: &Config, matches: &ArgMatches) -> Result<()> {
    let written = match matches.subcommand() {
        Some(("landuse", _)) => frac_input::write_landuse_fracs(config)?,
        Some(("crops", _)) => frac_input::write_crop_fracs(config)?,
        _ => return Err(PipelineError::Config("frac needs `landuse` or `crops`".to_string())),
    };
    info!("Wrote {} fraction files to {}", written.len(), config.netcdf_dir().display());
    Ok(())
}

fn run_adjust_frac(config: &Config) -> Result<()> {
    let written = frac_input::adjust_frac(config)?;
    info!("Wrote {} adjusted fraction files", written.len());
    Ok(())
}

fn run_lai_tiles(config: &Config) -> Result<()> {
    let written = climatology::write_lai_tiles(config)?;
    info!("Wrote {} LAI files", written.len());
    Ok(())
}

/// LAI and canopy height file paths, defaulting to the prescribed files
fn veg_paths(config: &Config, matches: &ArgMatches) -> (PathBuf, PathBuf) {
    let lai = matches
        .get_one::<String>("lai-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| prescribed_veg_file(config, VegVariable::LeafAreaIndex));
    let canopy_height = matches
        .get_one::<String>("canopy-height-file")
        .map(PathBuf::from)
        .unwrap_or_else(|| prescribed_veg_file(config, VegVariable::CanopyHeight));
    (lai, canopy_height)
}

fn run_veg_climatology(config: &Config, matches: &ArgMatches) -> Result<()> {
    let (lai, canopy_height) = veg_paths(config, matches);
    climatology::write_veg_climatologies(config, &lai, &canopy_height)
}

fn run_ancils(config: &Config, matches: &ArgMatches) -> Result<()> {
    let (lai, canopy_height) = veg_paths(config, matches);
    ancils::run_ancils(config, &lai, &canopy_height)?;
    info!("Ancillaries written to {}", config.out_dir.display());
    Ok(())
}

fn run_irrig_schedule(config: &Config) -> Result<()> {
    irrigation::write_irrig_schedules(config)?;
    Ok(())
}

fn veg_file_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("lai-file")
                .long("lai-file")
                .value_name("FILE")
                .help("Combined leaf area index climatology (ANTS layout)")
                .env("LAI_NCFILE"),
        )
        .arg(
            Arg::new("canopy-height-file")
                .long("canopy-height-file")
                .value_name("FILE")
                .help("Combined canopy height climatology (ANTS layout)")
                .env("CANOPY_HEIGHT_NCFILE"),
        )
}

fn build_cli() -> Command {
    let command = Command::new("jules-ancil")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Prepare land cover, vegetation and irrigation inputs for JULES")
        .subcommand_required(true)
        .subcommand(
            Command::new("frac")
                .about("Build land cover fractions from the ESA CCI rasters")
                .subcommand_required(true)
                .subcommand(Command::new("landuse").about("Per-land-use fractions, with no-c4 and fallow copies"))
                .subcommand(Command::new("crops").about("Fractions with explicit crop types")),
        )
        .subcommand(Command::new("adjust-frac").about("Reconcile the baseline fractions with ICRISAT for every year"))
        .subcommand(Command::new("lai-tiles").about("Stack the 10-day LAI rasters into per-land-cover netCDF files"))
        .subcommand(veg_file_args(
            Command::new("veg-climatology").about("Write the combined LAI and canopy height climatologies"),
        ))
        .subcommand(veg_file_args(
            Command::new("ancils").about("Select the WFDEI ancillaries and write the JULES vegetation inputs"),
        ))
        .subcommand(Command::new("irrig-schedule").about("Write the daily irrigation schedules"));

    Config::global_args(command)
}
