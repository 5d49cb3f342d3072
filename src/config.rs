use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

/// Fixed constants shared by every ancillary writer
#[derive(Clone, Debug)]
pub struct Constants {
    /// netCDF default fill value for 64-bit floats (`NC_FILL_DOUBLE`)
    pub f8_fill: f64,
    /// Earth radius used by the UM/ANTS latitude_longitude grid mapping (m)
    pub earth_radius: f64,

    /// UM STASH code for land cover fractions
    pub frac_stash: &'static str,
    /// UM STASH code for leaf area index
    pub lai_stash: &'static str,
    /// UM STASH code for canopy height
    pub canopy_height_stash: &'static str,

    /// Year used for the vegetation climatology time axis
    pub climatology_year: i32,
    /// Number of climatology steps per year (three per month)
    pub climatology_steps: usize,
    /// Spacing of the climatology time axis in days
    pub climatology_step_days: i64,

    /// First and last year covered by the ICRISAT irrigated area maps
    pub icrisat_start_year: i32,
    pub icrisat_end_year: i32,
    /// Year of the baseline land-use maps
    pub landuse_year: i32,

    /// Number of days in the irrigation schedule
    pub schedule_days: usize,
    /// Last day of year of the Kharif season (end of October)
    pub kharif_end_doy: u32,
    /// Rabi season runs from `rabi_start_doy` through the new year to `rabi_end_doy`
    pub rabi_start_doy: u32,
    pub rabi_end_doy: u32,

    // Study region
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            f8_fill: 9.969_209_968_386_869e36,
            earth_radius: 6_371_229.0,

            frac_stash: "m01s00i216",
            lai_stash: "m01s00i217",
            canopy_height_stash: "m01s00i218",

            climatology_year: 2015,
            climatology_steps: 36,
            climatology_step_days: 10,

            icrisat_start_year: 1979,
            icrisat_end_year: 2015,
            landuse_year: 2015,

            schedule_days: 366,
            kharif_end_doy: 304,
            rabi_start_doy: 305,
            rabi_end_doy: 90,

            // Indo-Gangetic Plain
            lon_min: 60.0,
            lon_max: 100.0,
            lat_min: 20.0,
            lat_max: 40.0,
        }
    }
}

impl Constants {
    /// All years with ICRISAT coverage
    pub fn icrisat_years(&self) -> Vec<i32> {
        (self.icrisat_start_year..=self.icrisat_end_year).collect()
    }
}

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub constants: Constants,

    /// Processed data directory (`DATADIR`)
    pub data_dir: PathBuf,
    /// Raw downloads, e.g. the WFDEI global ancillaries
    pub raw_dir: PathBuf,
    /// Output directory (`OUTDIR`)
    pub out_dir: PathBuf,
    /// Region tag used in file names, e.g. "igp"
    pub region: String,
    /// Product tag used in file names, e.g. "CUSTOM"
    pub product: String,

    /// Write 5-PFT outputs
    pub five_pft: bool,
    /// Write 9-PFT outputs
    pub nine_pft: bool,

    /// Template GeoTIFF holding the land fraction of the target grid
    pub land_frac_file: PathBuf,

    /// Number of worker threads (0 lets rayon decide)
    pub num_threads: usize,
    /// Log at debug level unless `RUST_LOG` says otherwise
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            constants: Constants::default(),
            land_frac_file: data_dir.join("geotiff").join("jamr_custom_land_frac_igp.tif"),
            raw_dir: PathBuf::from("./data-raw"),
            out_dir: data_dir.join("wfdei").join("ancils"),
            data_dir,
            region: String::from("igp"),
            product: String::from("CUSTOM"),
            five_pft: true,
            nine_pft: false,
            num_threads: 0,
            verbose: false,
        }
    }
}

impl Config {
    /// Global arguments shared by every subcommand
    pub fn global_args(command: Command) -> Command {
        command
            .arg(
                Arg::new("data-dir")
                    .long("data-dir")
                    .value_name("DIR")
                    .help("Processed data directory")
                    .env("DATADIR")
                    .default_value("./data")
                    .global(true),
            )
            .arg(
                Arg::new("raw-dir")
                    .long("raw-dir")
                    .value_name("DIR")
                    .help("Raw input data directory")
                    .env("RAWDIR")
                    .default_value("./data-raw")
                    .global(true),
            )
            .arg(
                Arg::new("out-dir")
                    .short('o')
                    .long("out-dir")
                    .value_name("DIR")
                    .help("Output directory")
                    .env("OUTDIR")
                    .global(true),
            )
            .arg(
                Arg::new("region")
                    .long("region")
                    .value_name("NAME")
                    .help("Region tag used in file names")
                    .env("REGION")
                    .default_value("igp")
                    .global(true),
            )
            .arg(
                Arg::new("product")
                    .long("product")
                    .value_name("NAME")
                    .help("Product tag used in file names")
                    .env("PRODUCT")
                    .default_value("CUSTOM")
                    .global(true),
            )
            .arg(
                Arg::new("five-pft")
                    .long("five-pft")
                    .value_name("0|1")
                    .help("Write 5-PFT outputs")
                    .env("FIVEPFT")
                    .value_parser(["0", "1"])
                    .default_value("1")
                    .global(true),
            )
            .arg(
                Arg::new("nine-pft")
                    .long("nine-pft")
                    .value_name("0|1")
                    .help("Write 9-PFT outputs")
                    .env("NINEPFT")
                    .value_parser(["0", "1"])
                    .default_value("0")
                    .global(true),
            )
            .arg(
                Arg::new("land-frac")
                    .long("land-frac")
                    .value_name("FILE")
                    .help("GeoTIFF land fraction defining the target grid")
                    .env("JULES_LAND_FRAC_FN")
                    .global(true),
            )
            .arg(
                Arg::new("threads")
                    .short('j')
                    .long("threads")
                    .value_name("COUNT")
                    .help("Number of worker threads (0 = all cores)")
                    .value_parser(clap::value_parser!(usize))
                    .default_value("0")
                    .global(true),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Enable verbose output")
                    .action(ArgAction::SetTrue)
                    .global(true),
            )
    }

    /// Build the configuration from parsed arguments
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let data_dir = PathBuf::from(
            matches
                .get_one::<String>("data-dir")
                .ok_or("Missing data directory")?,
        );
        let raw_dir = PathBuf::from(
            matches
                .get_one::<String>("raw-dir")
                .ok_or("Missing raw data directory")?,
        );
        let out_dir = match matches.get_one::<String>("out-dir") {
            Some(dir) => PathBuf::from(dir),
            None => data_dir.join("wfdei").join("ancils"),
        };
        let region = matches
            .get_one::<String>("region")
            .ok_or("Missing region")?
            .clone();
        let product = matches
            .get_one::<String>("product")
            .ok_or("Missing product")?
            .clone();
        let five_pft = parse_flag(matches.get_one::<String>("five-pft"))?;
        let nine_pft = parse_flag(matches.get_one::<String>("nine-pft"))?;
        let land_frac_file = match matches.get_one::<String>("land-frac") {
            Some(path) => PathBuf::from(path),
            None => data_dir
                .join("geotiff")
                .join(format!("jamr_custom_land_frac_{}.tif", region)),
        };
        let num_threads = matches.get_one::<usize>("threads").copied().unwrap_or(0);
        let verbose = matches.get_flag("verbose");

        let config = Self {
            constants: Constants::default(),
            data_dir,
            raw_dir,
            out_dir,
            region,
            product,
            five_pft,
            nine_pft,
            land_frac_file,
            num_threads,
            verbose,
        };

        config.validate()?;
        Ok(config)
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// File name suffix `<product>_<region>.nc`
    pub fn file_suffix(&self) -> String {
        format!("{}_{}.nc", self.product, self.region)
    }

    /// Directory of the processed GeoTIFF inputs
    pub fn geotiff_dir(&self) -> PathBuf {
        self.data_dir.join("geotiff")
    }

    /// Directory of the processed netCDF inputs
    pub fn netcdf_dir(&self) -> PathBuf {
        self.data_dir.join("netcdf")
    }

    /// Directory of the ICRISAT irrigated area maps
    pub fn irrigated_area_dir(&self) -> PathBuf {
        self.data_dir.join("irrigated_area_maps")
    }

    /// Create the output directory if needed
    pub fn ensure_out_dir(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.out_dir)?;
        Ok(&self.out_dir)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !self.data_dir.exists() {
            return Err(format!(
                "Data directory does not exist: {}",
                self.data_dir.display()
            ));
        }
        if !self.data_dir.is_dir() {
            return Err(format!(
                "Data path is not a directory: {}",
                self.data_dir.display()
            ));
        }
        if self.region.is_empty() {
            return Err("Region tag must not be empty".to_string());
        }
        if !self.five_pft && !self.nine_pft {
            return Err("At least one of the 5-PFT or 9-PFT outputs must be enabled".to_string());
        }

        let c = &self.constants;
        if c.lon_min >= c.lon_max || c.lat_min >= c.lat_max {
            return Err("Region bounding box is empty".to_string());
        }
        if c.icrisat_start_year > c.icrisat_end_year {
            return Err("ICRISAT start year is after end year".to_string());
        }

        Ok(())
    }
}

fn parse_flag(value: Option<&String>) -> Result<bool, String> {
    match value.map(String::as_str) {
        Some("1") => Ok(true),
        Some("0") | None => Ok(false),
        Some(other) => Err(format!("Invalid flag value: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        Config::global_args(Command::new("jules-ancil"))
    }

    #[test]
    fn test_constants_icrisat_years() {
        let constants = Constants::default();
        let years = constants.icrisat_years();
        assert_eq!(years.len(), 37);
        assert_eq!(years.first(), Some(&1979));
        assert_eq!(years.last(), Some(&2015));
    }

    #[test]
    fn test_from_matches_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let matches = command()
            .try_get_matches_from(["jules-ancil", "--data-dir", &data_dir])
            .unwrap();
        let config = Config::from_matches(&matches).unwrap();

        assert_eq!(config.region, "igp");
        assert_eq!(config.product, "CUSTOM");
        assert!(config.five_pft);
        assert!(!config.nine_pft);
        assert_eq!(config.out_dir, dir.path().join("wfdei").join("ancils"));
        assert_eq!(
            config.land_frac_file,
            dir.path().join("geotiff").join("jamr_custom_land_frac_igp.tif")
        );
        assert_eq!(config.file_suffix(), "CUSTOM_igp.nc");
        assert!(!config.verbose);
    }

    #[test]
    fn test_from_matches_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let matches = command()
            .try_get_matches_from(["jules-ancil", "-v", "--data-dir", &data_dir])
            .unwrap();
        let config = Config::from_matches(&matches).unwrap();
        assert!(config.verbose);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(Config::default().log_level(), "info");
    }

    #[test]
    fn test_validation_nonexistent_data_dir() {
        let matches = command()
            .try_get_matches_from(["jules-ancil", "--data-dir", "nonexistent_path_12345"])
            .unwrap();
        let result = Config::from_matches(&matches);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Data directory does not exist"));
    }

    #[test]
    fn test_validation_requires_a_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            five_pft: false,
            nine_pft: false,
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().contains("5-PFT or 9-PFT"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some(&"1".to_string())).unwrap());
        assert!(!parse_flag(Some(&"0".to_string())).unwrap());
        assert!(!parse_flag(None).unwrap());
        assert!(parse_flag(Some(&"yes".to_string())).is_err());
    }
}
