//! End-to-end run on a 2 x 3 grid: crop fractions, ICRISAT adjustment,
//! WFDEI ancillaries, vegetation inputs and irrigation schedules.
//!
//! Raster row 0 is the northern row. Cell (0, 2) is ocean and cell (1, 2)
//! is glaciated; the other four cells share one land cover mix.

use jules_ancil::ancils::run_ancils;
use jules_ancil::config::{Config, Constants};
use jules_ancil::data_io::{write_band, write_veg_climatology, MaskedArray, NetCDFReader, VegVariable};
use jules_ancil::frac_input::{adjust_frac, frac_file_name, write_crop_fracs};
use jules_ancil::grid::RegionGrid;
use jules_ancil::irrigation::write_irrig_schedules;
use jules_ancil::landcover::{LandCover, PftScheme};
use jules_ancil::pipeline::{adjusted_frac_file, land_fraction_file, veg_frac_file, veg_func_file};
use jules_ancil::time_utils::climatology_times;
use ndarray::{array, Array2, Array4, Ix3};
use std::path::Path;

const GT: [f64; 6] = [60.0, 0.5, 0.0, 40.0, 0.0, -0.5];
const YEARS: [i32; 2] = [2014, 2015];

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
}

fn setup(root: &Path) -> Config {
    let mut config = Config::default();
    config.data_dir = root.join("data");
    config.raw_dir = root.join("data-raw");
    config.out_dir = root.join("ancils");
    config.land_frac_file = config.geotiff_dir().join("jamr_custom_land_frac_igp.tif");
    config.constants.icrisat_start_year = YEARS[0];
    config.constants.icrisat_end_year = YEARS[1];

    for dir in [config.geotiff_dir(), config.irrigated_area_dir()] {
        std::fs::create_dir_all(dir).unwrap();
    }
    write_band(&config.land_frac_file, &array![[1.0, 1.0, 0.0], [1.0, 1.0, 1.0]], &GT, None).unwrap();
    config
}

/// Every cell holds the same mix except the glaciated one
fn write_land_cover_rasters(config: &Config) {
    let mix = [
        ("tree_broadleaf_natural", 0.2),
        ("c3_grass_natural", 0.2),
        ("c4_grass_natural", 0.1),
        ("rainfed", 0.2),
        ("irrigated_single_season", 0.1),
        ("irrigated_double_season", 0.1),
        ("urban_natural", 0.1),
    ];
    for name in PftScheme::FivePft.with_crops_names() {
        let value = mix.iter().find(|(n, _)| *n == name).map(|(_, v)| *v).unwrap_or(0.0);
        let mut data = Array2::from_elem((2, 3), value);
        data[[1, 2]] = match name.as_str() {
            "snow_ice_natural" => 0.6,
            "bare_soil_natural" => 0.4,
            _ => 0.0,
        };
        let path = config
            .geotiff_dir()
            .join(format!("jamr_esa_cci_lc_frac_{}_2015_igp.tif", name));
        write_band(&path, &data, &GT, None).unwrap();
    }
}

fn write_icrisat_rasters(config: &Config) {
    let dir = config.irrigated_area_dir();
    let targets = [
        ("rainfed", 0.3),
        ("irrigated_single", 0.1),
        ("irrigated_double", 0.1),
        ("irrigated_triple", 0.0),
        ("irrigated_continuous", 0.05),
    ];
    for year in YEARS {
        for (name, value) in targets {
            let path = dir.join(format!("icrisat_{}_frac_{}_india_0.500000Deg.tif", name, year));
            write_band(&path, &Array2::from_elem((2, 3), value), &GT, None).unwrap();
        }
    }
    write_band(dir.join("icrisat_india_frac.tif"), &Array2::from_elem((2, 3), 1.0), &GT, None).unwrap();
}

/// Global-style WFDEI file on a 4 x 3 grid, one cell wider than the region
fn write_wfdei_file(path: &Path, var: &str, z: Option<usize>, lat_lon: bool, value: f32) {
    let mut file = netcdf::create(path).unwrap();
    let (ydim, xdim) = if lat_lon { ("lat", "lon") } else { ("y", "x") };
    file.add_dimension(ydim, 3).unwrap();
    file.add_dimension(xdim, 4).unwrap();
    if lat_lon {
        let mut v = file.add_variable::<f32>("lat", &["lat"]).unwrap();
        v.put_values(&[39.25f32, 39.75, 40.25], ..).unwrap();
        let mut v = file.add_variable::<f32>("lon", &["lon"]).unwrap();
        v.put_values(&[59.75f32, 60.25, 60.75, 61.25], ..).unwrap();
    }
    match z {
        Some(nz) => {
            file.add_dimension("z", nz).unwrap();
            let mut v = file.add_variable::<f32>(var, &["z", ydim, xdim]).unwrap();
            v.put_values(&vec![value; nz * 12], ..).unwrap();
        }
        None => {
            let mut v = file.add_variable::<f32>(var, &[ydim, xdim]).unwrap();
            v.put_values(&[value; 12], ..).unwrap();
        }
    }
}

fn write_wfdei_inputs(config: &Config) {
    let dir = config.raw_dir.join("wfdei_ancils");
    std::fs::create_dir_all(&dir).unwrap();
    write_wfdei_file(&dir.join("topoidx_WFDEI_0p5_2D_global.nc"), "timean", None, false, 3.0);
    write_wfdei_file(&dir.join("WFDEI-long-lat-2d.nc"), "longitude", None, false, 60.0);
    write_wfdei_file(&dir.join("WFD-EI-LandFraction2d.nc"), "lsmask", None, false, 1.0);
    write_wfdei_file(&dir.join("qrparm.veg.frac2d.nc"), "field1391", Some(9), false, 0.5);
    write_wfdei_file(&dir.join("qrparm.veg.func2d.nc"), "field1392", Some(5), false, 0.5);
    write_wfdei_file(&dir.join("qrparm.soil_HWSD_class3_van_genuchten2d.nc"), "field332", None, false, 0.45);
    write_wfdei_file(
        &dir.join("qrparm.soil_HWSD_class3_van_genuchtenNew_NewSoilAlbedo-rfu-2D-LatLon-grid.nc"),
        "sm_sat",
        None,
        true,
        0.45,
    );
    write_wfdei_file(&dir.join("qrparm.soil_HWSD_cont_cosby2d.nc"), "field332", None, false, 0.45);

    let forcing = config.raw_dir.join("WFDEI");
    std::fs::create_dir_all(&forcing).unwrap();
    write_wfdei_file(&forcing.join("LWdown_WFDEI_197901.nc"), "LWdown", None, true, 300.0);

    // The ocean cell lies outside the basins
    write_band(
        config.data_dir.join("igp_basins.tif"),
        &array![[1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
        &GT,
        None,
    )
    .unwrap();
    write_band(
        config.data_dir.join("igp_wet_season_onset.tif"),
        &Array2::from_elem((2, 3), 160.0),
        &GT,
        None,
    )
    .unwrap();
}

fn write_prescribed_veg(config: &Config, root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let grid = RegionGrid::from_geotiff(&config.land_frac_file).unwrap();
    let times = climatology_times(2015, 36, 10);
    let values = MaskedArray::unmasked(Array4::from_elem((36, 11, 2, 3), 2.0));
    let lai = root.join("lai.nc");
    let canht = root.join("canht.nc");
    let constants = Constants::default();
    write_veg_climatology(&lai, &grid, VegVariable::LeafAreaIndex, &times, &values, &constants).unwrap();
    write_veg_climatology(&canht, &grid, VegVariable::CanopyHeight, &times, &values, &constants).unwrap();
    (lai, canht)
}

fn read_frac(path: &Path) -> MaskedArray<Ix3> {
    NetCDFReader::open(path)
        .unwrap()
        .read_masked("land_cover_lccs")
        .unwrap()
        .into_dimensionality::<Ix3>()
        .unwrap()
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    write_land_cover_rasters(&config);
    write_icrisat_rasters(&config);
    write_wfdei_inputs(&config);

    // Baseline fractions
    let written = write_crop_fracs(&config).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with(frac_file_name(&config, None, false, PftScheme::FivePft, 2015)));
    let base = read_frac(&written[0]);
    assert!(base.mask[[0, 0, 2]]);
    assert_close(base.data[[LandCover::Rainfed.index(), 0, 0]], 0.2);
    assert_close(base.data[[LandCover::SnowIce.index(), 1, 2]], 1.0);
    assert_close(base.data[[LandCover::BareSoil.index(), 1, 2]], 0.0);

    // ICRISAT adjustment
    let adjusted = adjust_frac(&config).unwrap();
    assert_eq!(adjusted.len(), YEARS.len());
    let frac = read_frac(&adjusted_frac_file(&config, 2014));
    let at = |lc: LandCover| frac.data[[lc.index(), 1, 1]];
    assert_close(at(LandCover::Rainfed), 0.3);
    assert_close(at(LandCover::IrrigatedSingleSeason), 0.1);
    assert_close(at(LandCover::IrrigatedDoubleSeason), 0.15);
    assert_close(at(LandCover::IrrigatedContinuous), 0.0);
    assert_close(at(LandCover::Urban), 0.1);
    assert_close(at(LandCover::TreeBroadleaf), 0.14);
    assert_close(at(LandCover::C3Grass), 0.14);
    assert_close(at(LandCover::C4Grass), 0.07);
    assert_close(frac.data[[LandCover::SnowIce.index(), 1, 2]], 1.0);
    assert!(frac.mask[[0, 0, 2]]);

    // WFDEI ancillaries and vegetation inputs
    let (lai, canht) = write_prescribed_veg(&config, dir.path());
    run_ancils(&config, &lai, &canht).unwrap();

    let lsmask = NetCDFReader::open(land_fraction_file(&config))
        .unwrap()
        .read_array("lsmask")
        .unwrap();
    assert_eq!(lsmask.shape(), &[2, 3]);
    // South-up: the ocean cell is now in the top row
    assert_eq!(lsmask[[1, 2]], 0.0);
    assert_eq!(lsmask[[0, 2]], 1.0);

    let soil = NetCDFReader::open(config.out_dir.join("qrparm.soil_HWSD_cont_cosby2d_igp.nc")).unwrap();
    let th_sat = soil.read_array("field332").unwrap();
    assert_eq!(th_sat[[0, 2]], 0.0);
    assert_close(th_sat[[0, 0]], 0.45);
    assert_eq!(soil.read_coordinate("lat").unwrap().len(), 2);

    let veg_frac = NetCDFReader::open(veg_frac_file(&config, 2015)).unwrap();
    assert_eq!(veg_frac.variable_dims("land_cover_lccs").unwrap(), vec!["dim0", "lat", "lon"]);
    assert_eq!(veg_frac.read_coordinate("lat").unwrap().to_vec(), vec![39.25, 39.75]);

    let veg_func = NetCDFReader::open(veg_func_file(&config, true)).unwrap();
    let tstep = veg_func.read_coordinate("tstep").unwrap();
    assert_eq!(tstep.len(), 366);
    assert_eq!(tstep[0], 394464.0);
    let lai_daily = veg_func.read_array("leaf_area_index").unwrap();
    assert_close(lai_daily[[100, 10, 1, 1]], 2.0);

    // Irrigation schedules
    let (plain, policy) = write_irrig_schedules(&config).unwrap();
    let schedule = NetCDFReader::open(&plain).unwrap().read_array("irr_schedule").unwrap();
    assert_eq!(schedule.shape(), &[366, 15, 2, 3]);
    let continuous = LandCover::IrrigatedContinuous.index();
    for (j, i) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        assert_eq!(schedule[[0, continuous, j, i]], 1.0);
    }
    assert_eq!(schedule[[0, continuous, 0, 2]], 0.0);
    assert_eq!(schedule[[0, continuous, 1, 2]], 0.0);

    let single = LandCover::IrrigatedSingleSeason.index();
    assert_eq!(schedule[[158, single, 0, 0]], 0.0);
    assert_eq!(schedule[[159, single, 0, 0]], 1.0);

    let policy = NetCDFReader::open(&policy).unwrap().read_array("irr_schedule").unwrap();
    assert_eq!(policy[[10, continuous, 1, 1]], 2.0);
    assert_eq!(policy[[200, continuous, 1, 1]], 1.0);
}
