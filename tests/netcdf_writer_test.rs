use jules_ancil::config::Constants;
use jules_ancil::data_io::{
    multiply_by, overwrite_variable, subset_file, write_frac_ants, write_irrig_schedule, write_veg_climatology,
    zero_where, BoundingBox, JulesCoords, MaskedArray, NetCDFReader, SubsetOptions, TimeAxis, VegVariable,
};
use jules_ancil::grid::RegionGrid;
use jules_ancil::time_utils::climatology_times;
use ndarray::{array, Array1, Array3, Array4};
use netcdf::types::{FloatType, IntType, NcVariableType};
use std::path::Path;

const GT: [f64; 6] = [60.0, 0.5, 0.0, 40.0, 0.0, -0.5];

fn small_grid() -> RegionGrid {
    RegionGrid::from_geotransform(&GT, array![[1.0, 1.0], [1.0, 0.0]])
}

/// Global-style file with `x`/`y`/`z` dimensions and no coordinates
fn write_global_file(path: &Path) {
    let mut file = netcdf::create(path).unwrap();
    file.add_attribute("title", "WFDEI test ancillary").unwrap();
    file.add_dimension("z", 2).unwrap();
    file.add_dimension("y", 4).unwrap();
    file.add_dimension("x", 8).unwrap();

    let values: Vec<f32> = (0..2)
        .flat_map(|z| (0..4).flat_map(move |y| (0..8).map(move |x| (100 * z + 10 * y + x) as f32)))
        .collect();
    let mut var = file.add_variable::<f32>("field332", &["z", "y", "x"]).unwrap();
    var.set_fill_value(-1.0e20f32).unwrap();
    var.put_attribute("units", "m3 m-3").unwrap();
    var.put_values(&values, ..).unwrap();

    let mut var = file.add_variable::<f32>("lsmask", &["y", "x"]).unwrap();
    var.put_values(&vec![1.0f32; 32], ..).unwrap();

    let codes: Vec<i32> = (0..32).collect();
    let mut var = file.add_variable::<i32>("soil_class", &["y", "x"]).unwrap();
    var.set_fill_value(-99i32).unwrap();
    var.put_values(&codes, ..).unwrap();
}

fn coords() -> (Array1<f64>, Array1<f64>) {
    let lat = array![19.25, 19.75, 20.25, 20.75];
    let lon = Array1::from_iter((0..8).map(|i| 58.25 + 0.5 * i as f64));
    (lat, lon)
}

const IGP: BoundingBox = BoundingBox {
    lon_min: 60.0,
    lon_max: 100.0,
    lat_min: 20.0,
    lat_max: 40.0,
};

#[test]
fn test_subset_renames_and_crops() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("global.nc");
    let dst = dir.path().join("global_igp.nc");
    write_global_file(&src);

    let (lat, lon) = coords();
    let options = SubsetOptions::default()
        .rename("x", "lon")
        .rename("y", "lat")
        .rename("z", "dim0")
        .with_coords(lat, lon)
        .crop(IGP);
    subset_file(&src, &dst, &options).unwrap();

    let reader = NetCDFReader::open(&dst).unwrap();
    assert_eq!(reader.dimension_len("lat").unwrap(), 2);
    assert_eq!(reader.dimension_len("lon").unwrap(), 4);
    assert_eq!(reader.dimension_len("dim0").unwrap(), 2);
    assert_eq!(reader.variable_dims("field332").unwrap(), vec!["dim0", "lat", "lon"]);
    assert_eq!(reader.read_coordinate("lat").unwrap().to_vec(), vec![20.25, 20.75]);
    assert_eq!(reader.read_coordinate("lon").unwrap().to_vec(), vec![60.25, 60.75, 61.25, 61.75]);
    assert_eq!(reader.string_attribute("lat", "units").unwrap(), "degrees North");
    assert_eq!(reader.string_attribute("field332", "units").unwrap(), "m3 m-3");

    let fill = reader.numeric_attribute("field332", "_FillValue").unwrap().unwrap();
    assert!((fill + 1.0e20).abs() < 1.0e14);

    let values = reader.read_array("field332").unwrap();
    assert_eq!(values.shape(), &[2, 2, 4]);
    // z = 1, y = 2, x = 4
    assert_eq!(values[[1, 0, 0]], 124.0);
    assert_eq!(values[[0, 1, 3]], 37.0);

    let output = netcdf::open(&dst).unwrap();
    let title = output.attribute("title").unwrap().value().unwrap();
    assert_eq!(jules_ancil::data_io::utils::attribute_as_string(&title).unwrap(), "WFDEI test ancillary");
}

#[test]
fn test_subset_keeps_source_types() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("global.nc");
    let dst = dir.path().join("global_igp.nc");
    write_global_file(&src);

    let (lat, lon) = coords();
    let options = SubsetOptions::default()
        .rename("x", "lon")
        .rename("y", "lat")
        .rename("z", "dim0")
        .with_coords(lat, lon)
        .crop(IGP);
    subset_file(&src, &dst, &options).unwrap();

    let output = netcdf::open(&dst).unwrap();
    assert_eq!(output.variable("field332").unwrap().vartype(), NcVariableType::Float(FloatType::F32));
    assert_eq!(output.variable("lsmask").unwrap().vartype(), NcVariableType::Float(FloatType::F32));
    let soil = output.variable("soil_class").unwrap();
    assert_eq!(soil.vartype(), NcVariableType::Int(IntType::I32));
    // y = 2, x = 4
    assert_eq!(soil.get_values::<i32, _>(..).unwrap()[0], 20);

    let reader = NetCDFReader::open(&dst).unwrap();
    assert_eq!(reader.numeric_attribute("soil_class", "_FillValue").unwrap(), Some(-99.0));
    let fill = reader.numeric_attribute("field332", "_FillValue").unwrap().unwrap();
    assert_eq!(fill as f32, -1.0e20f32);
}

#[test]
fn test_subset_outside_box_fails() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("global.nc");
    write_global_file(&src);

    let (lat, lon) = coords();
    let options = SubsetOptions::default()
        .rename("x", "lon")
        .rename("y", "lat")
        .with_coords(lat, lon)
        .crop(BoundingBox {
            lon_min: 120.0,
            lon_max: 130.0,
            lat_min: 20.0,
            lat_max: 40.0,
        });
    assert!(subset_file(&src, &dir.path().join("out.nc"), &options).is_err());
}

#[test]
fn test_zero_where_and_multiply() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("global.nc");
    let dst = dir.path().join("global_igp.nc");
    write_global_file(&src);
    let (lat, lon) = coords();
    let options = SubsetOptions::default()
        .rename("x", "lon")
        .rename("y", "lat")
        .rename("z", "dim0")
        .with_coords(lat, lon)
        .crop(IGP);
    subset_file(&src, &dst, &options).unwrap();

    let ice = array![[true, false, false, false], [false, false, false, true]];
    let changed = zero_where(&dst, "field332", &ice).unwrap();
    assert_eq!(changed, 4);

    let basins = array![[1.0, 0.0, 1.0, 1.0], [0.0, 1.0, 1.0, 1.0]];
    let changed = multiply_by(&dst, "lsmask", &basins).unwrap();
    assert_eq!(changed, 2);

    let reader = NetCDFReader::open(&dst).unwrap();
    let th_sat = reader.read_array("field332").unwrap();
    assert_eq!(th_sat[[0, 0, 0]], 0.0);
    assert_eq!(th_sat[[1, 0, 0]], 0.0);
    assert_eq!(th_sat[[1, 1, 3]], 0.0);
    assert_eq!(th_sat[[1, 0, 1]], 125.0);
    let lsmask = reader.read_array("lsmask").unwrap();
    assert_eq!(lsmask.sum(), 6.0);

    // Grid mismatch is rejected
    assert!(zero_where(&dst, "field332", &array![[true]]).is_err());
}

#[test]
fn test_veg_climatology_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lai.nc");
    let grid = small_grid();
    let constants = Constants::default();
    let times = climatology_times(2015, 36, 10);
    let values = MaskedArray::unmasked(Array4::from_elem((36, 11, 2, 2), 1.5));

    write_veg_climatology(&path, &grid, VegVariable::LeafAreaIndex, &times, &values, &constants).unwrap();

    let reader = NetCDFReader::open(&path).unwrap();
    assert_eq!(reader.dimension_len("time").unwrap(), 36);
    assert_eq!(reader.dimension_len("dim1").unwrap(), 11);
    assert_eq!(reader.string_attribute("time", "units").unwrap(), "hours since 1970-01-01 00:00:00");
    assert_eq!(
        reader.string_attribute("leaf_area_index", "cell_methods").unwrap(),
        "time: mean within days time: mean over years"
    );
    assert_eq!(
        reader.string_attribute("leaf_area_index", "um_stash_source").unwrap(),
        "m01s00i217"
    );
    let time = reader.read_coordinate("time").unwrap();
    assert_eq!(time[0], 394680.0);
    assert_eq!(time[35] - time[0], 35.0 * 240.0);

    // Times and data must agree
    let short = MaskedArray::unmasked(Array4::from_elem((3, 11, 2, 2), 1.5));
    let result = write_veg_climatology(
        dir.path().join("bad.nc"),
        &grid,
        VegVariable::CanopyHeight,
        &times,
        &short,
        &constants,
    );
    assert!(result.is_err());
}

#[test]
fn test_irrig_schedule_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("irrig.nc");
    let coords = JulesCoords {
        lat: array![39.25, 39.75],
        lon: array![60.25, 60.75],
    };
    let time = TimeAxis {
        values: (0..4).map(|d| 394464 + 24 * d).collect(),
        units: "hours since 1970-01-01 00:00:00".to_string(),
        calendar: "gregorian".to_string(),
    };
    let mut schedule = Array4::<i32>::zeros((4, 15, 2, 2));
    schedule[[2, 9, 1, 0]] = 1;
    let levels: Vec<i32> = (1..=15).collect();

    write_irrig_schedule(&path, &coords, &time, &levels, &schedule).unwrap();

    let reader = NetCDFReader::open(&path).unwrap();
    assert_eq!(reader.variable_dims("irr_schedule").unwrap(), vec!["tstep", "dim0", "lat", "lon"]);
    assert_eq!(reader.string_attribute("irr_schedule", "standard_name").unwrap(), "irr_schedule");
    assert_eq!(reader.read_coordinate("tstep").unwrap()[3], 394536.0);
    let back = reader.read_array("irr_schedule").unwrap();
    assert_eq!(back[[2, 9, 1, 0]], 1.0);
    assert_eq!(back.sum(), 1.0);

    // Level count must match the schedule
    assert!(write_irrig_schedule(dir.path().join("bad.nc"), &coords, &time, &levels[..9], &schedule).is_err());
}

#[test]
fn test_overwrite_variable_checks_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frac.nc");
    let grid = small_grid();
    let frac = MaskedArray::unmasked(Array3::<f64>::zeros((15, 2, 2)));
    write_frac_ants(&path, &frac, &grid, &Constants::default()).unwrap();

    let mut updated = MaskedArray::unmasked(Array3::<f64>::zeros((15, 2, 2)));
    updated.data[[5, 0, 0]] = 1.0;
    overwrite_variable(&path, "land_cover_lccs", &updated).unwrap();
    let back = NetCDFReader::open(&path).unwrap().read_array("land_cover_lccs").unwrap();
    assert_eq!(back[[5, 0, 0]], 1.0);

    let wrong = MaskedArray::unmasked(Array3::<f64>::zeros((9, 2, 2)));
    assert!(overwrite_variable(&path, "land_cover_lccs", &wrong).is_err());
    assert!(overwrite_variable(&path, "frac", &updated).is_err());
}
