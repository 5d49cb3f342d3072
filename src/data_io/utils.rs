/// Helpers for netCDF attributes and missing values
use netcdf::AttributeValue;

/// netCDF default fill for doubles
pub const NC_FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;
/// netCDF default fill for floats
pub const NC_FILL_FLOAT: f32 = 9.969_21e36;

/// Attributes that declare fill values
pub const FILL_ATTRIBUTES: &[&str] = &["_FillValue", "missing_value"];

/// Numeric value of a scalar (or first element of a vector) attribute
pub fn attribute_as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Float(v) => Some(*v as f64),
        AttributeValue::Int(v) => Some(*v as f64),
        AttributeValue::Short(v) => Some(*v as f64),
        AttributeValue::Schar(v) => Some(*v as f64),
        AttributeValue::Uchar(v) => Some(*v as f64),
        AttributeValue::Ushort(v) => Some(*v as f64),
        AttributeValue::Uint(v) => Some(*v as f64),
        AttributeValue::Longlong(v) => Some(*v as f64),
        AttributeValue::Ulonglong(v) => Some(*v as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
        AttributeValue::Ints(v) => v.first().map(|&x| x as f64),
        AttributeValue::Shorts(v) => v.first().map(|&x| x as f64),
        _ => None,
    }
}

/// Text of a string attribute
pub fn attribute_as_string(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s.clone()),
        AttributeValue::Strs(v) => v.first().cloned(),
        _ => None,
    }
}

/// Whether `value` should be treated as missing given the declared fill values
pub fn is_missing_value(value: f64, fill_values: &[f64]) -> bool {
    if value.is_nan() {
        return true;
    }
    fill_values
        .iter()
        .any(|&fill| value == fill || (fill.abs() > 1e30 && (value - fill).abs() <= fill.abs() * 1e-7))
}

/// Default fill values considered missing for any variable: the f8 and f4 defaults
pub fn default_fill_values() -> Vec<f64> {
    vec![NC_FILL_DOUBLE, NC_FILL_FLOAT as f64]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_as_f64() {
        assert_eq!(attribute_as_f64(&AttributeValue::Double(1.5)), Some(1.5));
        assert_eq!(attribute_as_f64(&AttributeValue::Int(-3)), Some(-3.0));
        assert_eq!(attribute_as_f64(&AttributeValue::Floats(vec![2.0, 3.0])), Some(2.0));
        assert_eq!(attribute_as_f64(&AttributeValue::Str("x".into())), None);
    }

    #[test]
    fn test_attribute_as_string() {
        assert_eq!(
            attribute_as_string(&AttributeValue::Str("degrees_east".into())),
            Some("degrees_east".to_string())
        );
        assert_eq!(attribute_as_string(&AttributeValue::Double(0.0)), None);
    }

    #[test]
    fn test_is_missing_value() {
        let fills = default_fill_values();
        assert!(is_missing_value(NC_FILL_DOUBLE, &fills));
        assert!(is_missing_value(NC_FILL_FLOAT as f64, &fills));
        assert!(is_missing_value(f64::NAN, &fills));
        assert!(!is_missing_value(0.0, &fills));
        assert!(is_missing_value(-9999.0, &[-9999.0]));
    }
}
