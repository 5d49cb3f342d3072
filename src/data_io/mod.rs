pub mod geotiff;
pub mod reader;
pub mod subset;
pub mod utils;
pub mod writer;

pub use geotiff::*;
pub use reader::*;
pub use subset::*;
pub use writer::*;

use ndarray::{Array, ArrayView, Axis, Dimension, Ix2, IxDyn, RemoveAxis};

/// Gridded values paired with a missing-data mask (`true` = missing)
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray<D: Dimension> {
    pub data: Array<f64, D>,
    pub mask: Array<bool, D>,
}

pub type MaskedArray2 = MaskedArray<Ix2>;
pub type MaskedArrayD = MaskedArray<IxDyn>;

impl<D: Dimension> MaskedArray<D> {
    pub fn new(data: Array<f64, D>, mask: Array<bool, D>) -> Result<Self, String> {
        if data.shape() != mask.shape() {
            return Err(format!(
                "Mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                data.shape()
            ));
        }
        Ok(Self { data, mask })
    }

    /// Wrap data with nothing masked
    pub fn unmasked(data: Array<f64, D>) -> Self {
        let mask = Array::from_elem(data.raw_dim(), false);
        Self { data, mask }
    }

    /// Mask every element matching `is_missing`
    pub fn from_data<F>(data: Array<f64, D>, is_missing: F) -> Self
    where
        F: Fn(f64) -> bool,
    {
        let mask = data.mapv(|v| is_missing(v));
        Self { data, mask }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Copy of the data with missing elements replaced by `value`
    pub fn filled(&self, value: f64) -> Array<f64, D> {
        let mut out = self.data.clone();
        ndarray::Zip::from(&mut out)
            .and(&self.mask)
            .for_each(|v, &missing| {
                if missing {
                    *v = value;
                }
            });
        out
    }

    pub fn count_missing(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Reverse the order of one axis in both data and mask
    pub fn flip_axis(&mut self, axis: Axis) {
        self.data.invert_axis(axis);
        self.mask.invert_axis(axis);
        // Materialise the flipped layout so later raw-slice writes see it
        self.data = self.data.as_standard_layout().to_owned();
        self.mask = self.mask.as_standard_layout().to_owned();
    }
}

impl MaskedArrayD {
    pub fn into_dimensionality<D2: Dimension>(self) -> Result<MaskedArray<D2>, String> {
        let shape = self.data.shape().to_vec();
        let data = self
            .data
            .into_dimensionality::<D2>()
            .map_err(|_| format!("Unexpected array rank for shape {:?}", shape))?;
        let mask = self
            .mask
            .into_dimensionality::<D2>()
            .map_err(|_| format!("Unexpected array rank for shape {:?}", shape))?;
        Ok(MaskedArray { data, mask })
    }
}

/// Stack 2D masked layers along a new leading axis
pub fn stack_masked<D>(layers: &[MaskedArray<D>]) -> Result<MaskedArray<D::Larger>, String>
where
    D: Dimension,
    D::Larger: RemoveAxis,
{
    if layers.is_empty() {
        return Err("No layers to stack".to_string());
    }
    let data: Vec<ArrayView<f64, D>> = layers.iter().map(|l| l.data.view()).collect();
    let mask: Vec<ArrayView<bool, D>> = layers.iter().map(|l| l.mask.view()).collect();
    let data = ndarray::stack(Axis(0), &data).map_err(|e| e.to_string())?;
    let mask = ndarray::stack(Axis(0), &mask).map_err(|e| e.to_string())?;
    Ok(MaskedArray { data, mask })
}
