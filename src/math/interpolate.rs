use ndarray::{Array2, Array4, ArrayView2, Axis, Zip};
use num_traits::Float;

/// Generic linear interpolation between two values
pub fn lin_interp<T: Float>(v0: T, v1: T, fac: T) -> T {
    v0 + (v1 - v0) * fac
}

/// Parallel linear interpolation between two masked 2D slices.
/// A cell is missing in the result when it is missing in either input.
pub fn lin_interp_masked2d<T>(
    v0: ArrayView2<T>,
    m0: ArrayView2<bool>,
    v1: ArrayView2<T>,
    m1: ArrayView2<bool>,
    fac: T,
) -> (Array2<T>, Array2<bool>)
where
    T: Float + Copy + Send + Sync,
{
    let mut result = Array2::zeros(v0.dim());
    let mut mask = Array2::from_elem(v0.dim(), false);

    Zip::from(&mut result)
        .and(&mut mask)
        .and(v0)
        .and(m0)
        .and(v1)
        .and(m1)
        .par_for_each(|res, missing, &val0, &miss0, &val1, &miss1| {
            if miss0 || miss1 {
                *res = T::zero();
                *missing = true;
            } else {
                *res = lin_interp(val0, val1, fac);
            }
        });

    (result, mask)
}

/// Locate the interval `[times[i], times[i+1]]` containing `target` and
/// the fractional position within it. `times` must be increasing.
pub fn find_time_bracket(times: &[f64], target: f64) -> Option<(usize, f64)> {
    if times.len() < 2 || target < times[0] || target > times[times.len() - 1] {
        return None;
    }

    // First index whose time is strictly after the target
    let upper = times.partition_point(|&t| t <= target);
    let i = upper.saturating_sub(1).min(times.len() - 2);
    let span = times[i + 1] - times[i];
    let fac = if span.abs() < f64::EPSILON {
        0.0
    } else {
        (target - times[i]) / span
    };
    Some((i, fac))
}

/// Linearly interpolate a periodic `[time, level, lat, lon]` series onto
/// `targets`. The last step is wrapped to before the first and the first to
/// after the last, each shifted by `period`. All times share one unit.
pub fn interp_periodic(
    times: &[f64],
    data: &Array4<f64>,
    mask: &Array4<bool>,
    period: f64,
    targets: &[f64],
) -> Result<(Array4<f64>, Array4<bool>), String> {
    let nt = data.len_of(Axis(0));
    if times.len() != nt || mask.dim() != data.dim() {
        return Err(format!(
            "Time axis length {} does not match data shape {:?}",
            times.len(),
            data.shape()
        ));
    }
    if nt == 0 {
        return Err("Cannot interpolate an empty series".to_string());
    }

    // Extended axis: [last - period, times..., first + period]
    let mut extended = Vec::with_capacity(nt + 2);
    extended.push(times[nt - 1] - period);
    extended.extend_from_slice(times);
    extended.push(times[0] + period);
    let source_index = |k: usize| -> usize {
        match k {
            0 => nt - 1,
            k if k == nt + 1 => 0,
            k => k - 1,
        }
    };

    let (_, nlev, ny, nx) = data.dim();
    let mut out = Array4::<f64>::zeros((targets.len(), nlev, ny, nx));
    let mut out_mask = Array4::from_elem((targets.len(), nlev, ny, nx), false);

    for (n, &target) in targets.iter().enumerate() {
        let (k, fac) = find_time_bracket(&extended, target).ok_or_else(|| {
            format!(
                "Target time {} outside periodic range [{}, {}]",
                target,
                extended[0],
                extended[nt + 1]
            )
        })?;
        let (i0, i1) = (source_index(k), source_index(k + 1));

        for lev in 0..nlev {
            let (values, missing) = lin_interp_masked2d(
                data.slice(ndarray::s![i0, lev, .., ..]),
                mask.slice(ndarray::s![i0, lev, .., ..]),
                data.slice(ndarray::s![i1, lev, .., ..]),
                mask.slice(ndarray::s![i1, lev, .., ..]),
                fac,
            );
            out.slice_mut(ndarray::s![n, lev, .., ..]).assign(&values);
            out_mask.slice_mut(ndarray::s![n, lev, .., ..]).assign(&missing);
        }
    }

    Ok((out, out_mask))
}
