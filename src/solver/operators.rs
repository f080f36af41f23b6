//! Averaging, differencing and concatenation on dense 3-D arrays.
//!
//! Every operator keeps an exact shape contract; a violated contract is a
//! programming error and panics.

use crate::solver::field::{Axis, Compass, Unknown};
use ndarray::{Array3, ArrayView3, Slice};

/// Mean of neighbouring values along `axis`; the result is one shorter.
pub fn avg(axis: Axis, a: &Array3<f64>) -> Array3<f64> {
    let n = a.len_of(axis.nd());
    assert!(n >= 2, "avg along {:?} needs at least two values, got {}", axis, n);
    let lo = a.slice_axis(axis.nd(), Slice::from(..n - 1));
    let hi = a.slice_axis(axis.nd(), Slice::from(1..));
    (&lo + &hi) * 0.5
}

/// Forward difference along `axis`; the result is one shorter.
pub fn dif(axis: Axis, a: &Array3<f64>) -> Array3<f64> {
    let n = a.len_of(axis.nd());
    assert!(n >= 2, "dif along {:?} needs at least two values, got {}", axis, n);
    let lo = a.slice_axis(axis.nd(), Slice::from(..n - 1));
    let hi = a.slice_axis(axis.nd(), Slice::from(1..));
    &hi - &lo
}

/// Joins arrays along `axis`. All other extents must agree.
pub fn cat(axis: Axis, parts: &[ArrayView3<'_, f64>]) -> Array3<f64> {
    assert!(!parts.is_empty(), "cat needs at least one array");
    ndarray::concatenate(axis.nd(), parts)
        .unwrap_or_else(|err| panic!("cat along {:?}: incompatible shapes ({})", axis, err))
}

/// 1-D neighbour mean, used on node coordinate arrays.
pub fn avg_1d(a: &[f64]) -> Vec<f64> {
    a.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

pub fn dif_1d(a: &[f64]) -> Vec<f64> {
    a.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Interior values of `phi` with its low and high boundary slabs attached
/// along `axis`. The result is two longer than the interior array.
pub fn pad_with_boundaries(phi: &Unknown, axis: Axis) -> Array3<f64> {
    cat(
        axis,
        &[
            phi.bnd(Compass::low(axis)).val.view(),
            phi.val.view(),
            phi.bnd(Compass::high(axis)).val.view(),
        ],
    )
}

/// Attaches copies of the first and last slabs along `axis`, i.e. a
/// zero-gradient extension for arrays that carry no boundary records.
pub fn pad_zero_gradient(a: &Array3<f64>, axis: Axis) -> Array3<f64> {
    let n = a.len_of(axis.nd());
    assert!(n >= 1, "cannot pad an empty array along {:?}", axis);
    cat(
        axis,
        &[
            a.slice_axis(axis.nd(), Slice::from(..1)),
            a.view(),
            a.slice_axis(axis.nd(), Slice::from(n - 1..)),
        ],
    )
}

/// Drops the first and last slab along `axis`.
pub fn strip_ends(a: &Array3<f64>, axis: Axis) -> Array3<f64> {
    let n = a.len_of(axis.nd());
    assert!(n >= 2, "cannot strip ends of {} values along {:?}", n, axis);
    a.slice_axis(axis.nd(), Slice::from(1..n - 1)).to_owned()
}
