//! Jacobi kernels over the interior index space.
//!
//! Every kernel comes in one flavour per [`ExecutionMode`]. The parallel
//! flavour hands the index space to rayon through `ndarray::Zip`; returning
//! from the call is the barrier between the update and the buffer swap.

use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Bulk data-parallel dispatch on the rayon pool.
    #[default]
    Parallel,
    /// Same kernels on the calling thread.
    Serial,
}

/// One relaxation step: writes every interior cell of `unew` from `u` and `f`.
///
/// Boundary cells of `unew` are left untouched. Grids with fewer than three
/// rows or columns have no interior and are left as they are.
pub fn jacobi_update(
    u: &Array2<f64>,
    f: &Array2<f64>,
    unew: &mut Array2<f64>,
    h2: f64,
    mode: ExecutionMode,
) {
    let (ny, nx) = u.dim();
    debug_assert_eq!(f.dim(), u.dim());
    debug_assert_eq!(unew.dim(), u.dim());
    if ny < 3 || nx < 3 {
        return;
    }

    let zip = Zip::from(unew.slice_mut(s![1..ny - 1, 1..nx - 1]))
        .and(u.slice(s![..ny - 2, 1..nx - 1]))
        .and(u.slice(s![2.., 1..nx - 1]))
        .and(u.slice(s![1..ny - 1, ..nx - 2]))
        .and(u.slice(s![1..ny - 1, 2..]))
        .and(f.slice(s![1..ny - 1, 1..nx - 1]));

    let kernel = |out: &mut f64, &up: &f64, &down: &f64, &left: &f64, &right: &f64, &src: &f64| {
        *out = 0.25 * (up + down + left + right - h2 * src);
    };

    match mode {
        ExecutionMode::Parallel => zip.par_for_each(kernel),
        ExecutionMode::Serial => zip.for_each(kernel),
    }
}

/// Squared L2 norm of `a - b` over interior cells.
pub fn diff_norm2(a: &Array2<f64>, b: &Array2<f64>, mode: ExecutionMode) -> f64 {
    let (ny, nx) = a.dim();
    debug_assert_eq!(a.dim(), b.dim());
    if ny < 3 || nx < 3 {
        return 0.0;
    }

    let zip = Zip::from(a.slice(s![1..ny - 1, 1..nx - 1])).and(b.slice(s![1..ny - 1, 1..nx - 1]));
    match mode {
        ExecutionMode::Parallel => zip.par_fold(
            || 0.0,
            |acc, &x, &y| {
                let d = x - y;
                acc + d * d
            },
            |l, r| l + r,
        ),
        ExecutionMode::Serial => zip.fold(0.0, |acc, &x, &y| {
            let d = x - y;
            acc + d * d
        }),
    }
}

/// Sum of interior cells.
pub fn interior_sum(a: &Array2<f64>, mode: ExecutionMode) -> f64 {
    let (ny, nx) = a.dim();
    if ny < 3 || nx < 3 {
        return 0.0;
    }

    let zip = Zip::from(a.slice(s![1..ny - 1, 1..nx - 1]));
    match mode {
        ExecutionMode::Parallel => zip.par_fold(|| 0.0, |acc, &x| acc + x, |l, r| l + r),
        ExecutionMode::Serial => zip.fold(0.0, |acc, &x| acc + x),
    }
}
