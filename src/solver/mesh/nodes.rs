use crate::solver::error::{SolverError, SolverResult};

/// How cell widths are distributed along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeSpacing {
    Uniform,
    /// Geometric growth from a prescribed first cell width.
    Start(f64),
    /// Geometric growth from both ends, with prescribed first and last widths.
    Both(f64, f64),
}

const RATIO_ITERATIONS: usize = 200;

/// Node coordinates of `n` cells spanning `[start, end]`.
pub fn nodes(start: f64, end: f64, n: usize, spacing: NodeSpacing) -> SolverResult<Vec<f64>> {
    if n == 0 {
        return Err(SolverError::InvalidGrid("at least one cell is required".into()));
    }
    if end <= start {
        return Err(SolverError::InvalidGrid(format!(
            "node range [{}, {}] is empty",
            start, end
        )));
    }
    let length = end - start;

    let widths = match spacing {
        NodeSpacing::Uniform => vec![length / n as f64; n],
        NodeSpacing::Start(first) => {
            check_width(first, length)?;
            let ratio = solve_ratio(length, |r| first * series(r, n))?;
            (0..n).map(|k| first * ratio.powi(k as i32)).collect()
        }
        NodeSpacing::Both(first, last) => {
            check_width(first, length)?;
            check_width(last, length)?;
            if n < 2 {
                return Err(SolverError::InvalidGrid(
                    "two-sided stretching needs at least two cells".into(),
                ));
            }
            let n_lo = n / 2;
            let n_hi = n - n_lo;
            let ratio = solve_ratio(length, |r| first * series(r, n_lo) + last * series(r, n_hi))?;
            let mut w: Vec<f64> = (0..n_lo).map(|k| first * ratio.powi(k as i32)).collect();
            w.extend((0..n_hi).rev().map(|k| last * ratio.powi(k as i32)));
            w
        }
    };

    let mut x = Vec::with_capacity(n + 1);
    x.push(start);
    let mut acc = start;
    for w in &widths {
        acc += w;
        x.push(acc);
    }
    // Remove round-off so the last node lands exactly on `end`.
    x[n] = end;
    Ok(x)
}

fn check_width(width: f64, length: f64) -> SolverResult<()> {
    if width > 0.0 && width < length {
        Ok(())
    } else {
        Err(SolverError::InvalidGrid(format!(
            "cell width {} does not fit into length {}",
            width, length
        )))
    }
}

/// 1 + r + r^2 + ... + r^(n-1)
fn series(r: f64, n: usize) -> f64 {
    let mut sum = 0.0;
    let mut term = 1.0;
    for _ in 0..n {
        sum += term;
        term *= r;
    }
    sum
}

/// Bisection for the growth ratio at which `total(r)` equals `length`.
/// `total` must increase with `r`.
fn solve_ratio<F>(length: f64, total: F) -> SolverResult<f64>
where
    F: Fn(f64) -> f64,
{
    let mut lo = 0.0;
    let mut hi = 1.0;
    while total(hi) < length {
        hi *= 2.0;
        if hi > 1e6 {
            return Err(SolverError::InvalidGrid(
                "no growth ratio reaches the requested length".into(),
            ));
        }
    }
    if total(lo) > length {
        return Err(SolverError::InvalidGrid(
            "prescribed end widths exceed the requested length".into(),
        ));
    }
    for _ in 0..RATIO_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if total(mid) < length {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}
