//! Compressed sparse row matrix and a preconditioned BiCGStab solver.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wide::f64x4;

/// Row count above which matrix-vector products run on the rayon pool.
const PARALLEL_ROWS: usize = 32_768;
const BREAKDOWN: f64 = 1e-300;

#[derive(Clone, Debug)]
pub struct SparseMatrix {
    pub values: Vec<f64>,
    pub col_indices: Vec<usize>,
    pub row_offsets: Vec<usize>,
    pub n_rows: usize,
    pub n_cols: usize,
}

impl SparseMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            values: Vec::new(),
            col_indices: Vec::new(),
            row_offsets: vec![0; n_rows + 1],
            n_rows,
            n_cols,
        }
    }

    /// Builds a CSR matrix. Entries within a row keep their insertion order;
    /// duplicates are kept and summed by every product.
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut row_counts = vec![0; n_rows];
        for &(r, c, _) in triplets {
            assert!(r < n_rows && c < n_cols, "triplet ({}, {}) outside {}x{}", r, c, n_rows, n_cols);
            row_counts[r] += 1;
        }

        let mut row_offsets = vec![0; n_rows + 1];
        for i in 0..n_rows {
            row_offsets[i + 1] = row_offsets[i] + row_counts[i];
        }

        let mut mat = Self::new(n_rows, n_cols);
        mat.values = vec![0.0; triplets.len()];
        mat.col_indices = vec![0; triplets.len()];

        let mut cursor = row_offsets.clone();
        for &(r, c, v) in triplets {
            let idx = cursor[r];
            mat.values[idx] = v;
            mat.col_indices[idx] = c;
            cursor[r] += 1;
        }
        mat.row_offsets = row_offsets;

        mat
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_offsets[r]..self.row_offsets[r + 1];
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Value at `(r, c)`, summing duplicates; zero when absent.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.row(r).filter(|&(col, _)| col == c).map(|(_, v)| v).sum()
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, i)).collect()
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n_rows).all(|r| {
            self.row(r)
                .all(|(c, _)| (self.get(r, c) - self.get(c, r)).abs() <= tol)
        })
    }

    fn row_dot(&self, i: usize, x: &[f64]) -> f64 {
        let mut sum = 0.0;
        for j in self.row_offsets[i]..self.row_offsets[i + 1] {
            sum += self.values[j] * x[self.col_indices[j]];
        }
        sum
    }

    pub fn mat_vec_mul(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols);
        assert_eq!(y.len(), self.n_rows);

        if self.n_rows >= PARALLEL_ROWS {
            y.par_iter_mut()
                .enumerate()
                .for_each(|(i, yi)| *yi = self.row_dot(i, x));
        } else {
            for (i, yi) in y.iter_mut().enumerate() {
                *yi = self.row_dot(i, x);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preconditioner {
    None,
    #[default]
    Jacobi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Converged,
    MaxIterationsReached,
    /// A BiCGStab scalar vanished before the tolerance was met.
    Breakdown,
    Diverged,
}

/// Outcome of one linear solve. Always returned, converged or not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual: f64,
    pub initial_residual: f64,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Stopping criteria for [`solve_bicgstab`].
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
    pub max_iter: usize,
}

struct Jacobi {
    inv_diag: Vec<f64>,
}

impl Jacobi {
    fn new(a: &SparseMatrix, kind: Preconditioner) -> Self {
        let inv_diag = match kind {
            Preconditioner::None => vec![1.0; a.n_rows],
            Preconditioner::Jacobi => a
                .diagonal()
                .into_iter()
                .map(|d| if d.abs() > BREAKDOWN { 1.0 / d } else { 1.0 })
                .collect(),
        };
        Self { inv_diag }
    }

    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = r.len();
        let mut i = 0;
        while i + 4 <= n {
            let vr = f64x4::from(&r[i..i + 4]);
            let vd = f64x4::from(&self.inv_diag[i..i + 4]);
            let res: [f64; 4] = (vr * vd).into();
            z[i..i + 4].copy_from_slice(&res);
            i += 4;
        }
        while i < n {
            z[i] = r[i] * self.inv_diag[i];
            i += 1;
        }
    }
}

/// Right-preconditioned BiCGStab. `x` holds the initial guess on entry and
/// the best iterate on exit, whatever the returned status.
pub fn solve_bicgstab(
    a: &SparseMatrix,
    b: &[f64],
    x: &mut [f64],
    tol: Tolerance,
    preconditioner: Preconditioner,
) -> SolveReport {
    let n = b.len();
    assert_eq!(a.n_rows, n);
    assert_eq!(x.len(), n);

    let m = Jacobi::new(a, preconditioner);

    // r = b - Ax
    let mut r = vec![0.0; n];
    a.mat_vec_mul(x, &mut r);
    let mut i = 0;
    while i + 4 <= n {
        let vb = f64x4::from(&b[i..i + 4]);
        let vr = f64x4::from(&r[i..i + 4]);
        let res: [f64; 4] = (vb - vr).into();
        r[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        r[i] = b[i] - r[i];
        i += 1;
    }

    let threshold = (tol.rtol * norm(b)).max(tol.atol);
    let init_resid = norm(&r);
    let report = |status, iterations, residual| SolveReport {
        status,
        iterations,
        residual,
        initial_residual: init_resid,
    };
    if init_resid <= threshold {
        return report(SolveStatus::Converged, 0, init_resid);
    }

    let r0 = r.clone();
    let mut rho_old = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v = vec![0.0; n];
    let mut p = vec![0.0; n];
    let mut p_hat = vec![0.0; n];
    let mut s = vec![0.0; n];
    let mut s_hat = vec![0.0; n];
    let mut t = vec![0.0; n];

    let mut resid = init_resid;

    for iter in 0..tol.max_iter {
        let rho_new = dot(&r0, &r);
        if rho_new.is_nan() {
            log::warn!("BiCGStab: rho is NaN at iteration {}", iter);
            return report(SolveStatus::Diverged, iter, f64::NAN);
        }
        if rho_new.abs() < BREAKDOWN {
            return report(SolveStatus::Breakdown, iter, resid);
        }

        if iter == 0 {
            p.copy_from_slice(&r);
        } else {
            let beta = (rho_new / rho_old) * (alpha / omega);
            let v_beta = f64x4::splat(beta);
            let v_omega = f64x4::splat(omega);
            let mut i = 0;
            while i + 4 <= n {
                let vr = f64x4::from(&r[i..i + 4]);
                let vp = f64x4::from(&p[i..i + 4]);
                let vv = f64x4::from(&v[i..i + 4]);
                let res: [f64; 4] = (vr + v_beta * (vp - v_omega * vv)).into();
                p[i..i + 4].copy_from_slice(&res);
                i += 4;
            }
            while i < n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
                i += 1;
            }
        }

        m.apply(&p, &mut p_hat);
        a.mat_vec_mul(&p_hat, &mut v);
        let r0_v = dot(&r0, &v);
        if r0_v.abs() < BREAKDOWN {
            return report(SolveStatus::Breakdown, iter, resid);
        }
        alpha = rho_new / r0_v;

        axpy_into(&r, -alpha, &v, &mut s);

        let s_norm = norm(&s);
        if s_norm <= threshold {
            axpy_in_place(x, alpha, &p_hat);
            return report(SolveStatus::Converged, iter + 1, s_norm);
        }

        m.apply(&s, &mut s_hat);
        a.mat_vec_mul(&s_hat, &mut t);
        let t_t = dot(&t, &t);
        omega = if t_t < BREAKDOWN { 0.0 } else { dot(&t, &s) / t_t };

        let v_alpha = f64x4::splat(alpha);
        let v_omega = f64x4::splat(omega);
        let mut i = 0;
        while i + 4 <= n {
            let vx = f64x4::from(&x[i..i + 4]);
            let vp = f64x4::from(&p_hat[i..i + 4]);
            let vs = f64x4::from(&s_hat[i..i + 4]);
            let vss = f64x4::from(&s[i..i + 4]);
            let vt = f64x4::from(&t[i..i + 4]);

            let res_x: [f64; 4] = (vx + v_alpha * vp + v_omega * vs).into();
            let res_r: [f64; 4] = (vss - v_omega * vt).into();

            x[i..i + 4].copy_from_slice(&res_x);
            r[i..i + 4].copy_from_slice(&res_r);
            i += 4;
        }
        while i < n {
            x[i] += alpha * p_hat[i] + omega * s_hat[i];
            r[i] = s[i] - omega * t[i];
            i += 1;
        }

        resid = norm(&r);
        if !resid.is_finite() || resid > 1e10 * init_resid.max(1.0) {
            log::warn!("BiCGStab diverging at iteration {}: residual {:e}", iter, resid);
            return report(SolveStatus::Diverged, iter + 1, resid);
        }
        if resid <= threshold {
            return report(SolveStatus::Converged, iter + 1, resid);
        }
        if omega.abs() < BREAKDOWN {
            return report(SolveStatus::Breakdown, iter + 1, resid);
        }

        rho_old = rho_new;
    }

    report(SolveStatus::MaxIterationsReached, tol.max_iter, resid)
}

/// out = a + alpha * b
fn axpy_into(a: &[f64], alpha: f64, b: &[f64], out: &mut [f64]) {
    let n = a.len();
    let v_alpha = f64x4::splat(alpha);
    let mut i = 0;
    while i + 4 <= n {
        let va = f64x4::from(&a[i..i + 4]);
        let vb = f64x4::from(&b[i..i + 4]);
        let res: [f64; 4] = (va + v_alpha * vb).into();
        out[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        out[i] = a[i] + alpha * b[i];
        i += 1;
    }
}

fn axpy_in_place(x: &mut [f64], alpha: f64, b: &[f64]) {
    for (xi, bi) in x.iter_mut().zip(b) {
        *xi += alpha * bi;
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = f64x4::splat(0.0);
    let mut i = 0;
    let n = a.len();
    while i + 4 <= n {
        let va = f64x4::from(&a[i..i + 4]);
        let vb = f64x4::from(&b[i..i + 4]);
        sum += va * vb;
        i += 4;
    }
    let mut s = sum.reduce_add();
    while i < n {
        s += a[i] * b[i];
        i += 1;
    }
    s
}

pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplacian_1d(n: usize) -> SparseMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        SparseMatrix::from_triplets(n, n, &triplets)
    }

    fn tight() -> Tolerance {
        Tolerance {
            rtol: 1e-12,
            atol: 1e-14,
            max_iter: 500,
        }
    }

    #[test]
    fn triplets_keep_row_structure() {
        let mat = laplacian_1d(5);
        assert_eq!(mat.nnz(), 13);
        assert_eq!(mat.get(2, 1), -1.0);
        assert_eq!(mat.get(0, 4), 0.0);
        assert_eq!(mat.diagonal(), vec![2.0; 5]);
        assert!(mat.is_symmetric(0.0));
    }

    #[test]
    fn duplicate_entries_are_summed() {
        let mat = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (0, 0, 2.0), (1, 1, 1.0)]);
        assert_eq!(mat.get(0, 0), 3.0);
        let mut y = vec![0.0; 2];
        mat.mat_vec_mul(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 1.0]);
    }

    #[test]
    fn bicgstab_solves_spd_system() {
        let n = 37;
        let mat = laplacian_1d(n);
        let exact: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut b = vec![0.0; n];
        mat.mat_vec_mul(&exact, &mut b);

        for pc in [Preconditioner::None, Preconditioner::Jacobi] {
            let mut x = vec![0.0; n];
            let report = solve_bicgstab(&mat, &b, &mut x, tight(), pc);
            assert!(report.converged(), "{:?}: {:?}", pc, report);
            for (xi, ei) in x.iter().zip(&exact) {
                assert!((xi - ei).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn bicgstab_solves_nonsymmetric_system() {
        let n = 20;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 3.0));
            if i > 0 {
                triplets.push((i, i - 1, -2.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -0.5));
            }
        }
        let mat = SparseMatrix::from_triplets(n, n, &triplets);
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let report = solve_bicgstab(&mat, &b, &mut x, tight(), Preconditioner::Jacobi);
        assert!(report.converged());
        let mut ax = vec![0.0; n];
        mat.mat_vec_mul(&x, &mut ax);
        assert!(ax.iter().zip(&b).all(|(l, r)| (l - r).abs() < 1e-9));
    }

    #[test]
    fn zero_rhs_converges_without_iterating() {
        let mat = laplacian_1d(8);
        let mut x = vec![0.0; 8];
        let report = solve_bicgstab(&mat, &[0.0; 8], &mut x, tight(), Preconditioner::Jacobi);
        assert_eq!(report.status, SolveStatus::Converged);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn iteration_cap_is_reported_not_hidden() {
        let n = 200;
        let mat = laplacian_1d(n);
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let tol = Tolerance {
            rtol: 1e-14,
            atol: 0.0,
            max_iter: 2,
        };
        let report = solve_bicgstab(&mat, &b, &mut x, tol, Preconditioner::None);
        assert_eq!(report.status, SolveStatus::MaxIterationsReached);
        assert_eq!(report.iterations, 2);
        assert!(report.residual.is_finite());
        assert!(report.initial_residual > 0.0);
    }
}
