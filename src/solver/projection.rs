//! Pressure correction and velocity projection.

use crate::solver::balance::vol_balance;
use crate::solver::boundary::{adj_n_bnds, obst_zero_val};
use crate::solver::error::{check_shape, SolverResult};
use crate::solver::field::{Axis, Position, Unknown};
use crate::solver::fvm::{create_matrix, unflatten, Mode};
use crate::solver::linear_solver::{solve_bicgstab, SolveReport};
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::{avg, dif, pad_with_boundaries, strip_ends};
use crate::solver::options::SolverConfig;
use ndarray::Array3;
use serde::Serialize;

/// Diagnostics of one pressure correction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PressureReport {
    /// Largest cell imbalance of the incoming face velocities.
    pub max_error: f64,
    /// Sum of the cell imbalances of the incoming face velocities.
    pub net_imbalance: f64,
    pub solve: SolveReport,
}

/// Gradient of `p` along `axis` on the cell faces, boundary faces included.
fn face_gradient(p: &Unknown, grid: &CartesianGrid, axis: Axis) -> Array3<f64> {
    let mut grad = dif(axis, &pad_with_boundaries(p, axis));
    let dist = grid.neighbour_distances(Position::Cell, axis);
    for (f, mut lane) in grad.axis_iter_mut(axis.nd()).enumerate() {
        lane /= dist[f];
    }
    grad
}

/// Gradient of the cell-centred `p` along `axis`, evaluated at `pos`.
///
/// Cell values average the two face gradients; staggered values along
/// `axis` use the difference across the face.
pub fn pressure_gradient(p: &Unknown, grid: &CartesianGrid, axis: Axis, pos: Position) -> Array3<f64> {
    let faces = face_gradient(p, grid, axis);
    match pos {
        Position::Cell => avg(axis, &faces),
        Position::Face(s) if s == axis => strip_ends(&faces, axis),
        Position::Face(s) => avg(s, &avg(axis, &faces)),
    }
}

/// Shifts `val` to zero mean. Applying it twice changes nothing.
pub fn anchor_mean(val: &mut Array3<f64>) {
    if let Some(mean) = val.mean() {
        *val -= mean;
    }
}

/// Solves the pressure correction equation for the face velocities `uvwf`.
///
/// The source is the imbalance of the face velocities without obstacle
/// masking; obstacles enter only through the operator and the final
/// zeroing. The result is anchored to zero mean and its Neumann boundary
/// values follow the interior.
pub fn calc_p(
    p: &mut Unknown,
    uvwf: &[Unknown; 3],
    rho: &Array3<f64>,
    dt: f64,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
    cfg: &SolverConfig,
) -> SolverResult<PressureReport> {
    check_shape("density", &grid.rc, rho.shape())?;
    let res = grid.rc;
    let coef = rho.mapv(|r| dt / r);

    let imbalance = vol_balance(uvwf, grid, None)?;
    let max_error = imbalance.fold(0.0_f64, |m, &e| m.max(e.abs()));
    let net_imbalance = imbalance.sum();
    log::info!("Maximum volume error before correction: {:12.5e}", max_error);
    log::info!("Volume imbalance before correction    : {:12.5e}", net_imbalance);

    // The corrected outflow is `imbalance + A p`.
    let (a, b) = create_matrix(p, &-imbalance, &coef, grid, obst, &Mode::Poisson)?;

    let mut x = vec![0.0; b.len()];
    let solve = solve_bicgstab(&a, &b, &mut x, cfg.tolerance(), cfg.preconditioner);
    cfg.accept(&p.name, &solve)?;

    p.val = unflatten(x, res)?;
    anchor_mean(&mut p.val);
    if obst.iter().any(|&o| o != 0.0) {
        obst_zero_val(p.pos, &mut p.val, obst);
    }
    adj_n_bnds(p);

    Ok(PressureReport {
        max_error,
        net_imbalance,
        solve,
    })
}

/// Subtracts `dt / rho * grad p` from every component of `uvw`.
///
/// Components may be cell-centred or staggered along their own axis; values
/// touching obstacles are zeroed afterwards.
pub fn corr_uvw(
    uvw: &mut [Unknown; 3],
    p: &Unknown,
    rho: &Array3<f64>,
    dt: f64,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
) -> SolverResult<()> {
    check_shape("density", &grid.rc, rho.shape())?;
    check_shape("obstacle mask", &grid.rc, obst.shape())?;
    check_shape("pressure", &grid.rc, &p.resolution())?;
    let has_obstacles = obst.iter().any(|&o| o != 0.0);

    for axis in Axis::ALL {
        let comp = &mut uvw[axis.index()];
        check_shape("velocity", &grid.resolution(comp.pos), &comp.resolution())?;
        if comp.val.is_empty() {
            continue;
        }
        let rho_at = match comp.pos {
            Position::Cell => rho.clone(),
            Position::Face(s) => avg(s, rho),
        };
        let grad = pressure_gradient(p, grid, axis, comp.pos);
        comp.val = &comp.val - &(grad * dt / rho_at);
        if has_obstacles {
            obst_zero_val(comp.pos, &mut comp.val, obst);
        }
    }
    Ok(())
}
