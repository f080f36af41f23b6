//! Implicit convection-diffusion steps for temperature and momentum.

use crate::solver::boundary::{adj_n_bnds, adj_o_bnds, obst_zero_val, sync_face_boundaries};
use crate::solver::error::{check_shape, SolverResult};
use crate::solver::field::{Axis, Position, Unknown};
use crate::solver::fvm::{create_matrix, flatten, unflatten, Mode, ObstacleWall, TransportTerms};
use crate::solver::linear_solver::{solve_bicgstab, SolveReport, SparseMatrix};
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::avg;
use crate::solver::options::SolverConfig;
use crate::solver::projection::pressure_gradient;
use ndarray::Array3;
use rayon::prelude::*;

/// Solves `a x = b` starting from the current values of `phi` and stores
/// the result.
fn solve_into(phi: &mut Unknown, a: &SparseMatrix, b: &[f64], cfg: &SolverConfig) -> SolverResult<SolveReport> {
    let res = phi.resolution();
    let mut x = flatten(&phi.val);
    let report = solve_bicgstab(a, b, &mut x, cfg.tolerance(), cfg.preconditioner);
    cfg.accept(&phi.name, &report)?;
    phi.val = unflatten(x, res)?;
    Ok(report)
}

/// Advances the temperature by one step, carried by the face velocities.
///
/// `rho_cap` is the volumetric heat capacity and `kappa` the conductivity,
/// both at cell centres.
#[allow(clippy::too_many_arguments)]
pub fn calc_t(
    t: &mut Unknown,
    uvwf: &[Unknown; 3],
    rho_cap: &Array3<f64>,
    kappa: &Array3<f64>,
    dt: f64,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
    cfg: &SolverConfig,
) -> SolverResult<SolveReport> {
    let mode = Mode::Transport(TransportTerms {
        inertia: rho_cap,
        dt,
        advecting: uvwf,
        wall: ObstacleWall::NoFlux,
    });
    let (a, b) = create_matrix(t, &Array3::zeros(t.resolution()), kappa, grid, obst, &mode)?;
    let report = solve_into(t, &a, &b, cfg)?;
    adj_n_bnds(t);
    Ok(report)
}

/// Advances the cell-centred velocities by one step and rebuilds the face
/// velocities from them.
///
/// The accumulated pressure `p_tot` and the body forces `ef` (per unit
/// volume) enter explicitly. Each component is solved on its own, in
/// parallel. Face velocities are interpolated from the new cell values with
/// the cell pressure gradient replaced by the face one, then masked by the
/// obstacles and given the boundary values of the cell velocities.
#[allow(clippy::too_many_arguments)]
pub fn calc_uvw(
    uvw: &mut [Unknown; 3],
    uvwf: &mut [Unknown; 3],
    rho: &Array3<f64>,
    mu: &Array3<f64>,
    p_tot: &Unknown,
    ef: [&Array3<f64>; 3],
    dt: f64,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
    cfg: &SolverConfig,
) -> SolverResult<[SolveReport; 3]> {
    check_shape("density", &grid.rc, rho.shape())?;
    check_shape("accumulated pressure", &grid.rc, &p_tot.resolution())?;
    for force in ef {
        check_shape("body force", &grid.rc, force.shape())?;
    }
    let vol = grid.cv_volumes(Position::Cell);

    let advecting: &[Unknown; 3] = uvwf;
    let reports = uvw
        .as_mut_slice()
        .par_iter_mut()
        .zip(Axis::ALL.par_iter())
        .map(|(comp, &axis)| -> SolverResult<SolveReport> {
            let grad = pressure_gradient(p_tot, grid, axis, Position::Cell);
            let source = (ef[axis.index()] - &grad) * &vol;
            let mode = Mode::Transport(TransportTerms {
                inertia: rho,
                dt,
                advecting,
                wall: ObstacleWall::NoSlip,
            });
            let (a, b) = create_matrix(comp, &source, mu, grid, obst, &mode)?;
            solve_into(comp, &a, &b, cfg)
        })
        .collect::<SolverResult<Vec<_>>>()?;

    for comp in uvw.iter_mut() {
        adj_n_bnds(comp);
    }
    adj_o_bnds(uvw, grid, dt);

    for axis in Axis::ALL {
        let face = &mut uvwf[axis.index()];
        if face.val.is_empty() {
            continue;
        }
        let rho_f = avg(axis, rho);
        let cell_grad = pressure_gradient(p_tot, grid, axis, Position::Cell);
        let face_grad = pressure_gradient(p_tot, grid, axis, face.pos);
        let interpolated = avg(axis, &uvw[axis.index()].val);
        face.val = interpolated + (avg(axis, &cell_grad) - face_grad) * dt / rho_f;
        obst_zero_val(face.pos, &mut face.val, obst);
    }
    sync_face_boundaries(uvw, uvwf);

    Ok([reports[0], reports[1], reports[2]])
}
