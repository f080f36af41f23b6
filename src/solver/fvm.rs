//! Seven-point finite-volume assembly on the structured grid.
//!
//! Unknowns are flattened row-major over their own resolution `(r0, r1, r2)`:
//! `c = (i * r1 + j) * r2 + k`, so neighbours along X, Y and Z sit at
//! `c ± r1 * r2`, `c ± r2` and `c ± 1`.

use crate::solver::boundary::solid_mask;
use crate::solver::error::{check_shape, SolverError, SolverResult};
use crate::solver::field::{Axis, BcKind, Compass, Position, Unknown};
use crate::solver::linear_solver::SparseMatrix;
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::{avg, pad_with_boundaries, pad_zero_gradient};
use ndarray::{Array3, Slice, Zip};

/// Row-major strides of an array with resolution `res`.
pub fn strides(res: [usize; 3]) -> [usize; 3] {
    [res[1] * res[2], res[2], 1]
}

pub fn flat_index(res: [usize; 3], idx: [usize; 3]) -> usize {
    (idx[0] * res[1] + idx[1]) * res[2] + idx[2]
}

/// Values of `a` in row-major order.
pub fn flatten(a: &Array3<f64>) -> Vec<f64> {
    a.iter().copied().collect()
}

pub fn unflatten(values: Vec<f64>, res: [usize; 3]) -> SolverResult<Array3<f64>> {
    let len = values.len();
    Array3::from_shape_vec(res, values)
        .map_err(|_| SolverError::shape_mismatch("flattened values", &[res.iter().product::<usize>()], &[len]))
}

/// How a fluid row treats a neighbour inside an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleWall {
    /// Zero flux through the obstacle surface (pressure, temperature).
    NoFlux,
    /// Zero value on the obstacle surface (velocity components).
    NoSlip,
}

/// Extra terms of a time-dependent convection-diffusion equation.
#[derive(Debug, Clone, Copy)]
pub struct TransportTerms<'a> {
    /// Coefficient of the time derivative at cell centres (`rho`, `rho * cap`).
    pub inertia: &'a Array3<f64>,
    pub dt: f64,
    /// Face velocities carrying the unknown.
    pub advecting: &'a [Unknown; 3],
    pub wall: ObstacleWall,
}

#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Pure diffusion operator with harmonic face coefficients and no-flux
    /// obstacle walls.
    Poisson,
    /// Unsteady upwind convection with arithmetic face coefficients.
    Transport(TransportTerms<'a>),
}

impl Mode<'_> {
    fn wall(&self) -> ObstacleWall {
        match self {
            Mode::Poisson => ObstacleWall::NoFlux,
            Mode::Transport(terms) => terms.wall,
        }
    }

    fn face_mean(&self, a: f64, b: f64) -> f64 {
        match self {
            Mode::Poisson => {
                let sum = a + b;
                if sum == 0.0 {
                    0.0
                } else {
                    2.0 * a * b / sum
                }
            }
            Mode::Transport(_) => 0.5 * (a + b),
        }
    }
}

/// Cell-centred array moved to the positions of `pos`.
fn at_position(pos: Position, a: &Array3<f64>) -> Array3<f64> {
    match pos {
        Position::Cell => a.clone(),
        Position::Face(axis) => avg(axis, a),
    }
}

/// Diffusion coefficient on the control-volume faces normal to `axis`,
/// one longer than the resolution along `axis`.
fn face_coefficients(mode: &Mode, pos: Position, axis: Axis, coef: &Array3<f64>) -> Array3<f64> {
    if pos.is_staggered_along(axis) {
        // Faces of a staggered control volume are the cell centres.
        return coef.clone();
    }
    let padded = pad_zero_gradient(&at_position(pos, coef), axis);
    let n = padded.len_of(axis.nd());
    let lo = padded.slice_axis(axis.nd(), Slice::from(..n - 1));
    let hi = padded.slice_axis(axis.nd(), Slice::from(1..));
    Zip::from(&lo).and(&hi).map_collect(|&a, &b| mode.face_mean(a, b))
}

/// Volume fluxes through the control-volume faces normal to `axis`,
/// positive along `+axis`.
fn face_fluxes(grid: &CartesianGrid, pos: Position, axis: Axis, advecting: &Unknown) -> Array3<f64> {
    let mut vel = pad_with_boundaries(advecting, axis);
    if let Position::Face(s) = pos {
        vel = avg(s, &vel);
    }
    vel * grid.face_areas(pos, axis)
}

struct AxisTerms {
    conductance: Array3<f64>,
    flux: Option<Array3<f64>>,
}

fn check_inputs(
    phi: &Unknown,
    source: &Array3<f64>,
    coef: &Array3<f64>,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
    mode: &Mode,
) -> SolverResult<()> {
    let res = grid.resolution(phi.pos);
    check_shape("unknown", &res, &phi.resolution())?;
    check_shape("source", &res, source.shape())?;
    check_shape("diffusion coefficient", &grid.rc, coef.shape())?;
    check_shape("obstacle mask", &grid.rc, obst.shape())?;
    if let Mode::Transport(terms) = mode {
        check_shape("inertia", &grid.rc, terms.inertia.shape())?;
        for axis in Axis::ALL {
            let face = &terms.advecting[axis.index()];
            check_shape(
                "advecting velocity",
                &grid.resolution(Position::Face(axis)),
                &face.resolution(),
            )?;
        }
    }
    Ok(())
}

/// Assembles the linear system for `phi`.
///
/// `source` is the explicit, volume-integrated contribution of each control
/// volume and `coef` the cell-centred diffusivity (`dt / rho` for pressure).
/// Rows of unknowns inside obstacles are identity with a zero right-hand
/// side, and no fluid row references them. In Poisson mode a fluid row with
/// no coupling at all is written the same way.
pub fn create_matrix(
    phi: &Unknown,
    source: &Array3<f64>,
    coef: &Array3<f64>,
    grid: &CartesianGrid,
    obst: &Array3<f64>,
    mode: &Mode,
) -> SolverResult<(SparseMatrix, Vec<f64>)> {
    check_inputs(phi, source, coef, grid, obst, mode)?;

    let pos = phi.pos;
    let res = grid.resolution(pos);
    let n: usize = res.iter().product();
    if n == 0 {
        return Ok((SparseMatrix::from_triplets(0, 0, &[]), Vec::new()));
    }
    let stride = strides(res);
    let solid = solid_mask(pos, obst);

    let terms: Vec<AxisTerms> = Axis::ALL
        .iter()
        .map(|&axis| {
            let dist = grid.neighbour_distances(pos, axis);
            let mut conductance = face_coefficients(mode, pos, axis, coef) * grid.face_areas(pos, axis);
            for (f, mut lane) in conductance.axis_iter_mut(axis.nd()).enumerate() {
                lane /= dist[f];
            }
            let flux = match mode {
                Mode::Poisson => None,
                Mode::Transport(t) => Some(face_fluxes(grid, pos, axis, &t.advecting[axis.index()])),
            };
            AxisTerms { conductance, flux }
        })
        .collect();

    let unsteady = match mode {
        Mode::Poisson => None,
        Mode::Transport(t) => {
            Some(at_position(pos, t.inertia) * grid.cv_volumes(pos) / t.dt)
        }
    };
    let wall = mode.wall();

    let mut triplets = Vec::with_capacity(7 * n);
    let mut rhs = vec![0.0; n];

    for ((i, j, k), &is_solid) in solid.indexed_iter() {
        let idx = [i, j, k];
        let c = flat_index(res, idx);
        if is_solid {
            triplets.push((c, c, 1.0));
            continue;
        }

        let row_start = triplets.len();
        let mut diag = 0.0;
        let mut b = source[idx];
        if let Some(m) = &unsteady {
            diag += m[idx];
            b += m[idx] * phi.old[idx];
        }

        for axis in Axis::ALL {
            let a = axis.index();
            let at = &terms[a];
            for high in [false, true] {
                let mut face = idx;
                if high {
                    face[a] += 1;
                }
                let d = at.conductance[face];
                // Volume flux leaving this control volume.
                let f_out = at.flux.as_ref().map_or(0.0, |fl| if high { fl[face] } else { -fl[face] });

                let interior = if high { idx[a] + 1 < res[a] } else { idx[a] > 0 };
                if interior {
                    let nb = if high { c + stride[a] } else { c - stride[a] };
                    let mut nb_idx = idx;
                    if high {
                        nb_idx[a] += 1;
                    } else {
                        nb_idx[a] -= 1;
                    }
                    if solid[nb_idx] {
                        if wall == ObstacleWall::NoSlip {
                            diag += d;
                        }
                        continue;
                    }
                    diag += d + f_out.max(0.0);
                    triplets.push((c, nb, -(d + (-f_out).max(0.0))));
                    continue;
                }

                let side = if high { Compass::high(axis) } else { Compass::low(axis) };
                let mut slab = idx;
                slab[a] = 0;
                let record = phi.bnd(side);
                match record.kind[slab] {
                    BcKind::Dirichlet => {
                        diag += d + f_out.max(0.0);
                        b += (d + (-f_out).max(0.0)) * record.val[slab];
                    }
                    BcKind::Neumann | BcKind::Outlet => {
                        if f_out > 0.0 {
                            diag += f_out;
                        } else {
                            b -= f_out * phi.old[idx];
                        }
                    }
                }
            }
        }

        if diag == 0.0 && matches!(mode, Mode::Poisson) {
            // Pocket enclosed by obstacles and no-flux walls: decoupled.
            triplets.truncate(row_start);
            triplets.push((c, c, 1.0));
            continue;
        }
        if diag <= 0.0 {
            return Err(SolverError::SingularSystem {
                unknown: phi.name.clone(),
                row: c,
                diagonal: diag,
            });
        }
        triplets.push((c, c, diag));
        rhs[c] = b;
    }

    Ok((SparseMatrix::from_triplets(n, n, &triplets), rhs))
}
