//! Volume balance and Courant number diagnostics.

use crate::solver::boundary::solid_faces_with_boundaries;
use crate::solver::error::{check_shape, SolverResult};
use crate::solver::field::{Axis, Position, Unknown};
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::{dif, pad_with_boundaries};
use ndarray::{Array3, Slice, Zip};

/// Net volumetric outflow of every cell, summed over its six faces.
///
/// Face velocities include the boundary values. With `obst`, every face
/// touching a solid cell carries no flux; without it the raw face values are
/// used and the result inside solid cells has no meaning.
pub fn vol_balance(
    uvwf: &[Unknown; 3],
    grid: &CartesianGrid,
    obst: Option<&Array3<f64>>,
) -> SolverResult<Array3<f64>> {
    if let Some(obst) = obst {
        check_shape("obstacle mask", &grid.rc, obst.shape())?;
    }
    let mut outflow = Array3::zeros(grid.rc);
    for axis in Axis::ALL {
        let face = &uvwf[axis.index()];
        check_shape(
            "face velocity",
            &grid.resolution(Position::Face(axis)),
            &face.resolution(),
        )?;

        let mut vel = pad_with_boundaries(face, axis);
        if let Some(obst) = obst {
            let solid = solid_faces_with_boundaries(axis, obst);
            Zip::from(&mut vel).and(&solid).for_each(|v, &s| {
                if s {
                    *v = 0.0;
                }
            });
        }

        let n = grid.rc[axis.index()];
        let areas = grid.face_areas(Position::Cell, axis);
        let areas = areas.slice_axis(axis.nd(), Slice::from(..n));
        outflow = outflow + dif(axis, &vel) * &areas;
    }
    Ok(outflow)
}

/// Largest `|u| dt / h` over the three components, `h` being the control
/// volume width of each value along its own direction.
pub fn cfl_max(uvw: &[Unknown; 3], dt: f64, grid: &CartesianGrid) -> f64 {
    let mut cfl: f64 = 0.0;
    for axis in Axis::ALL {
        let comp = &uvw[axis.index()];
        let widths = grid.cv_widths(comp.pos, axis);
        for (idx, &u) in comp.val.indexed_iter() {
            let along = [idx.0, idx.1, idx.2][axis.index()];
            cfl = cfl.max(u.abs() * dt / widths[along]);
        }
    }
    cfl
}
