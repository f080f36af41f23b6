//! Boundary closures and obstacle masking applied after each solve.

use crate::solver::field::{Axis, BcKind, Compass, Position, Unknown};
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::{avg, pad_zero_gradient};
use ndarray::{Array3, ArrayView3, Slice, Zip};

/// Outlet and inlet sums below this are treated as zero.
const FLUX_EPS: f64 = 1e-30;

/// Which values of an array at `pos` touch a solid cell.
///
/// Cell values are solid when their cell is; a face value is solid when
/// either of the two cells it separates is.
pub fn solid_mask(pos: Position, obst: &Array3<f64>) -> Array3<bool> {
    match pos {
        Position::Cell => obst.mapv(|v| v != 0.0),
        Position::Face(axis) => {
            let n = obst.len_of(axis.nd());
            if n == 0 {
                return Array3::from_elem(obst.dim(), false);
            }
            let lo = obst.slice_axis(axis.nd(), Slice::from(..n - 1));
            let hi = obst.slice_axis(axis.nd(), Slice::from(1..));
            Zip::from(&lo)
                .and(&hi)
                .map_collect(|&a, &b| a != 0.0 || b != 0.0)
        }
    }
}

/// Like [`solid_mask`] for faces along `axis`, but also covering the two
/// boundary faces: a boundary face is solid when its only cell is.
pub fn solid_faces_with_boundaries(axis: Axis, obst: &Array3<f64>) -> Array3<bool> {
    solid_mask(Position::Face(axis), &pad_zero_gradient(obst, axis))
}

/// Zeroes every value of `val` (living at `pos`) that touches an obstacle.
pub fn obst_zero_val(pos: Position, val: &mut Array3<f64>, obst: &Array3<f64>) {
    let mask = solid_mask(pos, obst);
    assert_eq!(
        val.dim(),
        mask.dim(),
        "obstacle mask does not match values at {:?}",
        pos
    );
    Zip::from(val).and(&mask).for_each(|v, &solid| {
        if solid {
            *v = 0.0;
        }
    });
}

fn end_slab<'a>(val: &'a Array3<f64>, side: Compass) -> Option<ArrayView3<'a, f64>> {
    let axis = side.axis();
    let n = val.len_of(axis.nd());
    if n == 0 {
        return None;
    }
    let range = if side.is_low() { Slice::from(..1) } else { Slice::from(n - 1..) };
    Some(val.slice_axis(axis.nd(), range))
}

/// Copies the adjacent interior value into every Neumann boundary cell.
pub fn adj_n_bnds(phi: &mut Unknown) {
    let Unknown { val, bnd, .. } = phi;
    for side in Compass::ALL {
        let Some(adjacent) = end_slab(val, side) else {
            continue;
        };
        let record = &mut bnd[side.index()];
        Zip::from(&mut record.val)
            .and(&record.kind)
            .and(&adjacent)
            .for_each(|b, &kind, &inner| {
                if kind == BcKind::Neumann {
                    *b = inner;
                }
            });
    }
}

/// Areas of the boundary cells of unknowns at `pos` on `side`.
fn boundary_areas(grid: &CartesianGrid, pos: Position, side: Compass) -> Array3<f64> {
    let axis = side.axis();
    grid.face_areas(pos, axis)
        .slice_axis(axis.nd(), Slice::from(..1))
        .to_owned()
}

#[derive(Debug, Default, Clone, Copy)]
struct BoundaryFluxes {
    /// Volume inflow through Dirichlet cells.
    inflow: f64,
    inflow_area: f64,
    /// Volume outflow through Dirichlet cells.
    fixed_outflow: f64,
    /// Volume outflow through outlet cells.
    outlet_flow: f64,
    outlet_area: f64,
}

fn boundary_fluxes(uvw: &[Unknown; 3], grid: &CartesianGrid) -> BoundaryFluxes {
    let mut sums = BoundaryFluxes::default();
    for side in Compass::ALL {
        let normal = &uvw[side.axis().index()];
        let areas = boundary_areas(grid, normal.pos, side);
        let record = normal.bnd(side);
        let sign = side.outward_sign();
        Zip::from(&record.kind)
            .and(&record.val)
            .and(&areas)
            .for_each(|&kind, &u, &area| {
                let outflow = sign * u * area;
                match kind {
                    BcKind::Dirichlet if outflow < 0.0 => {
                        sums.inflow -= outflow;
                        sums.inflow_area += area;
                    }
                    BcKind::Dirichlet => sums.fixed_outflow += outflow,
                    BcKind::Outlet => {
                        sums.outlet_flow += outflow;
                        sums.outlet_area += area;
                    }
                    BcKind::Neumann => {}
                }
            });
    }
    sums
}

/// Convective outflow condition for the cell-centred velocities.
///
/// Outlet values of every component are advected out of the domain with the
/// bulk inflow velocity; the normal components are then rescaled so the
/// outlet carries exactly the volume entering through Dirichlet cells.
/// Returns the scaling factor applied, or `None` when there is no outlet or
/// no inflow.
pub fn adj_o_bnds(uvw: &mut [Unknown; 3], grid: &CartesianGrid, dt: f64) -> Option<f64> {
    let before = boundary_fluxes(uvw, grid);
    if before.outlet_area <= 0.0 || before.inflow_area <= 0.0 {
        return None;
    }
    let u_bulk = before.inflow / before.inflow_area;

    for comp in uvw.iter_mut() {
        let Unknown { val, bnd, .. } = comp;
        for side in Compass::ALL {
            let Some(adjacent) = end_slab(val, side) else {
                continue;
            };
            let widths = grid.cell_widths(side.axis());
            let d = if side.is_low() { widths[0] } else { widths[widths.len() - 1] };
            let courant = u_bulk * dt / d;
            let record = &mut bnd[side.index()];
            Zip::from(&mut record.val)
                .and(&record.kind)
                .and(&adjacent)
                .for_each(|b, &kind, &inner| {
                    if kind == BcKind::Outlet {
                        *b -= courant * (*b - inner);
                    }
                });
        }
    }

    let after = boundary_fluxes(uvw, grid);
    let target = before.inflow - before.fixed_outflow;
    let uniform = target / after.outlet_area;
    let factor = if after.outlet_flow.abs() > FLUX_EPS {
        Some(target / after.outlet_flow)
    } else {
        None
    };

    for side in Compass::ALL {
        let sign = side.outward_sign();
        let record = uvw[side.axis().index()].bnd_mut(side);
        Zip::from(&mut record.val)
            .and(&record.kind)
            .for_each(|b, &kind| {
                if kind == BcKind::Outlet {
                    *b = match factor {
                        Some(f) => *b * f,
                        None => sign * uniform,
                    };
                }
            });
    }

    log::debug!(
        "outlet: bulk velocity {:e}, inflow {:e}, outflow {:e} -> {:e}",
        u_bulk,
        before.inflow,
        after.outlet_flow,
        target
    );
    Some(factor.unwrap_or(1.0))
}

/// Copies the boundary values of the cell-centred velocities onto the
/// matching face velocities, averaging where the face array is staggered
/// along the boundary.
pub fn sync_face_boundaries(uvw: &[Unknown; 3], uvwf: &mut [Unknown; 3]) {
    for axis in Axis::ALL {
        let cell = &uvw[axis.index()];
        let face = &mut uvwf[axis.index()];
        if face.val.len_of(axis.nd()) == 0 {
            continue;
        }
        for side in Compass::ALL {
            let src = &cell.bnd(side).val;
            let target = &mut face.bnd_mut(side).val;
            if side.axis() == axis {
                target.assign(src);
            } else {
                target.assign(&avg(axis, src));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocities(grid: &CartesianGrid) -> [Unknown; 3] {
        [
            Unknown::new("cell-u-vel", Position::Cell, grid.rc, BcKind::Dirichlet),
            Unknown::new("cell-v-vel", Position::Cell, grid.rc, BcKind::Dirichlet),
            Unknown::new("cell-w-vel", Position::Cell, grid.rc, BcKind::Dirichlet),
        ]
    }

    #[test]
    fn face_mask_marks_both_sides_of_a_solid_cell() {
        let mut obst = Array3::zeros((4, 1, 1));
        obst[[1, 0, 0]] = 1.0;
        let faces = solid_mask(Position::Face(Axis::X), &obst);
        assert_eq!(faces.iter().copied().collect::<Vec<_>>(), vec![true, true, false]);
        let with_bnd = solid_faces_with_boundaries(Axis::X, &obst);
        assert_eq!(
            with_bnd.iter().copied().collect::<Vec<_>>(),
            vec![false, true, true, false, false]
        );
    }

    #[test]
    fn neumann_cells_copy_interior_values() {
        let mut t = Unknown::new("temperature", Position::Cell, [3, 2, 1], BcKind::Neumann);
        t.val = Array3::from_shape_fn((3, 2, 1), |(i, j, _)| (10 * i + j) as f64);
        t.bnd_mut(Compass::South).kind[[2, 0, 0]] = BcKind::Dirichlet;
        t.bnd_mut(Compass::South).val[[2, 0, 0]] = -1.0;
        adj_n_bnds(&mut t);
        assert_eq!(t.bnd(Compass::West).val[[0, 1, 0]], 1.0);
        assert_eq!(t.bnd(Compass::East).val[[0, 1, 0]], 21.0);
        assert_eq!(t.bnd(Compass::North).val[[1, 0, 0]], 11.0);
        assert_eq!(t.bnd(Compass::South).val[[1, 0, 0]], 10.0);
        assert_eq!(t.bnd(Compass::South).val[[2, 0, 0]], -1.0);
        assert_eq!(t.bnd(Compass::Top).val[[2, 1, 0]], 21.0);
    }

    #[test]
    fn outlet_carries_the_inflow_volume() {
        let grid = CartesianGrid::uniform([4, 2, 1], [2.0, 1.0, 0.5]).unwrap();
        let mut uvw = velocities(&grid);
        uvw[0].bnd_mut(Compass::West).set_value(1.5);
        uvw[0].bnd_mut(Compass::East).set_kind(BcKind::Outlet);
        uvw[0].val.fill(0.7);

        let factor = adj_o_bnds(&mut uvw, &grid, 0.01);
        assert!(factor.is_some());

        let out: f64 = uvw[0].bnd(Compass::East).val.iter().map(|u| u * 0.5 * 0.5).sum();
        assert!((out - 1.5 * 1.0 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn outlet_is_untouched_without_inflow() {
        let grid = CartesianGrid::uniform([3, 3, 1], [1.0, 1.0, 1.0]).unwrap();
        let mut uvw = velocities(&grid);
        uvw[0].bnd_mut(Compass::East).set_kind(BcKind::Outlet);
        uvw[0].bnd_mut(Compass::East).set_value(0.3);
        assert_eq!(adj_o_bnds(&mut uvw, &grid, 0.1), None);
        assert!(uvw[0].bnd(Compass::East).val.iter().all(|&u| u == 0.3));
    }

    #[test]
    fn face_boundaries_follow_cell_boundaries() {
        let grid = CartesianGrid::uniform([3, 2, 2], [1.0, 1.0, 1.0]).unwrap();
        let mut uvw = velocities(&grid);
        let mut uvwf = [
            Unknown::new("face-u-vel", Position::Face(Axis::X), grid.ru, BcKind::Dirichlet),
            Unknown::new("face-v-vel", Position::Face(Axis::Y), grid.rv, BcKind::Dirichlet),
            Unknown::new("face-w-vel", Position::Face(Axis::Z), grid.rw, BcKind::Dirichlet),
        ];
        uvw[0].bnd_mut(Compass::West).set_value(2.0);
        uvw[0].bnd_mut(Compass::South).val =
            Array3::from_shape_fn((3, 1, 2), |(i, _, _)| i as f64);
        sync_face_boundaries(&uvw, &mut uvwf);
        assert!(uvwf[0].bnd(Compass::West).val.iter().all(|&u| u == 2.0));
        assert_eq!(uvwf[0].bnd(Compass::South).val.dim(), (2, 1, 2));
        assert_eq!(uvwf[0].bnd(Compass::South).val[[1, 0, 1]], 1.5);
    }
}
