use crate::solver::error::{SolverError, SolverResult};
use crate::solver::field::{Axis, Position};
use crate::solver::operators::{avg_1d, dif_1d};
use ndarray::Array3;

/// Geometry of a structured Cartesian grid, built once from the node
/// coordinates along each axis.
///
/// Cells are indexed `(i, j, k)` along `(x, y, z)`. Staggered positions own
/// only the interior faces, so their resolution is one less along the
/// staggered axis.
#[derive(Clone, Debug)]
pub struct CartesianGrid {
    pub xn: Vec<f64>,
    pub yn: Vec<f64>,
    pub zn: Vec<f64>,
    pub xc: Vec<f64>,
    pub yc: Vec<f64>,
    pub zc: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Cell widths, broadcast to the cell resolution.
    pub dx: Array3<f64>,
    pub dy: Array3<f64>,
    pub dz: Array3<f64>,
    pub rc: [usize; 3],
    pub ru: [usize; 3],
    pub rv: [usize; 3],
    pub rw: [usize; 3],
    widths: [Vec<f64>; 3],
}

impl CartesianGrid {
    pub fn new(xn: Vec<f64>, yn: Vec<f64>, zn: Vec<f64>) -> SolverResult<Self> {
        for (axis, nodes) in [(Axis::X, &xn), (Axis::Y, &yn), (Axis::Z, &zn)] {
            if nodes.len() < 2 {
                return Err(SolverError::InvalidGrid(format!(
                    "{:?} needs at least two nodes, got {}",
                    axis,
                    nodes.len()
                )));
            }
            if nodes.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SolverError::InvalidGrid(format!(
                    "{:?} nodes must be strictly increasing",
                    axis
                )));
            }
        }

        let (nx, ny, nz) = (xn.len() - 1, yn.len() - 1, zn.len() - 1);
        let widths = [dif_1d(&xn), dif_1d(&yn), dif_1d(&zn)];
        let rc = [nx, ny, nz];

        let dx = Array3::from_shape_fn(rc, |(i, _, _)| widths[0][i]);
        let dy = Array3::from_shape_fn(rc, |(_, j, _)| widths[1][j]);
        let dz = Array3::from_shape_fn(rc, |(_, _, k)| widths[2][k]);

        Ok(Self {
            xc: avg_1d(&xn),
            yc: avg_1d(&yn),
            zc: avg_1d(&zn),
            xn,
            yn,
            zn,
            nx,
            ny,
            nz,
            dx,
            dy,
            dz,
            rc,
            ru: [nx.saturating_sub(1), ny, nz],
            rv: [nx, ny.saturating_sub(1), nz],
            rw: [nx, ny, nz.saturating_sub(1)],
            widths,
        })
    }

    /// Uniform grid of `n` cells per axis spanning `[0, size]`.
    pub fn uniform(n: [usize; 3], size: [f64; 3]) -> SolverResult<Self> {
        let axis_nodes = |cells: usize, length: f64| -> Vec<f64> {
            (0..=cells)
                .map(|i| length * i as f64 / cells.max(1) as f64)
                .collect()
        };
        Self::new(
            axis_nodes(n[0], size[0]),
            axis_nodes(n[1], size[1]),
            axis_nodes(n[2], size[2]),
        )
    }

    pub fn num_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn resolution(&self, pos: Position) -> [usize; 3] {
        match pos {
            Position::Cell => self.rc,
            Position::Face(Axis::X) => self.ru,
            Position::Face(Axis::Y) => self.rv,
            Position::Face(Axis::Z) => self.rw,
        }
    }

    pub fn nodes(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.xn,
            Axis::Y => &self.yn,
            Axis::Z => &self.zn,
        }
    }

    pub fn centers(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.xc,
            Axis::Y => &self.yc,
            Axis::Z => &self.zc,
        }
    }

    /// Cell widths along `axis`.
    pub fn cell_widths(&self, axis: Axis) -> &[f64] {
        &self.widths[axis.index()]
    }

    pub fn widths_3d(&self, axis: Axis) -> &Array3<f64> {
        match axis {
            Axis::X => &self.dx,
            Axis::Y => &self.dy,
            Axis::Z => &self.dz,
        }
    }

    /// Widths along `axis` of the control volumes around unknowns at `pos`.
    ///
    /// A control volume staggered along `axis` reaches from one cell centre
    /// to the next.
    pub fn cv_widths(&self, pos: Position, axis: Axis) -> Vec<f64> {
        let d = self.cell_widths(axis);
        if pos.is_staggered_along(axis) {
            avg_1d(d)
        } else {
            d.to_vec()
        }
    }

    /// Distances between neighbouring unknowns at `pos` along `axis`,
    /// including the distances to the two boundary values.
    ///
    /// The result has one more entry than the resolution along `axis`.
    pub fn neighbour_distances(&self, pos: Position, axis: Axis) -> Vec<f64> {
        let d = self.cell_widths(axis);
        if pos.is_staggered_along(axis) {
            return d.to_vec();
        }
        let n = d.len();
        let mut dist = Vec::with_capacity(n + 1);
        dist.push(0.5 * d[0]);
        dist.extend(avg_1d(d));
        dist.push(0.5 * d[n - 1]);
        dist
    }

    /// Control-volume volumes at `pos`.
    pub fn cv_volumes(&self, pos: Position) -> Array3<f64> {
        let [wx, wy, wz] = Axis::ALL.map(|axis| self.cv_widths(pos, axis));
        Array3::from_shape_fn(self.resolution(pos), |(i, j, k)| wx[i] * wy[j] * wz[k])
    }

    /// Areas of the control-volume faces normal to `axis` at `pos`.
    ///
    /// The result is one longer than the resolution along `axis`, covering
    /// both boundary faces.
    pub fn face_areas(&self, pos: Position, axis: Axis) -> Array3<f64> {
        let mut shape = self.resolution(pos);
        shape[axis.index()] += 1;
        let [a, b] = axis.others();
        let wa = self.cv_widths(pos, a);
        let wb = self.cv_widths(pos, b);
        Array3::from_shape_fn(shape, |(i, j, k)| {
            let idx = [i, j, k];
            wa[idx[a.index()]] * wb[idx[b.index()]]
        })
    }

    /// Binary obstacle mask (1 inside solids) from a per-cell predicate.
    pub fn obstacle_mask<F>(&self, is_solid: F) -> Array3<f64>
    where
        F: Fn(usize, usize, usize) -> bool,
    {
        Array3::from_shape_fn(self.rc, |(i, j, k)| if is_solid(i, j, k) { 1.0 } else { 0.0 })
    }
}
