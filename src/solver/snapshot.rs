//! Snapshots handed to visualization at chosen steps.

use crate::solver::field::{Axis, Position, Unknown};
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::{avg, pad_with_boundaries};
use ndarray::{Array2, Array3};

/// State of the run at the end of a step. Borrowed, so sinks that keep
/// data must copy it.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub step: usize,
    pub time: f64,
    pub scalar: &'a Unknown,
    pub uvw: &'a [Unknown; 3],
    pub grid: &'a CartesianGrid,
    /// Normal of the plane to draw.
    pub normal: Axis,
}

/// Values on the middle plane normal to one axis, laid out with rows along
/// the second in-plane axis and columns along the first.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSlice {
    pub normal: Axis,
    /// Cell index of the plane along the normal.
    pub index: usize,
    /// In-plane axes, as (columns, rows).
    pub axes: [Axis; 2],
    pub xp: Vec<f64>,
    pub yp: Vec<f64>,
    pub scalar: Array2<f64>,
    pub up: Array2<f64>,
    pub vp: Array2<f64>,
}

impl Snapshot<'_> {
    /// Velocity components at cell centres. Staggered components are
    /// averaged from their faces, boundary faces included.
    pub fn collocated_velocities(&self) -> [Array3<f64>; 3] {
        Axis::ALL.map(|axis| {
            let comp = &self.uvw[axis.index()];
            match comp.pos {
                Position::Cell => comp.val.clone(),
                Position::Face(s) => avg(s, &pad_with_boundaries(comp, s)),
            }
        })
    }

    pub fn mid_plane(&self) -> PlaneSlice {
        let normal = self.normal;
        let axes = normal.others();
        let index = self.grid.rc[normal.index()] / 2;
        let cut = |a: &Array3<f64>| a.index_axis(normal.nd(), index).t().to_owned();
        let uvw = self.collocated_velocities();
        PlaneSlice {
            normal,
            index,
            axes,
            xp: self.grid.centers(axes[0]).to_vec(),
            yp: self.grid.centers(axes[1]).to_vec(),
            scalar: cut(&self.scalar.val),
            up: cut(&uvw[axes[0].index()]),
            vp: cut(&uvw[axes[1].index()]),
        }
    }
}

/// Receives snapshots; nothing flows back into the solver.
pub trait VisualizationSink {
    fn consume(&mut self, snapshot: &Snapshot<'_>);
}

impl<F> VisualizationSink for F
where
    F: FnMut(&Snapshot<'_>),
{
    fn consume(&mut self, snapshot: &Snapshot<'_>) {
        self(snapshot)
    }
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn consume(&mut self, _snapshot: &Snapshot<'_>) {}
}
