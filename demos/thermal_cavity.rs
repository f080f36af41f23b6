//! Thermally driven cavity at Ra = 1e6, in non-dimensional form.
//!
//! The west wall is cold, the east wall hot; the temperature itself is the
//! vertical body force.

use scrins::solver::field::Compass;
use scrins::solver::mesh::{nodes, CartesianGrid, NodeSpacing};
use scrins::solver::options::SimulationConfig;
use scrins::solver::properties::Properties;
use scrins::solver::snapshot::Snapshot;
use scrins::solver::stepper::{Buoyancy, ProjectionSolver};
use scrins::solver::{Axis, BcKind, SolverResult};
use scrins::trace::LogDiagnostics;

const GRASHOF: f64 = 1.4105e6;
const PRANDTL: f64 = 0.7058;

fn main() -> SolverResult<()> {
    env_logger::init();

    let xn = nodes(0.0, 1.0, 64, NodeSpacing::Both(1.0 / 256.0, 1.0 / 256.0))?;
    let yn = nodes(0.0, 1.0, 64, NodeSpacing::Both(1.0 / 256.0, 1.0 / 256.0))?;
    let zn = nodes(0.0, 0.1, 5, NodeSpacing::Uniform)?;
    let grid = CartesianGrid::new(xn, yn, zn)?;
    let props = Properties::uniform(
        grid.rc,
        1.0,
        1.0 / GRASHOF.sqrt(),
        1.0,
        1.0 / (PRANDTL * GRASHOF.sqrt()),
    );

    let config = SimulationConfig {
        dt: 0.02,
        steps: 1000,
        plot_every: 100,
        ..SimulationConfig::default()
    };
    let mut solver = ProjectionSolver::new(grid, props, config)?
        .with_temperature()
        .with_buoyancy(Buoyancy {
            axis: Axis::Y,
            coefficient: 1.0,
            reference: 0.0,
        });

    for comp in solver.uvw.iter_mut() {
        for side in [Compass::Bottom, Compass::Top] {
            comp.bnd_mut(side).set_kind(BcKind::Neumann);
        }
    }
    if let Some(t) = &mut solver.t {
        t.bnd_mut(Compass::West).set_kind(BcKind::Dirichlet);
        t.bnd_mut(Compass::West).set_value(-0.5);
        t.bnd_mut(Compass::East).set_kind(BcKind::Dirichlet);
        t.bnd_mut(Compass::East).set_value(0.5);
    }
    solver.initialize();

    let mut plot = |snap: &Snapshot<'_>| {
        let slice = snap.mid_plane();
        let peak = slice.vp.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        log::info!("step {}: peak vertical velocity on mid plane {:.4e}", snap.step, peak);
    };
    solver.run(&mut LogDiagnostics, &mut plot)
}
