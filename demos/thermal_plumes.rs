//! Channel flow over a heated floor; warm fluid rises in plumes.

use scrins::solver::field::{BcKind, Compass};
use scrins::solver::mesh::{nodes, CartesianGrid, NodeSpacing};
use scrins::solver::options::SimulationConfig;
use scrins::solver::properties::{par, Properties};
use scrins::solver::snapshot::Snapshot;
use scrins::solver::stepper::{Buoyancy, ProjectionSolver};
use scrins::solver::{Axis, SolverResult};
use scrins::trace::LogDiagnostics;

fn main() -> SolverResult<()> {
    env_logger::init();

    let xn = nodes(0.0, 10.0, 300, NodeSpacing::Uniform)?;
    let yn = nodes(0.0, 1.0, 40, NodeSpacing::Both(1.0 / 500.0, 1.0 / 500.0))?;
    let zn = nodes(0.0, 3.0, 3, NodeSpacing::Uniform)?;
    let grid = CartesianGrid::new(xn, yn.clone(), zn)?;
    let props = Properties::uniform(grid.rc, 1.0, 0.1, 1.0, 0.15);

    let config = SimulationConfig {
        dt: 0.003,
        steps: 1500,
        plot_every: 150,
        accumulate_pressure: false,
        ..SimulationConfig::default()
    };
    let mut solver = ProjectionSolver::new(grid, props, config)?
        .with_temperature()
        .with_buoyancy(Buoyancy {
            axis: Axis::Y,
            coefficient: 150.0,
            reference: 0.0,
        });

    let profile = par(1.0, &yn);
    let [u, v, w] = &mut solver.uvw;
    for ((_, j, _), val) in u.bnd_mut(Compass::West).val.indexed_iter_mut() {
        *val = profile[j];
    }
    u.bnd_mut(Compass::East).set_kind(BcKind::Outlet);
    u.bnd_mut(Compass::East).set_value(1.0);
    for side in [Compass::Bottom, Compass::Top] {
        for comp in [&mut *u, &mut *v, &mut *w] {
            comp.bnd_mut(side).set_kind(BcKind::Neumann);
        }
    }
    u.val.fill(1.0);

    if let Some(t) = &mut solver.t {
        let yc = solver.grid.yc.clone();
        t.bnd_mut(Compass::West).set_kind(BcKind::Dirichlet);
        for ((_, j, _), val) in t.bnd_mut(Compass::West).val.indexed_iter_mut() {
            *val = 1.0 - yc[j];
        }
        t.bnd_mut(Compass::South).set_kind(BcKind::Dirichlet);
        t.bnd_mut(Compass::South).set_value(1.0);
        t.bnd_mut(Compass::North).set_kind(BcKind::Dirichlet);
        t.bnd_mut(Compass::North).set_value(0.0);
    }
    solver.initialize();

    let mut plot = |snap: &Snapshot<'_>| {
        let slice = snap.mid_plane();
        let peak = slice.vp.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        log::info!("step {}: peak vertical velocity {:.4e}", snap.step, peak);
    };
    solver.run(&mut LogDiagnostics, &mut plot)
}
