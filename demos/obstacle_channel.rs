//! Air flowing through a flat channel past a wedge-shaped obstacle.

use scrins::solver::field::{BcKind, Compass};
use scrins::solver::mesh::{nodes, CartesianGrid, NodeSpacing};
use scrins::solver::options::SimulationConfig;
use scrins::solver::properties::{par, Properties};
use scrins::solver::snapshot::Snapshot;
use scrins::solver::stepper::ProjectionSolver;
use scrins::solver::SolverResult;
use scrins::trace::{LogDiagnostics, TraceCase, TraceWriter};

fn main() -> SolverResult<()> {
    env_logger::init();

    let xn = nodes(0.0, 1.0, 256, NodeSpacing::Uniform)?;
    let yn = nodes(0.0, 0.125, 32, NodeSpacing::Uniform)?;
    let zn = nodes(0.0, 0.125, 4, NodeSpacing::Uniform)?;
    let grid = CartesianGrid::new(xn, yn.clone(), zn)?;
    let props = Properties::air(grid.rc);

    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig {
            dt: 0.002,
            steps: 5000,
            plot_every: 20,
            ..SimulationConfig::default()
        },
    };

    let obst = grid.obstacle_mask(|i, j, _| j < 24 && i >= 64 + j && i < 88);
    let mut solver = ProjectionSolver::new(grid, props, config)?.with_obstacles(obst)?;

    let profile = par(0.1, &yn);
    for ((_, j, _), v) in solver.uvw[0].bnd_mut(Compass::West).val.indexed_iter_mut() {
        *v = profile[j];
    }
    solver.uvw[0].bnd_mut(Compass::East).set_kind(BcKind::Outlet);
    solver.initialize();

    let mut plot = |snap: &Snapshot<'_>| {
        let slice = snap.mid_plane();
        let (lo, hi) = slice
            .scalar
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        log::info!(
            "step {}: {} on plane {:?}={} ranges {:.4e} .. {:.4e}",
            snap.step,
            snap.scalar.name,
            slice.normal,
            slice.index,
            lo,
            hi
        );
    };

    match std::env::var("SCRINS_TRACE") {
        Ok(path) => {
            let mut trace = TraceWriter::create(path, TraceCase::describe("obstacle channel", &solver))?;
            solver.run(&mut trace, &mut plot)?;
            trace.close()
        }
        Err(_) => solver.run(&mut LogDiagnostics, &mut plot),
    }
}
