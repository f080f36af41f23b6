use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use scrins::solver::field::{BcKind, Compass, Position, Unknown};
use scrins::solver::fvm::{create_matrix, flatten, Mode};
use scrins::solver::linear_solver::{solve_bicgstab, Preconditioner};
use scrins::solver::mesh::CartesianGrid;
use scrins::solver::options::{SimulationConfig, SolverConfig};
use scrins::solver::properties::{par, Properties};
use scrins::solver::stepper::ProjectionSolver;

fn obstacle_channel() -> ProjectionSolver {
    let grid = CartesianGrid::uniform([64, 16, 4], [1.0, 0.125, 0.125]).unwrap();
    let obst = grid.obstacle_mask(|i, j, _| j < 6 && i >= 16 + j && i < 22);
    let props = Properties::air(grid.rc);
    let config = SimulationConfig { dt: 0.002, ..SimulationConfig::default() };
    let mut solver = ProjectionSolver::new(grid, props, config)
        .unwrap()
        .with_obstacles(obst)
        .unwrap();
    let profile = par(0.1, &solver.grid.yn);
    for ((_, j, _), v) in solver.uvw[0].bnd_mut(Compass::West).val.indexed_iter_mut() {
        *v = profile[j];
    }
    solver.uvw[0].bnd_mut(Compass::East).set_kind(BcKind::Outlet);
    solver.initialize();
    solver
}

fn cpu_solver_step_benchmark(c: &mut Criterion) {
    let mut solver = obstacle_channel();

    let mut group = c.benchmark_group("cpu_solver_step");
    group.sample_size(10);
    group.bench_function("step", |b| {
        b.iter(|| {
            solver.step().unwrap();
        });
    });
    group.finish();
}

fn pressure_solve_benchmark(c: &mut Criterion) {
    let grid = CartesianGrid::uniform([32, 32, 32], [1.0, 1.0, 1.0]).unwrap();
    let p = Unknown::new("pressure", Position::Cell, grid.rc, BcKind::Neumann);
    let coef = Array3::from_elem(grid.rc, 0.01);
    let obst = Array3::zeros(grid.rc);
    let (a, _) = create_matrix(&p, &Array3::zeros(grid.rc), &coef, &grid, &obst, &Mode::Poisson).unwrap();
    let source = Array3::from_shape_fn(grid.rc, |(i, j, _)| {
        ((i as f64) * 0.3).sin() * ((j as f64) * 0.2).cos()
    });
    let mut b = flatten(&source);
    let mean = b.iter().sum::<f64>() / b.len() as f64;
    b.iter_mut().for_each(|v| *v -= mean);
    let tol = SolverConfig::default().tolerance();

    let mut group = c.benchmark_group("pressure_solve");
    group.sample_size(10);
    for (name, preconditioner) in [("none", Preconditioner::None), ("jacobi", Preconditioner::Jacobi)] {
        group.bench_function(name, |bench| {
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                solve_bicgstab(&a, &b, &mut x, tol, preconditioner)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, cpu_solver_step_benchmark, pressure_solve_benchmark);
criterion_main!(benches);
