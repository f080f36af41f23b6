// Properties of one pressure correction: divergence reduction, anchoring,
// obstacle zeroing and Neumann closure.

use scrins::solver::balance::vol_balance;
use scrins::solver::boundary::obst_zero_val;
use scrins::solver::field::{Axis, BcKind, Compass, Position, Unknown};
use scrins::solver::mesh::CartesianGrid;
use scrins::solver::options::SolverConfig;
use scrins::solver::projection::{anchor_mean, calc_p, corr_uvw};
use scrins::solver::SolverError;
use ndarray::Array3;

fn max_abs(a: &Array3<f64>) -> f64 {
    a.iter().fold(0.0_f64, |m, &v| m.max(v.abs()))
}

/// Face velocities with a deterministic, non-solenoidal pattern and closed
/// boundaries. Faces touching obstacles carry nothing.
fn stirred_faces(grid: &CartesianGrid, obst: &Array3<f64>) -> [Unknown; 3] {
    let mut uvwf = [
        Unknown::new("face-u-vel", Position::Face(Axis::X), grid.ru, BcKind::Dirichlet),
        Unknown::new("face-v-vel", Position::Face(Axis::Y), grid.rv, BcKind::Dirichlet),
        Unknown::new("face-w-vel", Position::Face(Axis::Z), grid.rw, BcKind::Dirichlet),
    ];
    for (a, face) in uvwf.iter_mut().enumerate() {
        face.val = Array3::from_shape_fn(face.resolution(), |(i, j, k)| {
            let x = (i * 7 + j * 13 + k * 5 + a * 3) as f64;
            (x * 0.37).sin() + 0.25 * (x * 1.3).cos()
        });
        obst_zero_val(face.pos, &mut face.val, obst);
    }
    uvwf
}

fn pressure(grid: &CartesianGrid) -> Unknown {
    Unknown::new("pressure", Position::Cell, grid.rc, BcKind::Neumann)
}

#[test]
fn correction_reduces_volume_error() {
    let grid = CartesianGrid::new(
        vec![0.0, 0.1, 0.25, 0.45, 0.7, 1.0, 1.2],
        vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
        vec![0.0, 0.3, 0.5, 0.6, 1.0],
    )
    .unwrap();
    let rho = Array3::from_shape_fn(grid.rc, |(i, _, _)| 1.0 + 0.1 * i as f64);
    let dt = 0.05;
    for obst in [
        Array3::zeros(grid.rc),
        grid.obstacle_mask(|i, j, _| i == 2 && j < 3),
    ] {
        let mut uvwf = stirred_faces(&grid, &obst);
        let mut p = pressure(&grid);
        let before = max_abs(&vol_balance(&uvwf, &grid, None).unwrap());
        let report = calc_p(&mut p, &uvwf, &rho, dt, &grid, &obst, &SolverConfig::default()).unwrap();
        assert!(report.solve.converged());
        assert!((report.max_error - before).abs() < 1e-15);

        corr_uvw(&mut uvwf, &p, &rho, dt, &grid, &obst).unwrap();
        let after = max_abs(&vol_balance(&uvwf, &grid, Some(&obst)).unwrap());
        assert!(after < before, "error grew from {:e} to {:e}", before, after);
        assert!(after < 1e-6 * before, "error after correction {:e}", after);
    }
}

#[test]
fn pressure_is_anchored_and_stable_under_reanchoring() {
    let grid = CartesianGrid::uniform([5, 4, 3], [1.0, 1.0, 1.0]).unwrap();
    let obst = Array3::zeros(grid.rc);
    let uvwf = stirred_faces(&grid, &obst);
    let mut p = pressure(&grid);
    let rho = Array3::from_elem(grid.rc, 1.0);
    calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &SolverConfig::default()).unwrap();
    assert!(p.val.mean().unwrap().abs() < 1e-12);
    assert!(max_abs(&p.val) > 0.0);

    let once = p.val.clone();
    anchor_mean(&mut p.val);
    assert!(p.val.iter().zip(once.iter()).all(|(a, b)| (a - b).abs() < 1e-14));
}

#[test]
fn obstacle_cells_end_at_exactly_zero() {
    for (n, solid) in [
        ([3, 3, 3], vec![[1, 1, 1]]),
        ([6, 4, 1], vec![[2, 0, 0], [2, 1, 0], [3, 1, 0]]),
        ([4, 5, 2], vec![[0, 0, 0], [3, 4, 1], [1, 2, 0], [1, 2, 1]]),
    ] {
        let grid = CartesianGrid::uniform(n, [1.0, 1.5, 0.5]).unwrap();
        let mut obst = Array3::zeros(grid.rc);
        for idx in &solid {
            obst[*idx] = 1.0;
        }
        let uvwf = stirred_faces(&grid, &obst);
        let mut p = pressure(&grid);
        let rho = Array3::from_elem(grid.rc, 1.2);
        calc_p(&mut p, &uvwf, &rho, 0.01, &grid, &obst, &SolverConfig::default()).unwrap();
        for idx in &solid {
            assert_eq!(p.val[*idx], 0.0, "cell {:?} of {:?}", idx, n);
        }
    }
}

#[test]
fn centre_obstacle_of_a_five_cube() {
    let grid = CartesianGrid::uniform([5, 5, 5], [1.0, 1.0, 1.0]).unwrap();
    let mut obst = Array3::zeros(grid.rc);
    obst[[2, 2, 2]] = 1.0;
    // Raw face values around the obstacle are left in place on purpose.
    let uvwf = stirred_faces(&grid, &Array3::zeros(grid.rc));
    let mut p = pressure(&grid);
    let rho = Array3::from_elem(grid.rc, 1.0);
    let cfg = SolverConfig { max_iter: 5, ..SolverConfig::default() };
    calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &cfg).unwrap();
    assert_eq!(p.val[[2, 2, 2]], 0.0);
}

#[test]
fn neumann_boundaries_follow_the_interior() {
    let grid = CartesianGrid::uniform([4, 3, 2], [2.0, 1.0, 1.0]).unwrap();
    let obst = Array3::zeros(grid.rc);
    let uvwf = stirred_faces(&grid, &obst);
    let mut p = pressure(&grid);
    let rho = Array3::from_elem(grid.rc, 1.0);
    calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &SolverConfig::default()).unwrap();

    let (nx, ny, nz) = p.val.dim();
    for j in 0..ny {
        for k in 0..nz {
            assert_eq!(p.bnd(Compass::West).val[[0, j, k]], p.val[[0, j, k]]);
            assert_eq!(p.bnd(Compass::East).val[[0, j, k]], p.val[[nx - 1, j, k]]);
        }
    }
    for i in 0..nx {
        for k in 0..nz {
            assert_eq!(p.bnd(Compass::South).val[[i, 0, k]], p.val[[i, 0, k]]);
            assert_eq!(p.bnd(Compass::North).val[[i, 0, k]], p.val[[i, ny - 1, k]]);
        }
        for j in 0..ny {
            assert_eq!(p.bnd(Compass::Bottom).val[[i, j, 0]], p.val[[i, j, 0]]);
            assert_eq!(p.bnd(Compass::Top).val[[i, j, 0]], p.val[[i, j, nz - 1]]);
        }
    }
}

#[test]
fn quiescent_four_cube_gives_zero_pressure() {
    let grid = CartesianGrid::uniform([4, 4, 4], [1.0, 1.0, 1.0]).unwrap();
    let obst = Array3::zeros(grid.rc);
    let uvwf = [
        Unknown::new("face-u-vel", Position::Face(Axis::X), grid.ru, BcKind::Dirichlet),
        Unknown::new("face-v-vel", Position::Face(Axis::Y), grid.rv, BcKind::Dirichlet),
        Unknown::new("face-w-vel", Position::Face(Axis::Z), grid.rw, BcKind::Dirichlet),
    ];
    let mut p = pressure(&grid);
    let rho = Array3::from_elem(grid.rc, 1.0);
    let cfg = SolverConfig::default();
    let report = calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &cfg).unwrap();
    assert!(report.solve.converged());
    assert!(report.solve.iterations < cfg.max_iter);
    assert!(p.val.iter().all(|&v| v == 0.0));
    assert_eq!(report.net_imbalance, 0.0);
}

#[test]
fn enclosed_fluid_pocket_does_not_abort_the_solve() {
    let grid = CartesianGrid::uniform([3, 3, 1], [1.0, 1.0, 1.0]).unwrap();
    // The staircase seals off the corner cell (0, 0).
    let obst = grid.obstacle_mask(|i, j, _| i + j == 1);
    let rho = Array3::from_elem(grid.rc, 1.0);
    let cfg = SolverConfig::default();

    let still = [
        Unknown::new("face-u-vel", Position::Face(Axis::X), grid.ru, BcKind::Dirichlet),
        Unknown::new("face-v-vel", Position::Face(Axis::Y), grid.rv, BcKind::Dirichlet),
        Unknown::new("face-w-vel", Position::Face(Axis::Z), grid.rw, BcKind::Dirichlet),
    ];
    let mut p = pressure(&grid);
    let report = calc_p(&mut p, &still, &rho, 0.1, &grid, &obst, &cfg).unwrap();
    assert!(report.solve.converged());
    assert!(p.val.iter().all(|&v| v == 0.0));

    let stirred = stirred_faces(&grid, &obst);
    let mut p = pressure(&grid);
    calc_p(&mut p, &stirred, &rho, 0.1, &grid, &obst, &cfg).unwrap();
    assert_eq!(p.val[[0, 1, 0]], 0.0);
    assert_eq!(p.val[[1, 0, 0]], 0.0);
    assert!(p.val.iter().all(|v| v.is_finite()));
}

#[test]
fn strict_mode_turns_an_unconverged_pressure_solve_into_an_error() {
    let grid = CartesianGrid::uniform([6, 6, 6], [1.0, 1.0, 1.0]).unwrap();
    let obst = Array3::zeros(grid.rc);
    let uvwf = stirred_faces(&grid, &obst);
    let rho = Array3::from_elem(grid.rc, 1.0);
    let capped = SolverConfig { max_iter: 2, ..SolverConfig::default() };

    let mut p = pressure(&grid);
    let err = calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &capped.strict()).unwrap_err();
    assert!(matches!(
        err,
        SolverError::NotConverged { ref unknown, iterations, .. } if unknown == "pressure" && iterations <= 2
    ));

    let mut p = pressure(&grid);
    let report = calc_p(&mut p, &uvwf, &rho, 0.1, &grid, &obst, &capped).unwrap();
    assert!(!report.solve.converged());
    assert!(max_abs(&p.val) > 0.0);
    assert!(p.val.mean().unwrap().abs() < 1e-12);
}
