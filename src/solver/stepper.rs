//! Time-step driver of the projection method.

use crate::solver::balance::{cfl_max, vol_balance};
use crate::solver::boundary::{adj_n_bnds, sync_face_boundaries};
use crate::solver::error::{check_shape, SolverResult};
use crate::solver::field::{Axis, BcKind, Position, Unknown};
use crate::solver::linear_solver::SolveReport;
use crate::solver::mesh::CartesianGrid;
use crate::solver::operators::avg;
use crate::solver::options::SimulationConfig;
use crate::solver::projection::{calc_p, corr_uvw};
use crate::solver::properties::Properties;
use crate::solver::snapshot::{Snapshot, VisualizationSink};
use crate::solver::transport::{calc_t, calc_uvw};
use crate::trace::DiagnosticsSink;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Body force `coefficient * (t - reference)` per unit volume along `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buoyancy {
    pub axis: Axis,
    pub coefficient: f64,
    pub reference: f64,
}

/// Scalar metrics of one time step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepDiagnostics {
    pub step: usize,
    pub time: f64,
    pub max_error_before: f64,
    pub net_imbalance_before: f64,
    pub max_error_after: f64,
    pub cfl: f64,
    pub pressure: SolveReport,
    pub momentum: [SolveReport; 3],
    pub temperature: Option<SolveReport>,
}

/// Collocated projection solver: cell-centred velocities, face velocities
/// for fluxes, pressure correction on cells.
pub struct ProjectionSolver {
    pub grid: CartesianGrid,
    pub uvw: [Unknown; 3],
    pub uvwf: [Unknown; 3],
    pub p: Unknown,
    pub p_tot: Unknown,
    pub t: Option<Unknown>,
    pub props: Properties,
    pub obst: Array3<f64>,
    pub buoyancy: Option<Buoyancy>,
    pub config: SimulationConfig,
    pub time: f64,
    pub step_count: usize,
}

impl ProjectionSolver {
    /// Fluid at rest with no-slip walls, Neumann pressure and no obstacles.
    pub fn new(grid: CartesianGrid, props: Properties, config: SimulationConfig) -> SolverResult<Self> {
        for (what, a) in [
            ("density", &props.rho),
            ("viscosity", &props.mu),
            ("heat capacity", &props.cap),
            ("conductivity", &props.kappa),
        ] {
            check_shape(what, &grid.rc, a.shape())?;
        }
        let rc = grid.rc;
        let uvw = [
            Unknown::new("cell-u-vel", Position::Cell, rc, BcKind::Dirichlet),
            Unknown::new("cell-v-vel", Position::Cell, rc, BcKind::Dirichlet),
            Unknown::new("cell-w-vel", Position::Cell, rc, BcKind::Dirichlet),
        ];
        let uvwf = [
            Unknown::new("face-u-vel", Position::Face(Axis::X), grid.ru, BcKind::Dirichlet),
            Unknown::new("face-v-vel", Position::Face(Axis::Y), grid.rv, BcKind::Dirichlet),
            Unknown::new("face-w-vel", Position::Face(Axis::Z), grid.rw, BcKind::Dirichlet),
        ];
        Ok(Self {
            uvw,
            uvwf,
            p: Unknown::new("pressure", Position::Cell, rc, BcKind::Neumann),
            p_tot: Unknown::new("total-pressure", Position::Cell, rc, BcKind::Neumann),
            t: None,
            obst: Array3::zeros(rc),
            buoyancy: None,
            props,
            config,
            time: 0.0,
            step_count: 0,
            grid,
        })
    }

    /// Adds an insulated temperature field at zero.
    pub fn with_temperature(mut self) -> Self {
        self.t = Some(Unknown::new("temperature", Position::Cell, self.grid.rc, BcKind::Neumann));
        self
    }

    pub fn with_obstacles(mut self, obst: Array3<f64>) -> SolverResult<Self> {
        check_shape("obstacle mask", &self.grid.rc, obst.shape())?;
        self.obst = obst;
        Ok(self)
    }

    pub fn with_buoyancy(mut self, buoyancy: Buoyancy) -> Self {
        self.buoyancy = Some(buoyancy);
        self
    }

    /// Makes face velocities and Neumann boundary values consistent with
    /// the current cell values. Call once after setting initial and
    /// boundary conditions.
    pub fn initialize(&mut self) {
        for axis in Axis::ALL {
            let face = &mut self.uvwf[axis.index()];
            if !face.val.is_empty() {
                face.val = avg(axis, &self.uvw[axis.index()].val);
            }
        }
        sync_face_boundaries(&self.uvw, &mut self.uvwf);
        for comp in self.uvw.iter_mut() {
            adj_n_bnds(comp);
        }
        adj_n_bnds(&mut self.p);
        adj_n_bnds(&mut self.p_tot);
        if let Some(t) = &mut self.t {
            adj_n_bnds(t);
        }
    }

    fn body_forces(&self) -> [Array3<f64>; 3] {
        let mut ef = Axis::ALL.map(|_| Array3::zeros(self.grid.rc));
        if let (Some(b), Some(t)) = (self.buoyancy, &self.t) {
            ef[b.axis.index()] = t.val.mapv(|v| b.coefficient * (v - b.reference));
        }
        ef
    }

    pub fn step(&mut self) -> SolverResult<StepDiagnostics> {
        self.step_count += 1;
        log::info!("Time step {} (t = {:.5})", self.step_count, self.time);

        let dt = self.config.dt;
        let cfg = self.config.solver;

        if let Some(t) = &mut self.t {
            t.store_old();
        }
        for comp in self.uvw.iter_mut() {
            comp.store_old();
        }

        let temperature = match &mut self.t {
            Some(t) => {
                let rho_cap = self.props.rho_cap();
                Some(calc_t(t, &self.uvwf, &rho_cap, &self.props.kappa, dt, &self.grid, &self.obst, &cfg)?)
            }
            None => None,
        };

        let [ex, ey, ez] = self.body_forces();
        let momentum = calc_uvw(
            &mut self.uvw,
            &mut self.uvwf,
            &self.props.rho,
            &self.props.mu,
            &self.p_tot,
            [&ex, &ey, &ez],
            dt,
            &self.grid,
            &self.obst,
            &cfg,
        )?;

        let pressure = calc_p(&mut self.p, &self.uvwf, &self.props.rho, dt, &self.grid, &self.obst, &cfg)?;
        if self.config.accumulate_pressure {
            self.p_tot.val += &self.p.val;
            adj_n_bnds(&mut self.p_tot);
        }

        corr_uvw(&mut self.uvw, &self.p, &self.props.rho, dt, &self.grid, &self.obst)?;
        corr_uvw(&mut self.uvwf, &self.p, &self.props.rho, dt, &self.grid, &self.obst)?;

        let err = vol_balance(&self.uvwf, &self.grid, Some(&self.obst))?;
        let max_error_after = err.fold(0.0_f64, |m, &e| m.max(e.abs()));
        log::info!("Maximum volume error after correction: {:12.5e}", max_error_after);

        let cfl = cfl_max(&self.uvw, dt, &self.grid);
        log::info!("Maximum CFL number: {:12.5e}", cfl);
        if cfl > 1.0 {
            log::warn!("CFL number {:.3} exceeds one at step {}", cfl, self.step_count);
        }

        self.time += dt;
        Ok(StepDiagnostics {
            step: self.step_count,
            time: self.time,
            max_error_before: pressure.max_error,
            net_imbalance_before: pressure.net_imbalance,
            max_error_after,
            cfl,
            pressure: pressure.solve,
            momentum,
            temperature,
        })
    }

    /// The scalar drawn in snapshots: temperature when present, pressure
    /// otherwise.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            step: self.step_count,
            time: self.time,
            scalar: self.t.as_ref().unwrap_or(&self.p),
            uvw: &self.uvw,
            grid: &self.grid,
            normal: self.config.plot_normal,
        }
    }

    /// Runs the configured number of steps.
    pub fn run(
        &mut self,
        diagnostics: &mut dyn DiagnosticsSink,
        visualization: &mut dyn VisualizationSink,
    ) -> SolverResult<()> {
        for _ in 0..self.config.steps {
            let record = self.step()?;
            diagnostics.record(&record)?;
            let plot_every = self.config.plot_every;
            if plot_every > 0 && self.step_count % plot_every == 0 {
                visualization.consume(&self.snapshot());
            }
        }
        Ok(())
    }
}
