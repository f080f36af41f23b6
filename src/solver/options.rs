//! Linear solver and run settings, loadable from JSON.

use crate::solver::error::{SolverError, SolverResult};
use crate::solver::field::Axis;
use crate::solver::linear_solver::{Preconditioner, SolveReport, Tolerance};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Linear solver settings shared by every equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative tolerance on the residual norm, scaled by the norm of the
    /// right-hand side.
    pub rtol: f64,
    /// Absolute floor on the residual norm.
    pub atol: f64,
    pub max_iter: usize,
    pub preconditioner: Preconditioner,
    /// Promote non-convergence to [`crate::solver::SolverError::NotConverged`].
    pub strict: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            max_iter: 1000,
            preconditioner: Preconditioner::Jacobi,
            strict: false,
        }
    }
}

impl SolverConfig {
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            rtol: self.rtol,
            atol: self.atol,
            max_iter: self.max_iter,
        }
    }

    /// Checks the outcome of solving for `unknown`. Non-convergence is
    /// logged, or returned as an error in strict mode.
    pub fn accept(&self, unknown: &str, report: &SolveReport) -> SolverResult<()> {
        if report.converged() {
            log::debug!(
                "{}: converged in {} iterations, residual {:e}",
                unknown,
                report.iterations,
                report.residual
            );
            return Ok(());
        }
        if self.strict {
            return Err(SolverError::NotConverged {
                unknown: unknown.to_string(),
                iterations: report.iterations,
                residual: report.residual,
            });
        }
        log::warn!(
            "{}: {:?} after {} iterations, residual {:e} (initial {:e})",
            unknown,
            report.status,
            report.iterations,
            report.residual,
            report.initial_residual
        );
        Ok(())
    }
}

/// Time-stepping parameters of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dt: f64,
    pub steps: usize,
    /// Snapshot interval in steps; zero disables snapshots.
    pub plot_every: usize,
    /// Normal of the plane handed to the visualization sink.
    #[serde(with = "axis_name")]
    pub plot_normal: Axis,
    /// Add each pressure correction to the total pressure that drives the
    /// next momentum step. Without it every step projects from scratch.
    pub accumulate_pressure: bool,
    pub solver: SolverConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            steps: 100,
            plot_every: 0,
            plot_normal: Axis::Z,
            accumulate_pressure: true,
            solver: SolverConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> SolverResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SolverResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

mod axis_name {
    use crate::solver::field::Axis;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(axis: &Axis, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match axis {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Axis, D::Error> {
        let name = String::deserialize(deserializer)?;
        match name.as_str() {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(D::Error::custom(format!("unknown axis: {}", other))),
        }
    }
}
