pub mod balance;
pub mod boundary;
pub mod error;
pub mod field;
pub mod fvm;
pub mod linear_solver;
pub mod mesh;
pub mod operators;
pub mod options;
pub mod projection;
pub mod properties;
pub mod snapshot;
pub mod stepper;
pub mod transport;

pub use error::{SolverError, SolverResult};
pub use field::{Axis, BcKind, Boundary, Compass, Position, Unknown};
pub use linear_solver::{Preconditioner, SolveReport, SolveStatus, SparseMatrix};
pub use mesh::CartesianGrid;
pub use options::{SimulationConfig, SolverConfig};
pub use stepper::{ProjectionSolver, StepDiagnostics};
