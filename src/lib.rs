pub mod solver;
pub mod trace;
