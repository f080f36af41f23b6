pub mod nodes;
pub mod structured;

pub use nodes::*;
pub use structured::*;
