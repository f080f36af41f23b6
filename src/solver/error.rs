use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    /// Two arrays that must share a shape do not.
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// A fluid row of an assembled system has no coupling left.
    #[error("singular system for '{unknown}': row {row} has diagonal {diagonal:e}")]
    SingularSystem {
        unknown: String,
        row: usize,
        diagonal: f64,
    },

    /// Only raised when the solver runs in strict mode.
    #[error("'{unknown}' did not converge: {iterations} iterations, residual {residual:e}")]
    NotConverged {
        unknown: String,
        iterations: usize,
        residual: f64,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SolverError {
    pub fn shape_mismatch(what: &'static str, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

/// Fails with [`SolverError::ShapeMismatch`] unless `found == expected`.
pub fn check_shape(what: &'static str, expected: &[usize], found: &[usize]) -> SolverResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SolverError::shape_mismatch(what, expected, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_shape_accepts_equal_shapes() {
        assert!(check_shape("mask", &[2, 3, 4], &[2, 3, 4]).is_ok());
    }

    #[test]
    fn check_shape_reports_both_shapes() {
        let err = check_shape("mask", &[2, 3, 4], &[2, 3, 5]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mask"));
        assert!(msg.contains("[2, 3, 4]"));
        assert!(msg.contains("[2, 3, 5]"));
    }
}
