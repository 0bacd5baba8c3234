use thiserror::Error;

/// Failures local to one narrow phase query. The scene treats these per pair, a failing pair is
/// deferred for the frame and never aborts the rest of the sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollisionError {
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("{stage} did not converge after {iterations} iterations")]
    NoConvergence { stage: &'static str, iterations: u32 },
}

impl CollisionError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        CollisionError::InvariantViolation(msg.into())
    }

    /// Non convergence is worth retrying with a smaller time bracket, invariant violations are
    /// not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollisionError::NoConvergence { .. })
    }
}

pub type Result<T, E = CollisionError> = std::result::Result<T, E>;
