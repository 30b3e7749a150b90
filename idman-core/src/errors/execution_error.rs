/// Operations rejected or timed out by the directory service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("rate limited during {operation}")]
    RateLimited { operation: String },

    #[error("service unavailable during {operation}")]
    ServiceUnavailable { operation: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("invalid parameters for {operation}: {reason}")]
    InvalidParameters { operation: String, reason: String },

    #[error("assignment operation failed for {assignment}: {reason}")]
    AssignmentFailed { assignment: String, reason: String },

    #[error("rollback failed for {resource}: {reason}")]
    RollbackFailed { resource: String, reason: String },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },
}

impl ExecutionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::RateLimited { .. } => "EXEC_RATE_LIMITED",
            ExecutionError::ServiceUnavailable { .. } => "EXEC_UNAVAILABLE",
            ExecutionError::Timeout { .. } => "EXEC_TIMEOUT",
            ExecutionError::InvalidParameters { .. } => "EXEC_INVALID_PARAMS",
            ExecutionError::AssignmentFailed { .. } => "EXEC_ASSIGNMENT_FAILED",
            ExecutionError::RollbackFailed { .. } => "EXEC_ROLLBACK_FAILED",
            ExecutionError::Cancelled { .. } => "EXEC_CANCELLED",
        }
    }
}
