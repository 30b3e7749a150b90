//! Error taxonomy: one enum per kind, aggregated into [`IdmanError`].
//!
//! Every error carries a stable machine-readable code and a recovery
//! suggestion drawn from a static table keyed by that code.

mod config_error;
mod execution_error;
mod network_error;
mod parsing_error;
mod permission_error;
mod storage_error;
mod validation_error;

pub use config_error::ConfigurationError;
pub use execution_error::ExecutionError;
pub use network_error::NetworkError;
pub use parsing_error::ParsingError;
pub use permission_error::PermissionError;
pub use storage_error::StorageError;
pub use validation_error::ValidationError;

/// Convenience alias used across the workspace.
pub type IdmanResult<T> = Result<T, IdmanError>;

/// Top-level error aggregating every kind in the taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdmanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IdmanError {
    /// Stable machine-readable code of the underlying error.
    pub fn code(&self) -> &'static str {
        match self {
            IdmanError::Validation(e) => e.code(),
            IdmanError::Parsing(e) => e.code(),
            IdmanError::Execution(e) => e.code(),
            IdmanError::Permission(e) => e.code(),
            IdmanError::Network(e) => e.code(),
            IdmanError::Configuration(e) => e.code(),
            IdmanError::Storage(e) => e.code(),
        }
    }

    /// Human recovery suggestion for this error's code.
    pub fn recovery_suggestion(&self) -> &'static str {
        suggestion_for(self.code())
    }
}

/// Static recovery-suggestion table keyed by error code.
pub fn suggestion_for(code: &str) -> &'static str {
    match code {
        "VAL_MISSING_FIELD" | "VAL_MISSING_COLUMNS" | "VAL_EMPTY_VALUE" => {
            "Check the input file against the documented column layout"
        }
        "VAL_PRINCIPAL_TYPE" => "Use USER or GROUP as the principal type",
        "VAL_ACCOUNT_ID" => "Account IDs are 12-digit numeric strings",
        "VAL_TAG" => "Tag keys and values must be non-empty",
        "VAL_ENTITY_REF" => "Entity references use the form 'user:name' or 'group:name'",
        "VAL_ENTITY_NOT_FOUND" | "VAL_PS_NOT_FOUND" | "VAL_ACCOUNT_NOT_FOUND" => {
            "Verify names match exactly (case-sensitive)"
        }
        "VAL_DUPLICATE_TEMPLATE" => "Pick a different template name or delete the existing one",
        "PARSE_EXTENSION" => "Supported input formats are .csv and .json",
        "PARSE_EMPTY" => "Provide a non-empty input file",
        "PARSE_UNREADABLE" => "Check the file path and permissions",
        "PARSE_CSV" | "PARSE_JSON" | "PARSE_YAML" => {
            "Fix the reported syntax error and retry"
        }
        "EXEC_RATE_LIMITED" => "Reduce the batch size or wait before retrying",
        "EXEC_UNAVAILABLE" => "The directory service is degraded; retry later",
        "EXEC_TIMEOUT" => "Retry; if the timeout persists, reduce concurrency",
        "EXEC_INVALID_PARAMS" => "Check the operation inputs for invalid values",
        "EXEC_ASSIGNMENT_FAILED" => "Inspect the per-item failure details and retry the batch",
        "EXEC_ROLLBACK_FAILED" => "Manually review the listed resources before retrying",
        "EXEC_CANCELLED" => "The run was cancelled; re-run to continue",
        "PERM_DENIED" => "Verify the caller's directory permissions",
        "PERM_CROSS_ACCOUNT" => "Verify the cross-account role trust policy and external id",
        "PERM_CAPABILITY" => "Grant the missing capability to the caller",
        "NET_CONN_TIMEOUT" | "NET_REQ_TIMEOUT" => "Check network connectivity and retry",
        "NET_DNS" => "Check DNS configuration for the service endpoint",
        "NET_TLS" => "Check system certificates and TLS configuration",
        "CFG_PROFILE" => "Add the profile to the configuration file",
        "CFG_INSTANCE" => "Bind an instance arn and identity store id to the profile",
        "CFG_INVALID" | "CFG_CORRUPT" => "Repair or regenerate the configuration file",
        "STORE_NOT_FOUND" => "List backups to find a valid backup id",
        "STORE_INTEGRITY" => "The backup is corrupt; restore from a different backup",
        "STORE_WRITE" | "STORE_READ" | "STORE_DELETE" | "STORE_LIST" => {
            "Check the storage backend's availability and permissions"
        }
        "STORE_SERIALIZATION" => "The stored payload is malformed; verify the backup",
        _ => "See the error message for details",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_suggestions_exist() {
        let err: IdmanError = ExecutionError::RateLimited {
            operation: "create_assignment".to_string(),
        }
        .into();
        assert_eq!(err.code(), "EXEC_RATE_LIMITED");
        assert!(err.recovery_suggestion().contains("batch size"));
    }

    #[test]
    fn name_resolution_suggestion_mentions_case() {
        let err: IdmanError = ValidationError::EntityNotFound {
            reference: "user:bob".to_string(),
        }
        .into();
        assert_eq!(
            err.recovery_suggestion(),
            "Verify names match exactly (case-sensitive)"
        );
    }
}
