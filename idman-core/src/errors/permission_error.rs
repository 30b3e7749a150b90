/// Caller lacks the capability for the attempted operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    #[error("access denied for {operation}")]
    AccessDenied { operation: String },

    #[error("cross-account access denied for account {account_id} via {role_arn}")]
    CrossAccountAccessDenied { account_id: String, role_arn: String },

    #[error("missing capability: {capability}")]
    MissingCapability { capability: String },
}

impl PermissionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PermissionError::AccessDenied { .. } => "PERM_DENIED",
            PermissionError::CrossAccountAccessDenied { .. } => "PERM_CROSS_ACCOUNT",
            PermissionError::MissingCapability { .. } => "PERM_CAPABILITY",
        }
    }
}
