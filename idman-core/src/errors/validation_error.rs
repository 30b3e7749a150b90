/// Structural and semantic input problems.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("missing required columns: {columns}")]
    MissingColumns { columns: String },

    #[error("empty value for '{field}'{}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    EmptyValue { field: String, line: Option<usize> },

    #[error("invalid principal type '{value}'{}, expected USER or GROUP", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    InvalidPrincipalType { value: String, line: Option<usize> },

    #[error("invalid account ID format: {account_id}")]
    InvalidAccountId { account_id: String },

    #[error("invalid tag: {key}={value}")]
    InvalidTag { key: String, value: String },

    #[error("invalid entity reference '{reference}': {reason}")]
    InvalidEntityReference { reference: String, reason: String },

    #[error("entity not found: {reference}")]
    EntityNotFound { reference: String },

    #[error("permission set not found: {name}")]
    PermissionSetNotFound { name: String },

    #[error("account not found: {name}")]
    AccountNotFound { name: String },

    #[error("template '{name}' already exists")]
    DuplicateTemplateName { name: String },

    #[error("{context}: {reason}")]
    Invalid { context: String, reason: String },
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "VAL_MISSING_FIELD",
            ValidationError::MissingColumns { .. } => "VAL_MISSING_COLUMNS",
            ValidationError::EmptyValue { .. } => "VAL_EMPTY_VALUE",
            ValidationError::InvalidPrincipalType { .. } => "VAL_PRINCIPAL_TYPE",
            ValidationError::InvalidAccountId { .. } => "VAL_ACCOUNT_ID",
            ValidationError::InvalidTag { .. } => "VAL_TAG",
            ValidationError::InvalidEntityReference { .. } => "VAL_ENTITY_REF",
            ValidationError::EntityNotFound { .. } => "VAL_ENTITY_NOT_FOUND",
            ValidationError::PermissionSetNotFound { .. } => "VAL_PS_NOT_FOUND",
            ValidationError::AccountNotFound { .. } => "VAL_ACCOUNT_NOT_FOUND",
            ValidationError::DuplicateTemplateName { .. } => "VAL_DUPLICATE_TEMPLATE",
            ValidationError::Invalid { .. } => "VAL_INVALID",
        }
    }
}
