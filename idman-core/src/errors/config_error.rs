/// Missing or invalid configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigurationError {
    #[error("profile '{profile}' is not configured")]
    MissingProfile { profile: String },

    #[error("profile '{profile}' has no instance binding")]
    MissingInstanceBinding { profile: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("corrupt configuration file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

impl ConfigurationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigurationError::MissingProfile { .. } => "CFG_PROFILE",
            ConfigurationError::MissingInstanceBinding { .. } => "CFG_INSTANCE",
            ConfigurationError::InvalidConfig { .. } => "CFG_INVALID",
            ConfigurationError::Corrupt { .. } => "CFG_CORRUPT",
        }
    }
}
