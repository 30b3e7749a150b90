/// Transport-level failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("connection to {host} timed out")]
    ConnectionTimeout { host: String },

    #[error("request timed out during {operation}")]
    RequestTimeout { operation: String },

    #[error("DNS resolution failed for {host}")]
    DnsFailure { host: String },

    #[error("TLS failure: {reason}")]
    TlsFailure { reason: String },
}

impl NetworkError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionTimeout { .. } => "NET_CONN_TIMEOUT",
            NetworkError::RequestTimeout { .. } => "NET_REQ_TIMEOUT",
            NetworkError::DnsFailure { .. } => "NET_DNS",
            NetworkError::TlsFailure { .. } => "NET_TLS",
        }
    }
}
