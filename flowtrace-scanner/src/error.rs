use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Ledger server unavailable: {0}")]
    Unavailable(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

/// RPC error tokens that repeat on every attempt with the same request.
pub const PERMANENT_RPC_ERRORS: &[&str] = &[
    "actMalformed",
    "actNotFound",
    "srcActMalformed",
    "invalidParams",
    "lgrIdxMalformed",
    "lgrIdxsInvalid",
    "invalid_API_version",
    "unknownCmd",
    "notImpl",
    "noPermission",
    "notSupported",
];

impl ScanError {
    /// Whether the scheduler may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::Cancelled | ScanError::InvalidAddress(_) | ScanError::InvalidUrl(_) => false,
            ScanError::Rpc { code, .. } => !PERMANENT_RPC_ERRORS.contains(&code.as_str()),
            _ => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: &str) -> ScanError {
        ScanError::Rpc {
            code: code.to_string(),
            message: code.to_string(),
        }
    }

    #[test]
    fn test_malformed_requests_are_not_retried() {
        assert!(!rpc("actMalformed").is_retryable());
        assert!(!rpc("invalidParams").is_retryable());
        assert!(!rpc("actNotFound").is_retryable());
        assert!(!ScanError::InvalidUrl("x".to_string()).is_retryable());
        assert!(!ScanError::Cancelled.is_retryable());
    }

    #[test]
    fn test_transient_failures_are_retried() {
        assert!(rpc("lgrNotFound").is_retryable());
        assert!(rpc("internal").is_retryable());
        assert!(ScanError::Timeout.is_retryable());
        assert!(ScanError::Unavailable("tooBusy".to_string()).is_retryable());
    }
}
