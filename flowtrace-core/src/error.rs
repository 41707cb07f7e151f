use flowtrace_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No valid seed addresses (rejected: {0:?})")]
    NoValidSeeds(Vec<String>),

    #[error("Invalid constraints: {0}")]
    InvalidConstraints(String),

    #[error("Invalid build parameters: {0}")]
    InvalidParams(String),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    #[error("Inconsistent snapshot: {0}")]
    Inconsistent(String),
}
