//! Engine error types

use thiserror::Error;

/// Failure inside a page extraction or rendering engine
#[derive(Debug, Error)]
pub enum BackendError {
    /// The PDF could not be parsed or written
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external binary is not installed or not on PATH
    #[error("{tool} not found: {reason}")]
    ToolNotFound { tool: String, reason: String },

    /// An external binary exited unsuccessfully
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// The engine lacks this capability
    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },

    #[error("Page {page} is out of range (1-{total})")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Image error: {0}")]
    Image(String),

    /// The engine reported success but produced no output file
    #[error("No output produced for page {0}")]
    MissingOutput(u32),

    /// The engine produced output that could not be interpreted
    #[error("Unexpected engine output: {0}")]
    InvalidOutput(String),

    #[error("Task join error: {0}")]
    Join(String),
}

/// Result type alias for engine operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Pdf(err.to_string())
    }
}

#[cfg(feature = "mupdf")]
impl From<mupdf::Error> for BackendError {
    fn from(err: mupdf::Error) -> Self {
        BackendError::Pdf(err.to_string())
    }
}
