use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the structural failures that can occur while the
/// tool ingests fuel exports, reconciles them, or emits reports.
///
/// Data-quality problems (missing fuel columns, unmatched plates, garbled
/// amounts) never surface here; they are recovered by defaulting and counted
/// in [`Diagnostics`](crate::pipeline::Diagnostics).
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when a byte source cannot be decoded as tabular data at all.
    #[error("malformed source '{source_name}': {reason}")]
    MalformedSource { source_name: String, reason: String },

    /// Raised when the pipeline configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    pub(crate) fn malformed(source_name: &str, reason: impl ToString) -> Self {
        ToolError::MalformedSource {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
