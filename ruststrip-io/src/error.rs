//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line that does not parse as an event record.
    #[error("line {line}: invalid event record: {source}")]
    InvalidRecord {
        /// 1-based line number in the input.
        line: usize,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A calibration table row that does not parse.
    #[error("line {line}: invalid calibration row: {reason}")]
    InvalidCalibrationRow {
        /// 1-based line number in the input.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },
}
