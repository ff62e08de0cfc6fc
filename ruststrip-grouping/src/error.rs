//! Error types for ruststrip-grouping.

use thiserror::Error;

/// Result type alias for grouping operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Grouping error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configuration field holds a value the engine cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
