//! Error types for ruststrip-core.

use thiserror::Error;

use crate::id::StripId;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Calibration validity window with a NaN or inverted boundary.
    #[error("invalid validity window [{from}, {until}) for strip {strip}")]
    InvalidWindow {
        strip: StripId,
        from: f64,
        until: f64,
    },
}
