//! ruststrip-grouping: Unsupervised time grouping of strip hits.
//!
//! This crate finds event-time structure without any truth labels:
//! - **Histogram** - each leading sample becomes a unit-weight Gaussian
//! - **Peak search** - iterative find-maximum, fit, subtract
//! - **Ordering** - most signal-like group ends up at index 0
//! - **Assignment** - every leading sample gets a group id
//!
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod fit;
pub mod histogram;

pub use config::GroupingConfig;
pub use engine::TimeGrouper;
pub use error::{Error, Result};
pub use fit::{fit_gaussian, GaussianFit};
pub use histogram::Hist1d;

// Re-export the group record types next to the engine that fills them
pub use ruststrip_core::{GroupInfo, TimeGroup};
