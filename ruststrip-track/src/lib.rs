//! Straight-line track fits and layer residual probes for strip detector
//! events.
//!
//! The crate turns the pixels of an event's first time group into space
//! points, fits both transverse projections with weighted least squares and
//! probes each layer against a fit that leaves it out. A small worker pool
//! runs such probes over event batches.
//!
//! # Example
//!
//! ```
//! use ruststrip_track::{Geometry, SpacePoint, TrackFit};
//!
//! let geometry = Geometry::new();
//! let weight = 1.0 / geometry.position_uncertainty();
//! let points: Vec<SpacePoint> = (0..4)
//!     .map(|layer| {
//!         let z = geometry.layer_z(layer);
//!         SpacePoint::new(layer, z, 0.1 + 0.2 * z, 0.5 - 0.1 * z, weight)
//!     })
//!     .collect();
//!
//! let track = TrackFit::fit(&points, None).unwrap();
//! assert!((track.x.slope - 0.2).abs() < 1e-9);
//! assert!(track.x.chi2 < 1e-12);
//! ```

#![warn(missing_docs)]

mod fit;
mod geometry;
mod pool;
mod residual;

pub use fit::{AxisFit, SpacePoint, TrackFit};
pub use geometry::Geometry;
pub use pool::{default_workers, WorkerPool};
pub use residual::{ProbeResidual, ResidualHarness, SIGNAL_SPEED};
