//! ruststrip-core: Core types for strip detector event timing.
//!
//! This crate provides the identifiers, per-event hit/time store, time-group
//! records, and the calibration contract shared by the grouping engine, the
//! track fitter, and the I/O layer.
//!

pub mod calib;
pub mod error;
pub mod event;
pub mod group;
pub mod hit;
pub mod id;

pub use calib::{DelayWindow, NoCalibration, StripDelayTable, TimeCalibration, WindowedDelayTable};
pub use error::{Error, Result};
pub use event::Event;
pub use group::{GroupInfo, TimeGroup};
pub use hit::{Edge, Hit};
pub use id::{LayerId, PixelId, Side, SideId, StripId, TdcId, STRIPS_PER_TDC};
