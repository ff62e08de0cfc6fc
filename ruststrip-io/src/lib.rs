//! ruststrip-io: Event record I/O for strip detector data.
//!
//! This crate reads acquisition events from JSON-lines files, decodes them
//! into event stores, writes group-assignment CSV and round-trips the
//! plain-text strip delay tables used for time calibration.
//!

mod calibration;
mod error;
mod reader;
mod record;
mod writer;

pub use calibration::{load_delay_table, store_delay_table};
pub use error::{Error, Result};
pub use reader::JsonlEventReader;
pub use record::{RawEventRecord, RawLayerHits, TdcPulse, STRIPS_PER_PLANE, TDC_LSB_NS};
pub use writer::AssignmentWriter;
