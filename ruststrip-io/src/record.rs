//! Raw event records and their decoding into event stores.
//!
//! A record mirrors what the acquisition writes per event: for every strip
//! plane a 64-bit fired-strip mask plus the pulses registered by its eight
//! TDC channel groups, all in raw TDC counts. Decoding scales counts to
//! nanoseconds, fills the event's TDC buckets and only then builds the
//! strip hits, so every hit snapshots a complete bucket.

use serde::{Deserialize, Serialize};

use ruststrip_core::{Edge, Event, LayerId, Side, SideId, TdcId, TimeCalibration};

/// Nanoseconds per TDC count of the readout.
pub const TDC_LSB_NS: f64 = 0.1;

/// Strips per plane, the width of the fired-strip mask.
pub const STRIPS_PER_PLANE: u8 = 64;

/// One registered TDC pulse in raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdcPulse {
    /// Leading-edge time [TDC counts].
    pub time: u32,
    /// Pulse width [TDC counts].
    pub width: u32,
}

/// Raw samples of one strip plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLayerHits {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
    pub side: Side,
    /// Bit `n` set when strip `n` fired.
    pub strip_mask: u64,
    /// Registered pulses per TDC channel group.
    pub pulses: [Vec<TdcPulse>; 8],
}

impl RawLayerHits {
    /// An empty record for one strip plane.
    #[must_use]
    pub fn new(side: SideId) -> Self {
        Self {
            module: side.module,
            row: side.row,
            column: side.column,
            layer: side.layer,
            side: side.side,
            strip_mask: 0,
            pulses: Default::default(),
        }
    }

    /// The strip plane these samples belong to.
    #[must_use]
    pub fn side_id(&self) -> SideId {
        LayerId::new(self.module, self.row, self.column, self.layer).side_id(self.side)
    }
}

/// One event as read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventRecord {
    /// Absolute event timestamp [s].
    pub event_time: f64,
    /// Per-plane samples; planes without activity may be omitted.
    pub layers: Vec<RawLayerHits>,
}

impl RawEventRecord {
    /// Builds the event store this record describes.
    ///
    /// Leading edges are `time * lsb_ns`, trailing edges follow one pulse
    /// width later. Hits are added per set mask bit from strip 63 down to 0,
    /// after every bucket is filled.
    #[must_use]
    pub fn decode(&self, lsb_ns: f64, calibration: &dyn TimeCalibration) -> Event {
        let mut event = Event::new();
        event.set_event_time(self.event_time);

        for plane in &self.layers {
            for (channel, pulses) in (0u8..).zip(plane.pulses.iter()) {
                let tdc = TdcId {
                    module: plane.module,
                    row: plane.row,
                    column: plane.column,
                    layer: plane.layer,
                    side: plane.side,
                    tdc: channel,
                };
                for pulse in pulses {
                    let leading = f64::from(pulse.time) * lsb_ns;
                    let trailing = leading + f64::from(pulse.width) * lsb_ns;
                    event.add_tdc(tdc, leading, Edge::Leading);
                    event.add_tdc(tdc, trailing, Edge::Trailing);
                }
            }
        }

        for plane in &self.layers {
            let side = plane.side_id();
            for strip in (0..STRIPS_PER_PLANE).rev() {
                if (plane.strip_mask >> strip) & 1 == 1 {
                    event.add_hit(side.strip_id(strip), calibration);
                }
            }
        }
        event
    }
}
