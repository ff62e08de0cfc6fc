//! Identifiers for detector elements: strips, TDC channels, layers, pixels.
//!
//! All identifiers are small `Copy` types with a field-lexicographic total
//! order, so they can key ordered maps and produce deterministic iteration.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Readout side of a layer: X-measuring or Y-measuring strip plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    /// X-measuring plane.
    X = 0,
    /// Y-measuring plane.
    Y = 1,
}

impl Side {
    /// Both sides, in index order.
    pub const BOTH: [Side; 2] = [Side::X, Side::Y];

    /// Index into side-paired arrays.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposite side.
    #[inline]
    #[must_use]
    pub fn other(self) -> Side {
        match self {
            Side::X => Side::Y,
            Side::Y => Side::X,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::X => write!(f, "x"),
            Side::Y => write!(f, "y"),
        }
    }
}

/// One detector strip.
///
/// The derived ordering compares fields in declaration order, which is the
/// canonical ordering for map keys throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StripId {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
    pub side: Side,
    pub strip: u8,
}

/// Strips per TDC channel group.
pub const STRIPS_PER_TDC: u8 = 8;

impl StripId {
    /// Creates a strip identifier.
    #[must_use]
    pub fn new(module: u16, row: u16, column: u16, layer: u8, side: Side, strip: u8) -> Self {
        Self {
            module,
            row,
            column,
            layer,
            side,
            strip,
        }
    }

    /// The TDC channel group this strip is wired to (eight strips share one).
    #[inline]
    #[must_use]
    pub fn tdc_id(&self) -> TdcId {
        TdcId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
            side: self.side,
            tdc: self.strip % STRIPS_PER_TDC,
        }
    }

    /// The layer this strip belongs to.
    #[inline]
    #[must_use]
    pub fn layer_id(&self) -> LayerId {
        LayerId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
        }
    }

    /// The strip plane (layer + side) this strip belongs to.
    #[inline]
    #[must_use]
    pub fn side_id(&self) -> SideId {
        SideId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
            side: self.side,
        }
    }
}

impl fmt::Display for StripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{}_r{}_c{}_l{}_{}_s{}",
            self.module, self.row, self.column, self.layer, self.side, self.strip
        )
    }
}

/// One TDC channel group of a strip plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TdcId {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
    pub side: Side,
    pub tdc: u8,
}

impl fmt::Display for TdcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{}_r{}_c{}_l{}_{}_t{}",
            self.module, self.row, self.column, self.layer, self.side, self.tdc
        )
    }
}

/// One detector layer (both strip planes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerId {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
}

impl LayerId {
    /// Creates a layer identifier.
    #[must_use]
    pub fn new(module: u16, row: u16, column: u16, layer: u8) -> Self {
        Self {
            module,
            row,
            column,
            layer,
        }
    }

    /// One strip plane of this layer.
    #[inline]
    #[must_use]
    pub fn side_id(&self, side: Side) -> SideId {
        SideId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
            side,
        }
    }

    /// A strip of this layer.
    #[inline]
    #[must_use]
    pub fn strip_id(&self, side: Side, strip: u8) -> StripId {
        StripId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
            side,
            strip,
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{}_r{}_c{}_l{}",
            self.module, self.row, self.column, self.layer
        )
    }
}

/// One strip plane: a layer restricted to one readout side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SideId {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
    pub side: Side,
}

impl SideId {
    /// A strip of this plane.
    #[inline]
    #[must_use]
    pub fn strip_id(&self, strip: u8) -> StripId {
        StripId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
            side: self.side,
            strip,
        }
    }

    /// The layer this plane belongs to.
    #[inline]
    #[must_use]
    pub fn layer_id(&self) -> LayerId {
        LayerId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
        }
    }
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{}_r{}_c{}_l{}_{}",
            self.module, self.row, self.column, self.layer, self.side
        )
    }
}

/// The crossing of an X strip and a Y strip in one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelId {
    pub module: u16,
    pub row: u16,
    pub column: u16,
    pub layer: u8,
    /// Strip number per side, indexed by [`Side::index`].
    pub strip: [u8; 2],
}

impl PixelId {
    /// Builds a pixel from two crossing strips of the same layer.
    ///
    /// Returns `None` when the strips belong to different layers or to the
    /// same side.
    #[must_use]
    pub fn from_strips(a: StripId, b: StripId) -> Option<Self> {
        if a.layer_id() != b.layer_id() || a.side == b.side {
            return None;
        }
        let mut strip = [0u8; 2];
        strip[a.side.index()] = a.strip;
        strip[b.side.index()] = b.strip;
        Some(Self {
            module: a.module,
            row: a.row,
            column: a.column,
            layer: a.layer,
            strip,
        })
    }

    /// The strip number on one side.
    #[inline]
    #[must_use]
    pub fn strip(&self, side: Side) -> u8 {
        self.strip[side.index()]
    }

    /// The full identifier of the strip on one side of this pixel.
    #[inline]
    #[must_use]
    pub fn strip_id(&self, side: Side) -> StripId {
        self.layer_id().strip_id(side, self.strip(side))
    }

    /// The layer this pixel lies in.
    #[inline]
    #[must_use]
    pub fn layer_id(&self) -> LayerId {
        LayerId {
            module: self.module,
            row: self.row,
            column: self.column,
            layer: self.layer,
        }
    }
}

impl fmt::Display for PixelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m{}_r{}_c{}_l{}_x{}_y{}",
            self.module,
            self.row,
            self.column,
            self.layer,
            self.strip[Side::X.index()],
            self.strip[Side::Y.index()]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ordering_is_field_lexicographic() {
        let a = StripId::new(0, 0, 0, 3, Side::X, 21);
        let b = StripId::new(0, 0, 0, 3, Side::Y, 0);
        let c = StripId::new(0, 0, 0, 4, Side::X, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn test_tdc_channel_mapping() {
        let strip = StripId::new(1, 2, 3, 5, Side::Y, 21);
        let tdc = strip.tdc_id();
        assert_eq!(tdc.tdc, 21 % 8);
        assert_eq!(tdc.layer, 5);
        assert_eq!(tdc.side, Side::Y);

        // Strips 8 apart share a channel group.
        let other = StripId::new(1, 2, 3, 5, Side::Y, 29);
        assert_eq!(other.tdc_id(), tdc);
    }

    #[test]
    fn test_pixel_from_crossing_strips() {
        let x = StripId::new(0, 0, 0, 2, Side::X, 10);
        let y = StripId::new(0, 0, 0, 2, Side::Y, 40);
        let pixel = PixelId::from_strips(y, x).unwrap();
        assert_eq!(pixel.strip(Side::X), 10);
        assert_eq!(pixel.strip(Side::Y), 40);
        assert_eq!(pixel.layer_id(), x.layer_id());
    }

    #[test]
    fn test_pixel_rejects_same_side_or_layer_mismatch() {
        let a = StripId::new(0, 0, 0, 2, Side::X, 10);
        let b = StripId::new(0, 0, 0, 2, Side::X, 11);
        assert!(PixelId::from_strips(a, b).is_none());

        let c = StripId::new(0, 0, 0, 3, Side::Y, 11);
        assert!(PixelId::from_strips(a, c).is_none());
    }

    #[test]
    fn test_display_forms() {
        let strip = StripId::new(0, 1, 2, 3, Side::X, 4);
        assert_eq!(strip.to_string(), "m0_r1_c2_l3_x_s4");
        assert_eq!(strip.tdc_id().to_string(), "m0_r1_c2_l3_x_t4");
        assert_eq!(strip.side_id().to_string(), "m0_r1_c2_l3_x");
    }
}
