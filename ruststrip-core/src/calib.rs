//! Strip time-calibration contract and table-backed implementations.
//!
//! Calibration is injected wherever hits are built: the event store asks the
//! provided [`TimeCalibration`] for a per-strip offset and subtracts it from
//! every raw sample. Unknown strips always calibrate to an offset of zero.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::StripId;

/// Source of per-strip time offsets.
///
/// `event_time` lets time-dependent implementations select the applicable
/// calibration epoch; static tables ignore it.
pub trait TimeCalibration: Send + Sync {
    /// Offset [ns] to subtract from the strip's raw samples. Implementations
    /// return `0.0` when they know nothing about the strip.
    fn strip_time_offset(&self, strip: &StripId, event_time: f64) -> f64;
}

/// Calibration that offsets nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalibration;

impl TimeCalibration for NoCalibration {
    #[inline]
    fn strip_time_offset(&self, _strip: &StripId, _event_time: f64) -> f64 {
        0.0
    }
}

/// Static per-strip delay table.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StripDelayTable {
    delays: BTreeMap<StripId, f64>,
}

impl StripDelayTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay for one strip, replacing any previous value.
    pub fn set_delay(&mut self, strip: StripId, delay: f64) {
        self.delays.insert(strip, delay);
    }

    /// The recorded delay, if any.
    #[inline]
    #[must_use]
    pub fn delay(&self, strip: &StripId) -> Option<f64> {
        self.delays.get(strip).copied()
    }

    /// Strips and delays in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&StripId, f64)> {
        self.delays.iter().map(|(id, d)| (id, *d))
    }

    /// Number of strips with a recorded delay.
    #[must_use]
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl TimeCalibration for StripDelayTable {
    #[inline]
    fn strip_time_offset(&self, strip: &StripId, _event_time: f64) -> f64 {
        self.delay(strip).unwrap_or(0.0)
    }
}

/// One validity window of a time-dependent delay.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DelayWindow {
    /// Inclusive start of validity.
    pub valid_from: f64,
    /// Exclusive end of validity.
    pub valid_until: f64,
    /// Offset [ns] while valid.
    pub delay: f64,
}

/// Per-strip delays with validity windows.
///
/// Lookup at an event time returns the matching window with the greatest
/// `valid_from` (the most recently issued calibration); when no window
/// matches (a NaN event time matches none) the offset is `0.0`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowedDelayTable {
    windows: BTreeMap<StripId, Vec<DelayWindow>>,
}

impl WindowedDelayTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a validity window for one strip.
    ///
    /// # Errors
    ///
    /// Rejects windows with a non-finite boundary or
    /// `valid_from >= valid_until`.
    pub fn add_window(&mut self, strip: StripId, window: DelayWindow) -> Result<()> {
        if !window.valid_from.is_finite()
            || !window.valid_until.is_finite()
            || window.valid_from >= window.valid_until
        {
            return Err(Error::InvalidWindow {
                strip,
                from: window.valid_from,
                until: window.valid_until,
            });
        }
        let windows = self.windows.entry(strip).or_default();
        let at = windows.partition_point(|w| w.valid_from <= window.valid_from);
        windows.insert(at, window);
        Ok(())
    }

    /// The delay valid for `strip` at `event_time`, if any window matches.
    #[must_use]
    pub fn delay_at(&self, strip: &StripId, event_time: f64) -> Option<f64> {
        let windows = self.windows.get(strip)?;
        // Windows are kept sorted by valid_from; the last match wins.
        windows
            .iter()
            .rev()
            .find(|w| w.valid_from <= event_time && event_time < w.valid_until)
            .map(|w| w.delay)
    }
}

impl TimeCalibration for WindowedDelayTable {
    #[inline]
    fn strip_time_offset(&self, strip: &StripId, event_time: f64) -> f64 {
        self.delay_at(strip, event_time).unwrap_or(0.0)
    }
}
