//! Per-event store of TDC buckets and strip hits.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::calib::TimeCalibration;
use crate::group::GroupInfo;
use crate::hit::{Edge, Hit};
use crate::id::{StripId, TdcId};

/// One detector event: raw TDC samples bucketed by channel group, plus the
/// hits built from them.
///
/// Ingestion order matters: TDC buckets are filled first, then
/// [`Event::add_hit`] snapshots the strip's bucket into a [`Hit`] and
/// applies calibration. A hit added before its bucket simply gets empty
/// sample lists.
///
/// The calibrated leading-time bounds are cached and recomputed lazily
/// after any hit mutation.
#[derive(Debug, Clone)]
pub struct Event {
    hits: BTreeMap<StripId, Hit>,
    tdc_times: [BTreeMap<TdcId, Vec<f64>>; 2],
    event_time: f64,
    lowest_leading: Cell<f64>,
    highest_leading: Cell<f64>,
}

impl Event {
    /// Creates an empty event. The event time starts as NaN until set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hits: BTreeMap::new(),
            tdc_times: [BTreeMap::new(), BTreeMap::new()],
            event_time: f64::NAN,
            lowest_leading: Cell::new(f64::NAN),
            highest_leading: Cell::new(f64::NAN),
        }
    }

    /// Sets the absolute event timestamp used for calibration lookup.
    pub fn set_event_time(&mut self, time: f64) {
        self.event_time = time;
    }

    /// The absolute event timestamp, NaN when never set.
    #[inline]
    #[must_use]
    pub fn event_time(&self) -> f64 {
        self.event_time
    }

    /// Appends one raw sample to a TDC channel bucket.
    pub fn add_tdc(&mut self, tdc: TdcId, time: f64, edge: Edge) {
        self.tdc_times[edge.index()].entry(tdc).or_default().push(time);
    }

    /// Raw samples of one channel bucket, empty when the bucket is missing.
    #[must_use]
    pub fn tdc_times(&self, tdc: &TdcId, edge: Edge) -> &[f64] {
        self.tdc_times[edge.index()]
            .get(tdc)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Builds (or replaces) the hit for a strip from its TDC bucket.
    ///
    /// The strip's leading and trailing bucket samples are copied into the
    /// hit and calibrated with the offset the injected calibration reports
    /// for this strip at the current event time. A missing bucket yields a
    /// hit with empty sample lists.
    pub fn add_hit(&mut self, strip: StripId, calibration: &dyn TimeCalibration) {
        let tdc = strip.tdc_id();
        let raw = [
            self.tdc_times(&tdc, Edge::Leading).to_vec(),
            self.tdc_times(&tdc, Edge::Trailing).to_vec(),
        ];
        let offset = calibration.strip_time_offset(&strip, self.event_time);
        self.hits.insert(strip, Hit::from_raw_times(strip, raw, offset));
        self.invalidate_time_bounds();
    }

    /// Removes a hit, returning it when present.
    pub fn remove_hit(&mut self, strip: &StripId) -> Option<Hit> {
        let removed = self.hits.remove(strip);
        if removed.is_some() {
            self.invalidate_time_bounds();
        }
        removed
    }

    /// Whether a hit exists for the strip.
    #[inline]
    #[must_use]
    pub fn has_hit(&self, strip: &StripId) -> bool {
        self.hits.contains_key(strip)
    }

    /// The hit for a strip, if any.
    #[inline]
    #[must_use]
    pub fn hit(&self, strip: &StripId) -> Option<&Hit> {
        self.hits.get(strip)
    }

    /// Mutable access to one hit.
    #[inline]
    pub fn hit_mut(&mut self, strip: &StripId) -> Option<&mut Hit> {
        self.hits.get_mut(strip)
    }

    /// Hits in strip-identifier order.
    pub fn hits(&self) -> impl Iterator<Item = &Hit> {
        self.hits.values()
    }

    /// Mutable hits in strip-identifier order.
    pub fn hits_mut(&mut self) -> impl Iterator<Item = &mut Hit> {
        self.hits.values_mut()
    }

    /// Number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the event has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Raw samples of a strip's hit, empty when absent.
    #[must_use]
    pub fn raw_times(&self, strip: &StripId, edge: Edge) -> &[f64] {
        self.hits.get(strip).map_or(&[][..], |h| h.raw_times(edge))
    }

    /// Calibrated samples of a strip's hit, empty when absent.
    #[must_use]
    pub fn calibrated_times(&self, strip: &StripId, edge: Edge) -> &[f64] {
        self.hits
            .get(strip)
            .map_or(&[][..], |h| h.calibrated_times(edge))
    }

    /// Smallest calibrated leading sample over all hits, NaN when none exist.
    #[must_use]
    pub fn lowest_calibrated_leading_time(&self) -> f64 {
        if self.lowest_leading.get().is_nan() {
            self.recompute_time_bounds();
        }
        self.lowest_leading.get()
    }

    /// Largest calibrated leading sample over all hits, NaN when none exist.
    #[must_use]
    pub fn highest_calibrated_leading_time(&self) -> f64 {
        if self.highest_leading.get().is_nan() {
            self.recompute_time_bounds();
        }
        self.highest_leading.get()
    }

    /// Appends a group id to a strip's hit; `false` when the hit is missing.
    pub fn push_group_id(&mut self, strip: &StripId, id: i32) -> bool {
        match self.hits.get_mut(strip) {
            Some(hit) => {
                hit.push_group_id(id);
                true
            }
            None => false,
        }
    }

    /// Appends fitted group parameters to a strip's hit; `false` when the
    /// hit is missing.
    pub fn push_group_info(&mut self, strip: &StripId, info: GroupInfo) -> bool {
        match self.hits.get_mut(strip) {
            Some(hit) => {
                hit.push_group_info(info);
                true
            }
            None => false,
        }
    }

    /// Drops every hit's group assignments, keeping all samples.
    pub fn clear_group_assignments(&mut self) {
        for hit in self.hits.values_mut() {
            hit.clear_groups();
        }
    }

    fn invalidate_time_bounds(&self) {
        self.lowest_leading.set(f64::NAN);
        self.highest_leading.set(f64::NAN);
    }

    fn recompute_time_bounds(&self) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for hit in self.hits.values() {
            for &t in hit.calibrated_times(Edge::Leading) {
                if t < lo {
                    lo = t;
                }
                if t > hi {
                    hi = t;
                }
            }
        }
        self.lowest_leading.set(if lo.is_finite() { lo } else { f64::NAN });
        self.highest_leading.set(if hi.is_finite() { hi } else { f64::NAN });
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
