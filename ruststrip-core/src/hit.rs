//! Per-strip hit record with raw and calibrated TDC samples.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::group::GroupInfo;
use crate::id::StripId;

/// Pulse edge recorded by the TDC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Edge {
    /// Rising edge: pulse arrival time.
    Leading = 0,
    /// Falling edge: arrival plus time over threshold.
    Trailing = 1,
}

impl Edge {
    /// Index into edge-paired sample arrays.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One strip's samples within one event.
///
/// Sample lists come in leading/trailing pairs; the calibrated list of an
/// edge always has the same length as the raw list. `group_ids` and
/// `group_info` are written by the grouping engine and run parallel to each
/// other (`group_info` only when the engine records it).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    strip_id: StripId,
    raw_times: [Vec<f64>; 2],
    calibrated_times: [Vec<f64>; 2],
    group_ids: Vec<i32>,
    group_info: Vec<GroupInfo>,
}

impl Hit {
    /// Builds a hit from raw edge samples, applying a single time offset:
    /// `calibrated = raw - offset` for every sample of both edges.
    #[must_use]
    pub fn from_raw_times(strip_id: StripId, raw_times: [Vec<f64>; 2], offset: f64) -> Self {
        let calibrated_times = [
            raw_times[0].iter().map(|t| t - offset).collect(),
            raw_times[1].iter().map(|t| t - offset).collect(),
        ];
        Self {
            strip_id,
            raw_times,
            calibrated_times,
            group_ids: Vec::new(),
            group_info: Vec::new(),
        }
    }

    /// The strip this hit belongs to.
    #[inline]
    #[must_use]
    pub fn strip_id(&self) -> StripId {
        self.strip_id
    }

    /// Raw samples of one edge [ns].
    #[inline]
    #[must_use]
    pub fn raw_times(&self, edge: Edge) -> &[f64] {
        &self.raw_times[edge.index()]
    }

    /// Calibrated samples of one edge [ns].
    #[inline]
    #[must_use]
    pub fn calibrated_times(&self, edge: Edge) -> &[f64] {
        &self.calibrated_times[edge.index()]
    }

    /// Group ids assigned to this hit's leading samples.
    #[inline]
    #[must_use]
    pub fn group_ids(&self) -> &[i32] {
        &self.group_ids
    }

    /// Fitted parameters of the groups named in [`Hit::group_ids`].
    #[inline]
    #[must_use]
    pub fn group_info(&self) -> &[GroupInfo] {
        &self.group_info
    }

    /// Whether any group id has been assigned yet.
    #[inline]
    #[must_use]
    pub fn has_group_ids(&self) -> bool {
        !self.group_ids.is_empty()
    }

    /// Appends a group id assignment.
    pub fn push_group_id(&mut self, id: i32) {
        self.group_ids.push(id);
    }

    /// Appends the fitted parameters backing the latest assignment.
    pub fn push_group_info(&mut self, info: GroupInfo) {
        self.group_info.push(info);
    }

    /// Drops all group assignments, keeping the samples.
    pub fn clear_groups(&mut self) {
        self.group_ids.clear();
        self.group_info.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Side;

    fn strip() -> StripId {
        StripId::new(0, 0, 0, 1, Side::X, 7)
    }

    #[test]
    fn test_calibration_offset_applied_to_both_edges() {
        let hit = Hit::from_raw_times(strip(), [vec![10.0, 20.0], vec![15.0]], 2.5);
        assert_eq!(hit.raw_times(Edge::Leading), &[10.0, 20.0]);
        assert_eq!(hit.calibrated_times(Edge::Leading), &[7.5, 17.5]);
        assert_eq!(hit.calibrated_times(Edge::Trailing), &[12.5]);
    }

    #[test]
    fn test_raw_and_calibrated_lengths_match() {
        let hit = Hit::from_raw_times(strip(), [vec![1.0, 2.0, 3.0], Vec::new()], 0.0);
        for edge in [Edge::Leading, Edge::Trailing] {
            assert_eq!(hit.raw_times(edge).len(), hit.calibrated_times(edge).len());
        }
    }

    #[test]
    fn test_group_assignment_roundtrip() {
        let mut hit = Hit::from_raw_times(strip(), [vec![1.0], Vec::new()], 0.0);
        assert!(!hit.has_group_ids());
        hit.push_group_id(0);
        hit.push_group_info(GroupInfo::new(5.0, -255.0, 2.0));
        assert_eq!(hit.group_ids(), &[0]);
        assert_eq!(hit.group_info().len(), 1);
        hit.clear_groups();
        assert!(!hit.has_group_ids());
        assert!(hit.group_info().is_empty());
    }
}
