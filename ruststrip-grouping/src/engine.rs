//! Unsupervised time-grouping of strip hits.
//!
//! Key characteristics:
//! - One histogram per event, filled with unit-weight Gaussian kernels
//! - Iterative peak extraction: find maximum, fit, subtract, repeat
//! - Group list padded to a fixed capacity and reordered so that the most
//!   signal-like group sits at index 0
//! - Group ids written back onto the event per leading sample
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use ruststrip_core::{Edge, Event, GroupInfo, StripId, TimeGroup};

use crate::config::GroupingConfig;
use crate::error::Result;
use crate::fit::fit_gaussian;
use crate::histogram::{Hist1d, SQRT_TWO_PI};

/// Events with fewer hits than this are too sparse to group.
const MIN_HITS_FOR_GROUPING: usize = 4;

/// A fitted sigma within this margin of a bound counts as pinned.
const SIGMA_LIMIT_MARGIN: f64 = 0.01;

/// The time-grouping engine.
///
/// Holds a validated [`GroupingConfig`] and processes events one at a time
/// or in parallel batches. Processing is read-only on the engine, so one
/// instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct TimeGrouper {
    config: GroupingConfig,
}

impl TimeGrouper {
    /// Create an engine with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) when a
    /// configuration field fails validation.
    pub fn new(config: GroupingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this engine runs with.
    #[must_use]
    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Group one event in place.
    ///
    /// Builds the time histogram, extracts Gaussian groups, orders them,
    /// and writes a group id (and optionally the fitted parameters) onto
    /// each leading sample of every hit. Previous assignments on the event
    /// are discarded first. Returns the padded, ordered group list.
    ///
    /// Events with fewer than four hits, or without any leading sample,
    /// are left untouched and yield an empty list.
    pub fn process(&self, event: &mut Event) -> Vec<TimeGroup> {
        if event.len() < MIN_HITS_FOR_GROUPING {
            debug!("skipping event with only {} hits", event.len());
            return Vec::new();
        }
        let Some(mut hist) = self.build_histogram(event) else {
            debug!("skipping event without leading samples");
            return Vec::new();
        };

        let mut groups = self.extract_peaks(&mut hist);
        debug!("extracted {} groups from {} hits", groups.len(), event.len());

        // Pad to capacity so the ordering passes see a fixed-size list.
        groups.resize(self.config.max_groups, TimeGroup::Placeholder);
        self.sort_background_groups(&mut groups);
        self.sort_signal_groups(&mut groups);

        event.clear_group_assignments();
        self.assign_group_ids(event, hist.low_edge(), hist.high_edge(), &groups);
        groups
    }

    /// Group a batch of events in parallel.
    ///
    /// Returns one group list per event, in order. When `stop` is set,
    /// events whose processing has not started yet are skipped and yield
    /// empty lists; events already in flight run to completion.
    pub fn process_events(
        &self,
        events: &mut [Event],
        stop: Option<&AtomicBool>,
    ) -> Vec<Vec<TimeGroup>> {
        events
            .par_iter_mut()
            .map(|event| {
                if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return Vec::new();
                }
                self.process(event)
            })
            .collect()
    }

    /// Build the event's time histogram and fill it with one normalized
    /// Gaussian kernel per leading sample.
    ///
    /// Returns `None` when no range is configured and the event has no
    /// leading samples to derive one from.
    fn build_histogram(&self, event: &Event) -> Option<Hist1d> {
        let (low, high) = match self.config.time_range {
            Some(range) => range,
            None => {
                let low = event.lowest_calibrated_leading_time();
                let high = event.highest_calibrated_leading_time();
                if low.is_nan() || high.is_nan() {
                    return None;
                }
                (low, high)
            }
        };

        let span_bins = (high - low).ceil() as usize;
        let n_bins = span_bins
            .saturating_mul(self.config.rebinning_factor as usize)
            .max(2);
        debug!("histogram: {} bins over [{:.1}, {:.1}] ns", n_bins, low, high);

        let mut hist = Hist1d::new(n_bins, low, high);
        for hit in event.hits() {
            for &time in hit.calibrated_times(Edge::Leading) {
                hist.add_gaussian(1.0, time, self.config.cls_sigma, self.config.fill_sigma_n);
            }
        }
        Some(hist)
    }

    /// Extract Gaussian groups from the histogram, highest peak first.
    ///
    /// Each accepted fit is subtracted from the histogram before the next
    /// search. Peaks the fit cannot describe are removed crudely and
    /// retried a bounded number of times.
    fn extract_peaks(&self, hist: &mut Hist1d) -> Vec<TimeGroup> {
        let config = &self.config;
        let (sigma_low, sigma_high) = config.limit_sigma;
        let mut groups = Vec::new();
        let mut reference_height: Option<f64> = None;
        let mut reference_integral: Option<f64> = None;
        let mut rough_cleaning_retries = 0_usize;

        loop {
            let (peak_bin, peak_height) = hist.maximum_bin();
            if peak_height <= 0.0 {
                // Nothing left above the baseline.
                break;
            }
            let peak_center = hist.bin_center(peak_bin);

            // The first peak inside the signal window sets the height scale.
            if reference_height.is_none()
                && peak_center > config.expected_signal_time.0
                && peak_center < config.expected_signal_time.2
            {
                reference_height = Some(peak_height);
            }
            if let Some(height) = reference_height {
                if peak_height < height * config.frac_threshold {
                    break;
                }
            }

            let half_width = config.fit_range_half_width;
            let max_integral = peak_height * SQRT_TWO_PI * half_width;
            let (xs, ys) =
                hist.samples_within(peak_center - half_width, peak_center + half_width);
            let fitted = fit_gaussian(
                &xs,
                &ys,
                [peak_height, peak_center, half_width],
                [max_integral * 0.01, peak_center - half_width * 0.2, sigma_low],
                [max_integral * 2.0, peak_center + half_width * 0.2, sigma_high],
            )
            // A sigma pinned to its bound means the fit did not describe
            // the peak; treat it like a failed fit.
            .filter(|fit| {
                fit.sigma > sigma_low + SIGMA_LIMIT_MARGIN
                    && fit.sigma < sigma_high - SIGMA_LIMIT_MARGIN
            });

            let Some(fit) = fitted else {
                debug!(
                    "peak at {:.1} ns not fittable, rough cleaning (retry {})",
                    peak_center, rough_cleaning_retries
                );
                hist.subtract_gaussian(max_integral, peak_center, half_width, config.remove_sigma_n);
                rough_cleaning_retries += 1;
                if rough_cleaning_retries > config.max_groups {
                    break;
                }
                continue;
            };

            let info = GroupInfo::new(fit.integral, fit.center, fit.sigma);

            // The first accepted fit after the reference height sets the
            // integral scale.
            if reference_height.is_some() && reference_integral.is_none() {
                reference_integral = Some(info.integral);
            }
            if let Some(integral) = reference_integral {
                if info.integral < integral * config.frac_threshold {
                    break;
                }
            }

            hist.subtract_gaussian(info.integral, info.center, info.sigma, config.remove_sigma_n);
            groups.push(TimeGroup::Real(info));
            if groups.len() >= config.max_groups {
                break;
            }
        }
        groups
    }

    /// A group counts as signal when it is real, carries any integral, and
    /// its center lies in the closed expected-signal window.
    fn is_signal(&self, group: &TimeGroup) -> bool {
        let (low, _, high) = self.config.expected_signal_time;
        group
            .info()
            .is_some_and(|info| info.integral.abs() > 0.0 && info.center >= low && info.center <= high)
    }

    /// Exponential signal weight: large integrals close to the expected
    /// signal center weigh the most.
    fn signal_weight(&self, group: &TimeGroup) -> f64 {
        let (_, signal_center, _) = self.config.expected_signal_time;
        let decay = (group.center() - signal_center).abs() / self.config.signal_lifetime;
        group.integral() * (-decay).exp()
    }

    /// Push background groups behind the signal groups.
    ///
    /// Insertion sort from the right: each non-signal key shifts past
    /// signal groups and past backgrounds of larger integral. Afterwards
    /// signal groups form a prefix in their original order, followed by
    /// backgrounds in descending integral, with placeholders at the tail.
    fn sort_background_groups(&self, groups: &mut [TimeGroup]) {
        let len = groups.len();
        if len < 2 {
            return;
        }
        for ij in (0..len - 1).rev() {
            let key = groups[ij];
            if self.is_signal(&key) {
                continue;
            }
            let key_integral = key.integral();
            let mut kj = ij + 1;
            while kj < len {
                let other = groups[kj];
                if !self.is_signal(&other) && other.integral() <= key_integral {
                    break;
                }
                groups[kj - 1] = other;
                kj += 1;
            }
            groups[kj - 1] = key;
        }
    }

    /// Order the leading signal groups by descending exponential weight.
    ///
    /// Runs only over the signal prefix and only when `signal_lifetime` is
    /// positive. Equal weights end up in reverse of their previous order.
    fn sort_signal_groups(&self, groups: &mut [TimeGroup]) {
        if self.config.signal_lifetime <= 0.0 {
            return;
        }
        for ij in 1..groups.len() {
            let key = groups[ij];
            if key.integral() <= 0.0 || !self.is_signal(&key) {
                break;
            }
            let key_weight = self.signal_weight(&key);
            let mut kj = ij;
            while kj > 0 {
                let other = groups[kj - 1];
                if self.signal_weight(&other) > key_weight {
                    break;
                }
                groups[kj] = other;
                kj -= 1;
            }
            groups[kj] = key;
        }
    }

    /// Write group ids (and optionally fitted parameters) onto the event.
    ///
    /// A sample gets the id of every group whose acceptance window covers
    /// it. Samples no group claimed, on hits no group claimed any sample
    /// of, get a sentinel: underflow or overflow for samples outside the
    /// histogram range, `-1` otherwise.
    fn assign_group_ids(
        &self,
        event: &mut Event,
        range_low: f64,
        range_high: f64,
        groups: &[TimeGroup],
    ) {
        let config = &self.config;

        // Snapshot the leading samples so the event can be mutated below.
        let samples: Vec<(StripId, Vec<f64>)> = event
            .hits()
            .map(|hit| {
                (
                    hit.strip_id(),
                    hit.calibrated_times(Edge::Leading).to_vec(),
                )
            })
            .collect();

        // Without any group slot every hit is an orphan.
        if groups.is_empty() {
            for (strip, _) in &samples {
                event.push_group_id(strip, -1);
            }
            return;
        }

        let last = groups.len() - 1;
        for (index, group) in groups.iter().enumerate() {
            // Placeholders match nothing, but the last slot still runs so
            // leftover samples get their sentinel.
            let window = group.info().map(|info| {
                let low = (info.center - config.accept_sigma_n * info.sigma).max(range_low);
                let high = (info.center + config.accept_sigma_n * info.sigma).min(range_high);
                (low, high, *info)
            });
            if window.is_none() && index != last {
                continue;
            }
            let group_id = index as i32;

            for (strip, times) in &samples {
                for &time in times {
                    match window {
                        Some((low, high, info)) if time >= low && time <= high => {
                            event.push_group_id(strip, group_id);
                            if config.write_group_info {
                                event.push_group_info(strip, info);
                            }
                        }
                        _ => {
                            if index == last
                                && event.hit(strip).is_some_and(|hit| !hit.has_group_ids())
                            {
                                let id = if config.include_out_of_range && time < range_low {
                                    config.underflow_group_id()
                                } else if config.include_out_of_range && time > range_high {
                                    config.overflow_group_id()
                                } else {
                                    -1
                                };
                                event.push_group_id(strip, id);
                            }
                        }
                    }
                }
            }
        }
    }
}
