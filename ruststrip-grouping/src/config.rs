//! Grouping engine configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the time-grouping engine.
///
/// All times are in nanoseconds. The defaults reproduce the detector's
/// production tuning for a 100 ns trigger window around −255 ns.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupingConfig {
    /// Histogram bins per nanosecond.
    pub rebinning_factor: u32,
    /// Truncation of the fill kernel, in kernel sigmas.
    pub fill_sigma_n: f64,
    /// Width of the Gaussian kernel added per leading sample.
    pub cls_sigma: f64,
    /// Allowed (lower, upper) range of a fitted group width.
    pub limit_sigma: (f64, f64),
    /// Half-width of the window the peak fit runs over.
    pub fit_range_half_width: f64,
    /// Truncation used when subtracting an extracted group, in sigmas.
    pub remove_sigma_n: f64,
    /// Fraction of the in-window reference peak (or integral) below which
    /// extraction stops.
    pub frac_threshold: f64,
    /// Capacity of the group list; zero is legal and orphans every sample.
    pub max_groups: usize,
    /// Signal window as (low, center, high).
    pub expected_signal_time: (f64, f64, f64),
    /// Exponential weight constant of the signal sort; non-positive
    /// disables the sort.
    pub signal_lifetime: f64,
    /// Half-width of a group's acceptance window, in fitted sigmas.
    pub accept_sigma_n: f64,
    /// Record fitted parameters next to each assigned id.
    pub write_group_info: bool,
    /// Use underflow/overflow sentinel ids for samples outside the
    /// histogram range.
    pub include_out_of_range: bool,
    /// Explicit histogram range; `None` spans the event's calibrated
    /// leading-time bounds.
    pub time_range: Option<(f64, f64)>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            rebinning_factor: 1,
            fill_sigma_n: 3.0,
            cls_sigma: 2.0,
            limit_sigma: (1.0, 15.0),
            fit_range_half_width: 5.0,
            remove_sigma_n: 7.0,
            frac_threshold: 0.05,
            max_groups: 20,
            expected_signal_time: (-305.0, -255.0, -205.0),
            signal_lifetime: 25000.0,
            accept_sigma_n: 7.0,
            write_group_info: true,
            include_out_of_range: true,
            time_range: None,
        }
    }
}

impl GroupingConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the histogram bins per nanosecond.
    pub fn with_rebinning_factor(mut self, factor: u32) -> Self {
        self.rebinning_factor = factor;
        self
    }

    /// Sets the fill kernel width.
    pub fn with_cls_sigma(mut self, sigma: f64) -> Self {
        self.cls_sigma = sigma;
        self
    }

    /// Sets the fill kernel truncation in sigmas.
    pub fn with_fill_sigma_n(mut self, sigma_n: f64) -> Self {
        self.fill_sigma_n = sigma_n;
        self
    }

    /// Sets the subtraction truncation in sigmas.
    pub fn with_remove_sigma_n(mut self, sigma_n: f64) -> Self {
        self.remove_sigma_n = sigma_n;
        self
    }

    /// Sets the allowed fitted-width range.
    pub fn with_limit_sigma(mut self, lower: f64, upper: f64) -> Self {
        self.limit_sigma = (lower, upper);
        self
    }

    /// Sets the fit window half-width.
    pub fn with_fit_range_half_width(mut self, half_width: f64) -> Self {
        self.fit_range_half_width = half_width;
        self
    }

    /// Sets the extraction stop threshold.
    pub fn with_frac_threshold(mut self, fraction: f64) -> Self {
        self.frac_threshold = fraction;
        self
    }

    /// Sets the group list capacity.
    pub fn with_max_groups(mut self, max_groups: usize) -> Self {
        self.max_groups = max_groups;
        self
    }

    /// Sets the (low, center, high) signal window.
    pub fn with_expected_signal_time(mut self, low: f64, center: f64, high: f64) -> Self {
        self.expected_signal_time = (low, center, high);
        self
    }

    /// Sets the signal-sort lifetime.
    pub fn with_signal_lifetime(mut self, lifetime: f64) -> Self {
        self.signal_lifetime = lifetime;
        self
    }

    /// Sets the acceptance window half-width in sigmas.
    pub fn with_accept_sigma_n(mut self, sigma_n: f64) -> Self {
        self.accept_sigma_n = sigma_n;
        self
    }

    /// Enables or disables recording fitted parameters per assignment.
    pub fn with_write_group_info(mut self, write: bool) -> Self {
        self.write_group_info = write;
        self
    }

    /// Enables or disables out-of-range sentinel ids.
    pub fn with_include_out_of_range(mut self, include: bool) -> Self {
        self.include_out_of_range = include;
        self
    }

    /// Sets an explicit histogram range.
    pub fn with_time_range(mut self, low: f64, high: f64) -> Self {
        self.time_range = Some((low, high));
        self
    }

    /// The sentinel id for samples below the histogram range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn underflow_group_id(&self) -> i32 {
        self.max_groups as i32 + 1
    }

    /// The sentinel id for samples above the histogram range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn overflow_group_id(&self) -> i32 {
        self.max_groups as i32 + 2
    }

    /// Checks the configuration for numeric nonsense.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.rebinning_factor == 0 {
            return Err(Error::InvalidConfig("rebinning_factor must be at least 1".into()));
        }
        for (name, value) in [
            ("cls_sigma", self.cls_sigma),
            ("fill_sigma_n", self.fill_sigma_n),
            ("remove_sigma_n", self.remove_sigma_n),
            ("accept_sigma_n", self.accept_sigma_n),
            ("fit_range_half_width", self.fit_range_half_width),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        let (sigma_lo, sigma_hi) = self.limit_sigma;
        if !sigma_lo.is_finite() || !sigma_hi.is_finite() || sigma_lo <= 0.0 || sigma_lo > sigma_hi
        {
            return Err(Error::InvalidConfig(
                "limit_sigma must be positive and ordered".into(),
            ));
        }
        if !self.frac_threshold.is_finite()
            || self.frac_threshold < 0.0
            || self.frac_threshold >= 1.0
        {
            return Err(Error::InvalidConfig(
                "frac_threshold must lie in [0, 1)".into(),
            ));
        }
        let (low, center, high) = self.expected_signal_time;
        if !(low.is_finite() && center.is_finite() && high.is_finite())
            || low > center
            || center > high
        {
            return Err(Error::InvalidConfig(
                "expected_signal_time must be ordered (low, center, high)".into(),
            ));
        }
        if let Some((low, high)) = self.time_range {
            if !(low.is_finite() && high.is_finite()) || low > high {
                return Err(Error::InvalidConfig("time_range must be ordered".into()));
            }
        }
        Ok(())
    }
}
