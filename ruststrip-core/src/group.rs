//! Time-group records produced by the grouping engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fitted parameters of one time group: a single Gaussian peak in the
/// event's time histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupInfo {
    /// Area under the fitted Gaussian.
    pub integral: f64,
    /// Peak position [ns].
    pub center: f64,
    /// Peak width [ns], always non-negative.
    pub sigma: f64,
}

impl GroupInfo {
    /// Creates a group record; `sigma` is stored as its absolute value.
    #[must_use]
    pub fn new(integral: f64, center: f64, sigma: f64) -> Self {
        Self {
            integral,
            center,
            sigma: sigma.abs(),
        }
    }
}

/// One slot of the engine's group list.
///
/// The list is padded to a fixed capacity, so a slot is either a fitted
/// group or an explicit placeholder. Placeholders never match samples and
/// carry no parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeGroup {
    /// A fitted Gaussian group.
    Real(GroupInfo),
    /// Padding up to the configured group capacity.
    Placeholder,
}

impl TimeGroup {
    /// Whether this slot holds a fitted group.
    #[inline]
    #[must_use]
    pub fn is_real(&self) -> bool {
        matches!(self, TimeGroup::Real(_))
    }

    /// The fitted parameters, if any.
    #[inline]
    #[must_use]
    pub fn info(&self) -> Option<&GroupInfo> {
        match self {
            TimeGroup::Real(info) => Some(info),
            TimeGroup::Placeholder => None,
        }
    }

    /// Integral of the fitted group, `0.0` for placeholders.
    #[inline]
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.info().map_or(0.0, |g| g.integral)
    }

    /// Center of the fitted group, `0.0` for placeholders.
    #[inline]
    #[must_use]
    pub fn center(&self) -> f64 {
        self.info().map_or(0.0, |g| g.center)
    }
}
