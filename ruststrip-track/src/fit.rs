//! Weighted straight-line fits through layer measurements.
//!
//! Each transverse axis is fitted independently against depth: the X side
//! measures `x(z)`, the Y side `y(z)`. The normal equations are accumulated
//! in closed form, so a fit is a single pass over the points plus one more
//! for the chi-square.
//!
//! Key characteristics:
//! - Per-point statistical weights; both axes share one weight per point
//! - Optional layer exclusion, so a fit can serve as an unbiased reference
//!   for the layer it leaves out
//! - Parameter covariance is kept, giving an extrapolation variance at any
//!   depth
//! - A singular normal matrix (fewer than two distinct weighted depths)
//!   yields `None` instead of junk parameters

use ruststrip_core::Side;

/// One pixel measurement positioned in the detector volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacePoint {
    /// Layer the measurement came from.
    pub layer: u8,
    /// Depth of the layer plane [m].
    pub z: f64,
    /// X-side strip center [m].
    pub x: f64,
    /// Y-side strip center [m].
    pub y: f64,
    /// Statistical weight, the inverse of the position uncertainty.
    pub weight: f64,
}

impl SpacePoint {
    /// Creates a space point.
    #[must_use]
    pub fn new(layer: u8, z: f64, x: f64, y: f64, weight: f64) -> Self {
        Self {
            layer,
            z,
            x,
            y,
            weight,
        }
    }

    /// The transverse coordinate measured by one side.
    #[inline]
    #[must_use]
    pub fn coordinate(&self, side: Side) -> f64 {
        match side {
            Side::X => self.x,
            Side::Y => self.y,
        }
    }
}

/// One transverse projection of a fitted straight line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisFit {
    /// Change of the transverse coordinate per unit depth.
    pub slope: f64,
    /// Transverse coordinate at `z = 0` [m].
    pub intercept: f64,
    /// Weighted sum of squared deviations over the fitted points.
    pub chi2: f64,
    err_const: f64,
    err_cov: f64,
    err_linear: f64,
}

impl AxisFit {
    /// The fitted coordinate at a depth [m].
    #[inline]
    #[must_use]
    pub fn extrapolate(&self, z: f64) -> f64 {
        self.intercept + self.slope * z
    }

    /// Variance of the extrapolated coordinate at a depth.
    #[must_use]
    pub fn extrapolation_variance(&self, z: f64) -> f64 {
        self.err_const + 2.0 * self.err_cov * z + self.err_linear * z * z
    }
}

/// Straight-line track through both transverse projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackFit {
    /// The `x(z)` projection.
    pub x: AxisFit,
    /// The `y(z)` projection.
    pub y: AxisFit,
}

impl TrackFit {
    /// Fits both projections through the points with weighted least squares.
    ///
    /// Points on `skip_layer` are left out of the sums and the chi-square
    /// but can still be extrapolated to, which is what a leave-one-out
    /// residual probe needs. Returns `None` when either projection's normal
    /// matrix is singular.
    #[must_use]
    pub fn fit(points: &[SpacePoint], skip_layer: Option<u8>) -> Option<Self> {
        let x = fit_axis(points, skip_layer, Side::X)?;
        let y = fit_axis(points, skip_layer, Side::Y)?;
        Some(Self { x, y })
    }

    /// Both transverse coordinates at a depth.
    #[must_use]
    pub fn extrapolate(&self, z: f64) -> (f64, f64) {
        (self.x.extrapolate(z), self.y.extrapolate(z))
    }

    /// The projection read out by one side.
    #[inline]
    #[must_use]
    pub fn axis(&self, side: Side) -> &AxisFit {
        match side {
            Side::X => &self.x,
            Side::Y => &self.y,
        }
    }
}

fn fit_axis(points: &[SpacePoint], skip_layer: Option<u8>, side: Side) -> Option<AxisFit> {
    let mut szv = 0.0;
    let mut sz = 0.0;
    let mut sz2 = 0.0;
    let mut sv = 0.0;
    let mut sw = 0.0;
    for point in points {
        if skip_layer == Some(point.layer) {
            continue;
        }
        let w = point.weight;
        let v = point.coordinate(side);
        szv += point.z * v * w;
        sz += point.z * w;
        sz2 += point.z * point.z * w;
        sv += v * w;
        sw += w;
    }

    let det = sw * sz2 - sz * sz;
    if sw <= 0.0 || det.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let slope = (szv * sw - sz * sv) / det;
    let mut fit = AxisFit {
        slope,
        intercept: sv / sw - slope * sz / sw,
        chi2: 0.0,
        err_const: sz2 / det,
        err_cov: -sz / det,
        err_linear: sw / det,
    };

    for point in points {
        if skip_layer == Some(point.layer) {
            continue;
        }
        let deviation = fit.extrapolate(point.z) - point.coordinate(side);
        fit.chi2 += deviation * deviation * point.weight;
    }
    Some(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn on_line(layer: u8, z: f64) -> SpacePoint {
        // x = 0.1 + 0.2 z, y = 0.5 - 0.1 z
        SpacePoint::new(layer, z, 0.1 + 0.2 * z, 0.5 - 0.1 * z, 125.0)
    }

    #[test]
    fn test_collinear_points_are_recovered_exactly() {
        let points: Vec<SpacePoint> = (0..4).map(|l| on_line(l, 0.101 * f64::from(l))).collect();
        let track = TrackFit::fit(&points, None).unwrap();

        assert_relative_eq!(track.x.slope, 0.2, epsilon = 1e-9);
        assert_relative_eq!(track.x.intercept, 0.1, epsilon = 1e-9);
        assert_relative_eq!(track.y.slope, -0.1, epsilon = 1e-9);
        assert_relative_eq!(track.y.intercept, 0.5, epsilon = 1e-9);
        assert!(track.x.chi2 < 1e-12);
        assert!(track.y.chi2 < 1e-12);

        let (x, y) = track.extrapolate(1.0);
        assert_relative_eq!(x, 0.3, epsilon = 1e-9);
        assert_relative_eq!(y, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_chi2_accounts_for_the_weights() {
        // Two points pin the line; a third off by 0.01 in x pulls it.
        let mut points = vec![on_line(0, 0.0), on_line(1, 0.1), on_line(2, 0.2)];
        points[1].x += 0.01;
        let unweighted: Vec<SpacePoint> = points
            .iter()
            .map(|p| SpacePoint { weight: 1.0, ..*p })
            .collect();

        let heavy = TrackFit::fit(&points, None).unwrap();
        let light = TrackFit::fit(&unweighted, None).unwrap();

        // Equal weights cancel in the parameters but scale the chi-square.
        assert_relative_eq!(heavy.x.slope, light.x.slope, epsilon = 1e-12);
        assert_relative_eq!(heavy.x.intercept, light.x.intercept, epsilon = 1e-12);
        assert_relative_eq!(heavy.x.chi2, 125.0 * light.x.chi2, epsilon = 1e-9);
    }

    #[test]
    fn test_skipped_layer_does_not_pull_the_fit() {
        let mut points: Vec<SpacePoint> =
            (0..5).map(|l| on_line(l, 0.101 * f64::from(l))).collect();
        // A large outlier on layer 2 must not matter when layer 2 is skipped.
        points[2].x += 0.3;

        let track = TrackFit::fit(&points, Some(2)).unwrap();
        assert_relative_eq!(track.x.slope, 0.2, epsilon = 1e-9);
        assert_relative_eq!(track.x.intercept, 0.1, epsilon = 1e-9);
        assert!(track.x.chi2 < 1e-12);

        // The extrapolation at the skipped depth sees the true line.
        let (x, _) = track.extrapolate(0.202);
        assert_relative_eq!(x, 0.2f64.mul_add(0.202, 0.1), epsilon = 1e-9);
    }

    #[test]
    fn test_single_depth_is_singular() {
        assert!(TrackFit::fit(&[on_line(0, 0.0)], None).is_none());
        // Two points at the same depth are just as degenerate.
        let stacked = vec![
            SpacePoint::new(2, 0.25, 0.1, 0.2, 1.0),
            SpacePoint::new(2, 0.25, 0.3, 0.4, 1.0),
        ];
        assert!(TrackFit::fit(&stacked, None).is_none());
        // Skipping a layer can leave too few depths behind.
        let pair = vec![on_line(0, 0.0), on_line(1, 0.101)];
        assert!(TrackFit::fit(&pair, Some(1)).is_none());
        assert!(TrackFit::fit(&[], None).is_none());
    }

    #[test]
    fn test_extrapolation_variance_matches_the_normal_matrix() {
        // Two unit-weight points at z = 0 and z = 1: det = 1,
        // var(z) = 1 - 2 z + 2 z^2.
        let points = vec![
            SpacePoint::new(0, 0.0, 0.0, 0.0, 1.0),
            SpacePoint::new(1, 1.0, 1.0, 1.0, 1.0),
        ];
        let track = TrackFit::fit(&points, None).unwrap();
        assert_relative_eq!(track.x.extrapolation_variance(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(track.x.extrapolation_variance(1.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(track.x.extrapolation_variance(0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(track.x.extrapolation_variance(2.0), 5.0, epsilon = 1e-12);
    }
}
