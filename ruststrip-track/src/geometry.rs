//! Detector stack geometry: strip and layer coordinate mapping.
//!
//! The stack is uniform: detector planes alternate with absorber plates, so
//! layer `n` sits at `n * (air_gap + absorber_thickness)`, and strip `n`
//! covers one pitch with its measurement at the strip center. All lengths
//! are in meters.

/// Coordinate mapping for a uniform strip detector stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Transverse width of one readout strip [m].
    pub strip_pitch: f64,
    /// Air gap between an absorber plate and the next detector plane [m].
    pub air_gap: f64,
    /// Absorber plate thickness between consecutive layers [m].
    pub absorber_thickness: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            strip_pitch: 0.03,
            air_gap: 0.045,
            absorber_thickness: 0.056,
        }
    }
}

impl Geometry {
    /// Create with the default stack dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance between consecutive detector planes [m].
    #[inline]
    #[must_use]
    pub fn layer_spacing(&self) -> f64 {
        self.air_gap + self.absorber_thickness
    }

    /// Depth of a layer plane [m].
    #[inline]
    #[must_use]
    pub fn layer_z(&self, layer: u8) -> f64 {
        f64::from(layer) * self.layer_spacing()
    }

    /// The layer index whose plane is nearest to a depth.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn layer_at(&self, z: f64) -> i32 {
        (z / self.layer_spacing()).round() as i32
    }

    /// Center position of a strip across the readout direction [m].
    #[inline]
    #[must_use]
    pub fn strip_position(&self, strip: u8) -> f64 {
        (f64::from(strip) + 0.5) * self.strip_pitch
    }

    /// Uncertainty of a single strip position measurement [m].
    ///
    /// Standard deviation of a uniform distribution over one pitch.
    #[inline]
    #[must_use]
    pub fn position_uncertainty(&self) -> f64 {
        self.strip_pitch / 12.0_f64.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layer_planes_are_evenly_spaced() {
        let geometry = Geometry::new();
        assert_relative_eq!(geometry.layer_z(0), 0.0);
        assert_relative_eq!(geometry.layer_z(1), 0.101);
        assert_relative_eq!(geometry.layer_z(9), 0.909);
    }

    #[test]
    fn test_layer_at_inverts_layer_z() {
        let geometry = Geometry::new();
        for layer in 0..10u8 {
            assert_eq!(geometry.layer_at(geometry.layer_z(layer)), i32::from(layer));
        }
        // Off-plane depths round to the nearest plane.
        assert_eq!(geometry.layer_at(0.14), 1);
        assert_eq!(geometry.layer_at(0.16), 2);
        assert_eq!(geometry.layer_at(-0.09), -1);
    }

    #[test]
    fn test_strip_position_is_the_strip_center() {
        let geometry = Geometry::new();
        assert_relative_eq!(geometry.strip_position(0), 0.015);
        assert_relative_eq!(geometry.strip_position(63), 1.905);
    }

    #[test]
    fn test_position_uncertainty_of_a_uniform_strip() {
        let geometry = Geometry::new();
        assert_relative_eq!(
            geometry.position_uncertainty(),
            0.03 / 12.0_f64.sqrt(),
            epsilon = 1e-15
        );
    }
}
