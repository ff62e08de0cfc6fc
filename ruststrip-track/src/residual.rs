//! Leave-one-layer-out residual probes over grouped events.
//!
//! A probe takes the pixels an event's first time group lights up, refits
//! the track without one layer, and compares that layer's measurement with
//! the extrapolation. The position residual feeds alignment checks; the
//! propagation-corrected sample time feeds per-strip delay calibration.

use std::collections::BTreeMap;

use log::debug;

use ruststrip_core::{Edge, Event, LayerId, PixelId, Side, StripId};

use crate::fit::{SpacePoint, TrackFit};
use crate::geometry::Geometry;

/// Signal propagation speed along a strip [m/ns].
pub const SIGNAL_SPEED: f64 = 0.2;

/// Builds tracks from an event's first time group and probes each layer
/// against a fit of the others.
#[derive(Debug, Clone, Copy)]
pub struct ResidualHarness {
    /// Stack geometry used to position pixels.
    pub geometry: Geometry,
    /// Signal propagation speed along a strip [m/ns].
    pub signal_speed: f64,
}

impl Default for ResidualHarness {
    fn default() -> Self {
        Self {
            geometry: Geometry::new(),
            signal_speed: SIGNAL_SPEED,
        }
    }
}

/// One strip view of a probed pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResidual {
    /// The strip whose measurement was probed.
    pub strip: StripId,
    /// Extrapolated minus measured transverse position [m].
    pub position_residual: f64,
    /// First calibrated leading sample corrected for propagation along the
    /// strip [ns], when the strip has one.
    pub corrected_time: Option<f64>,
}

impl ResidualHarness {
    /// Creates a harness over the given stack geometry.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            signal_speed: SIGNAL_SPEED,
        }
    }

    /// The pixels lit by the event's first time group.
    ///
    /// A strip takes part when its hit has at least one calibrated leading
    /// sample and carries group id 0. Per layer and side the highest such
    /// strip wins, so each layer contributes at most one pixel.
    #[must_use]
    pub fn group_zero_pixels(&self, event: &Event) -> Vec<PixelId> {
        let mut strips: [BTreeMap<LayerId, u8>; 2] = [BTreeMap::new(), BTreeMap::new()];
        for hit in event.hits() {
            let strip = hit.strip_id();
            if hit.calibrated_times(Edge::Leading).is_empty() {
                continue;
            }
            if !hit.group_ids().contains(&0) {
                continue;
            }
            strips[strip.side.index()].insert(strip.layer_id(), strip.strip);
        }

        let [x_strips, y_strips] = strips;
        x_strips
            .iter()
            .filter_map(|(layer, &x_strip)| {
                let &y_strip = y_strips.get(layer)?;
                PixelId::from_strips(
                    layer.strip_id(Side::X, x_strip),
                    layer.strip_id(Side::Y, y_strip),
                )
            })
            .collect()
    }

    /// Positions pixels in the detector volume.
    #[must_use]
    pub fn space_points(&self, pixels: &[PixelId]) -> Vec<SpacePoint> {
        let weight = 1.0 / self.geometry.position_uncertainty();
        pixels
            .iter()
            .map(|pixel| {
                SpacePoint::new(
                    pixel.layer,
                    self.geometry.layer_z(pixel.layer),
                    self.geometry.strip_position(pixel.strip(Side::X)),
                    self.geometry.strip_position(pixel.strip(Side::Y)),
                    weight,
                )
            })
            .collect()
    }

    /// Probes every pixel layer against a fit of the remaining layers.
    ///
    /// Layers whose exclusion leaves a singular fit are skipped. Each
    /// surviving pixel yields one result per side.
    #[must_use]
    pub fn probe(&self, event: &Event, pixels: &[PixelId]) -> Vec<ProbeResidual> {
        let points = self.space_points(pixels);
        let mut layers: Vec<u8> = points.iter().map(|point| point.layer).collect();
        layers.sort_unstable();
        layers.dedup();

        let mut results = Vec::new();
        for &layer in &layers {
            let Some(track) = TrackFit::fit(&points, Some(layer)) else {
                debug!("probe of layer {layer} skipped, reference fit is singular");
                continue;
            };
            let z = self.geometry.layer_z(layer);
            for pixel in pixels.iter().filter(|pixel| pixel.layer == layer) {
                for side in Side::BOTH {
                    let strip = pixel.strip_id(side);
                    let extrapolated = track.axis(side).extrapolate(z);
                    let measured = self.geometry.strip_position(pixel.strip(side));
                    let along_strip = track.axis(side.other()).extrapolate(z);
                    let corrected_time = event
                        .calibrated_times(&strip, Edge::Leading)
                        .first()
                        .map(|&time| time - along_strip / self.signal_speed);
                    results.push(ProbeResidual {
                        strip,
                        position_residual: extrapolated - measured,
                        corrected_time,
                    });
                }
            }
        }
        results
    }

    /// Convenience wrapper: pixels from the first time group, then probe.
    #[must_use]
    pub fn probe_event(&self, event: &Event) -> Vec<ProbeResidual> {
        let pixels = self.group_zero_pixels(event);
        self.probe(event, &pixels)
    }
}
