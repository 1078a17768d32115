//! Keplerian orbit solver.
//!
//! Elements follow the planetary fact-sheet convention: angles in degrees,
//! the perihelion given as a *longitude* (node + argument), the phase given
//! as the mean longitude at the epoch, and the period in days.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::normalize_degrees;

/// Iteration cap for Kepler's equation. Newton converges in a handful of
/// steps for every eccentricity the catalog uses; hitting the cap means the
/// elements are outside the model.
pub const MAX_KEPLER_ITERATIONS: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitError {
    #[error("Kepler's equation did not converge after {iterations} iterations (last correction {residual:e} rad)")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("eccentricity {0} is outside the elliptic range [0, 1)")]
    InvalidEccentricity(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Semi-major axis (AU)
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    /// Inclination (degrees)
    pub inclination: f64,
    /// Longitude of the ascending node (degrees)
    pub ascending_node: f64,
    /// Longitude of perihelion (degrees)
    pub perihelion_longitude: f64,
    /// Mean longitude at the epoch (degrees)
    pub mean_longitude: f64,
    /// Mass in earth masses
    pub mass: f64,
    /// Sidereal period (days)
    pub period: f64,
}

impl OrbitalElements {
    /// Mean anomaly in degrees, normalized to [0, 360).
    pub fn mean_anomaly(&self, days: f64) -> f64 {
        normalize_degrees(
            self.mean_longitude + (360.0 / self.period) * days - self.perihelion_longitude,
        )
    }

    pub fn argument_of_perihelion(&self) -> f64 {
        self.perihelion_longitude - self.ascending_node
    }

    /// Rotation from the orbital plane (x toward perihelion) into the
    /// reference frame: Rz(Ω) · Rx(i) · Rz(ω).
    pub fn orbital_plane_to_reference(&self) -> Matrix3<f64> {
        let (so, co) = self.ascending_node.to_radians().sin_cos();
        let (si, ci) = self.inclination.to_radians().sin_cos();
        let (sw, cw) = self.argument_of_perihelion().to_radians().sin_cos();

        Matrix3::new(
            co * cw - so * sw * ci,
            -co * sw - so * cw * ci,
            so * si,

            so * cw + co * sw * ci,
            -so * sw + co * cw * ci,
            -co * si,

            sw * si,
            cw * si,
            ci,
        )
    }

    pub fn perihelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    pub fn aphelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }
}

/// Solves `M = E - e sin E` for the eccentric anomaly (radians), stopping
/// once the Newton correction drops below `precision`.
pub fn eccentric_anomaly(mean_anomaly: f64, e: f64, precision: f64) -> Result<f64, OrbitError> {
    if !(0.0..1.0).contains(&e) {
        return Err(OrbitError::InvalidEccentricity(e));
    }
    if e == 0.0 {
        return Ok(mean_anomaly);
    }

    let mut ea = if e < 0.8 { mean_anomaly } else { std::f64::consts::PI };
    let mut delta = f64::INFINITY;
    for _ in 0..MAX_KEPLER_ITERATIONS {
        let f = ea - e * ea.sin() - mean_anomaly;
        let fp = 1.0 - e * ea.cos();
        delta = f / fp;
        ea -= delta;
        if delta.abs() < precision {
            return Ok(ea);
        }
    }

    Err(OrbitError::NoConvergence {
        iterations: MAX_KEPLER_ITERATIONS,
        residual: delta.abs(),
    })
}

/// Position of the body `days` after the epoch, in the elements' reference
/// frame and units. The vector's length is the instantaneous orbital radius.
pub fn position(elements: &OrbitalElements, days: f64, precision: f64) -> Result<Vector3<f64>, OrbitError> {
    let m = elements.mean_anomaly(days).to_radians();
    let e = elements.eccentricity;
    let ea = eccentric_anomaly(m, e, precision)?;

    let (sin_ea, cos_ea) = ea.sin_cos();
    let a = elements.semi_major_axis;
    let in_plane = Vector3::new(a * (cos_ea - e), a * (1.0 - e * e).sqrt() * sin_ea, 0.0);

    Ok(elements.orbital_plane_to_reference() * in_plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn earth_like() -> OrbitalElements {
        OrbitalElements {
            semi_major_axis: 1.00000011,
            eccentricity: 0.01671022,
            inclination: 0.00005,
            ascending_node: -11.26064,
            perihelion_longitude: 102.94719,
            mean_longitude: 100.46435,
            mass: 1.0,
            period: 365.256,
        }
    }

    fn circular() -> OrbitalElements {
        OrbitalElements {
            semi_major_axis: 2.0,
            eccentricity: 0.0,
            inclination: 0.0,
            ascending_node: 0.0,
            perihelion_longitude: 0.0,
            mean_longitude: 30.0,
            mass: 1.0,
            period: 100.0,
        }
    }

    #[test]
    fn test_kepler_circular_returns_mean_anomaly() {
        for m in [0.0, 0.3, PI / 4.0, 2.0, 5.9] {
            assert_eq!(eccentric_anomaly(m, 0.0, 1e-9).unwrap(), m);
        }
    }

    #[test]
    fn test_kepler_high_eccentricity_converges_within_cap() {
        let e = 0.249;
        for i in 0..64 {
            let m = i as f64 * 2.0 * PI / 64.0;
            let ea = eccentric_anomaly(m, e, 1e-12).unwrap();
            assert_relative_eq!(ea - e * ea.sin(), m, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_kepler_rejects_hyperbolic() {
        assert_eq!(eccentric_anomaly(1.0, 1.2, 1e-6), Err(OrbitError::InvalidEccentricity(1.2)));
    }

    #[test]
    fn test_kepler_unreachable_precision_is_reported() {
        let err = eccentric_anomaly(1.0, 0.2, 0.0).unwrap_err();
        assert!(matches!(err, OrbitError::NoConvergence { iterations: MAX_KEPLER_ITERATIONS, .. }));
    }

    #[test]
    fn test_radius_within_perihelion_and_aphelion() {
        let el = earth_like();
        for day in (-4000..4000).step_by(37) {
            let r = position(&el, day as f64, 1e-9).unwrap().norm();
            assert!(r >= el.perihelion_distance() - 1e-9, "r={r} at day {day}");
            assert!(r <= el.aphelion_distance() + 1e-9, "r={r} at day {day}");
        }
    }

    #[test]
    fn test_position_is_deterministic() {
        let el = earth_like();
        let a = position(&el, 8765.4321, 1e-6).unwrap();
        let b = position(&el, 8765.4321, 1e-6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_circular_orbit_repeats_after_one_period() {
        let el = circular();
        let p0 = position(&el, 0.0, 1e-9).unwrap();
        let p1 = position(&el, el.period, 1e-9).unwrap();
        assert_relative_eq!(p0, p1, epsilon = 1e-9);
        assert_relative_eq!(p0.norm(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(p0.z, 0.0);
        assert_relative_eq!(p0.y.atan2(p0.x), 30f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_earth_near_perihelion_in_early_january() {
        // Perihelion falls around Jan 3; at the epoch the earth is close to it.
        let r = position(&earth_like(), 2.0, 1e-9).unwrap().norm();
        assert!(r < 0.9835, "r={r}");
    }

    #[test]
    fn test_inclined_orbit_reaches_out_of_plane() {
        let mut el = circular();
        el.inclination = 30.0;
        el.ascending_node = 0.0;
        let quarter = position(&el, el.period * (60.0 / 360.0), 1e-9).unwrap();
        // Mean longitude 90° puts the body a quarter turn past the node.
        assert_relative_eq!(quarter.z, 2.0 * 30f64.to_radians().sin(), epsilon = 1e-9);
    }
}
