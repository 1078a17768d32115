//! Spherical coordinates, angle wrapping and axis rotations.
//!
//! Everything here works in a right-handed frame with z toward the north
//! pole (or the ecliptic pole, for heliocentric vectors) and x toward the
//! reference meridian.

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::{FRAC_PI_2, TAU};

pub fn spherical_to_cartesian(radius: f64, lat: f64, lon: f64) -> Vector3<f64> {
    let (sl, cl) = lat.sin_cos();
    let (sn, cn) = lon.sin_cos();
    Vector3::new(radius * cl * cn, radius * cl * sn, radius * sl)
}

pub fn lat_lon_to_unit_vector(lat: f64, lon: f64) -> Vector3<f64> {
    spherical_to_cartesian(1.0, lat, lon)
}

/// Latitude in [-π/2, π/2] and longitude in [0, 2π) of a non-zero vector.
pub fn cartesian_to_lat_lon(v: &Vector3<f64>) -> (f64, f64) {
    let r = v.norm();
    let lat = (v.z / r).clamp(-1.0, 1.0).asin().clamp(-FRAC_PI_2, FRAC_PI_2);
    let lon = v.y.atan2(v.x).rem_euclid(TAU);
    (lat, lon)
}

pub fn normalize_degrees(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Wraps `value` into `[lo, hi)`.
pub fn modulo_range(value: f64, lo: f64, hi: f64) -> f64 {
    lo + (value - lo).rem_euclid(hi - lo)
}

pub fn rotation_x(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c, -s,
        0.0, s, c,
    )
}

pub fn rotation_y(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, 0.0, s,
        0.0, 1.0, 0.0,
        -s, 0.0, c,
    )
}

pub fn rotation_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, -s, 0.0,
        s, c, 0.0,
        0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lat_lon_round_trip_through_cartesian() {
        let v = spherical_to_cartesian(3.0, 0.4, 5.5);
        let (lat, lon) = cartesian_to_lat_lon(&v);
        assert_relative_eq!(lat, 0.4, epsilon = 1e-12);
        assert_relative_eq!(lon, 5.5, epsilon = 1e-12);
        assert_relative_eq!(v.norm(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_modulo_range_wraps_both_sides() {
        assert_relative_eq!(modulo_range(190.0, -180.0, 180.0), -170.0);
        assert_relative_eq!(modulo_range(-181.0, -180.0, 180.0), 179.0);
        assert_relative_eq!(modulo_range(45.0, -180.0, 180.0), 45.0);
    }

    #[test]
    fn test_rotations_are_right_handed() {
        let q = std::f64::consts::FRAC_PI_2;
        assert_relative_eq!(rotation_z(q) * Vector3::x(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(rotation_x(q) * Vector3::y(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(rotation_y(q) * Vector3::z(), Vector3::x(), epsilon = 1e-12);
    }
}
