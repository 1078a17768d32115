//! Geocentric directions of the sun, moon and planets.
//!
//! Each planet is solved heliocentrically, the sun is displaced from the
//! origin by the planets' mass-weighted sum, and the moon is solved around
//! the earth with empirical perturbations before everything is turned into
//! unit directions as seen from the earth.

use nalgebra::Vector3;

use crate::celestial::{moon_elements, CelestialBody, SUN_MASS};
use crate::math::{cartesian_to_lat_lon, lat_lon_to_unit_vector};
use crate::moon::{moon_latitude_correction_degrees, moon_longitude_correction_degrees};
use crate::orbit::{position, OrbitError};
use crate::sprite::{Color, Sprite};

/// Angular precision (radians) for every body solved here.
pub const SOLVER_PRECISION: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct BodyState {
    pub body: CelestialBody,
    /// Heliocentric ecliptic position (AU); the moon's is earth-relative.
    pub position: Vector3<f64>,
    pub magnitude: Option<f64>,
}

/// The planets solved for one instant.
#[derive(Clone, Debug)]
pub struct SolarSystem {
    pub days: f64,
    pub planets: Vec<BodyState>,
    pub sun: Vector3<f64>,
    pub earth: Vector3<f64>,
    /// Moon relative to the earth, perturbations applied.
    pub earth_to_moon: Vector3<f64>,
}

/// Sum of `mass · position` over the planets. Not divided by the total mass.
pub fn weighted_position_sum(planets: &[BodyState]) -> Vector3<f64> {
    planets.iter().fold(Vector3::zeros(), |acc, p| {
        let mass = p.body.elements().map(|e| e.mass).unwrap_or(0.0);
        acc + p.position * mass
    })
}

pub fn sun_offset(planets: &[BodyState]) -> Vector3<f64> {
    weighted_position_sum(planets) * (-1.0 / SUN_MASS)
}

/// Earth-relative lunar position with the periodic corrections folded in.
pub fn moon_from_earth(days: f64) -> Result<Vector3<f64>, OrbitError> {
    let raw = position(&moon_elements(days), days, SOLVER_PRECISION)?;
    let radius = raw.norm();
    let (lat, lon) = cartesian_to_lat_lon(&raw);

    let lon = lon + moon_longitude_correction_degrees(days).to_radians();
    let lat = lat + moon_latitude_correction_degrees(days).to_radians();

    Ok(lat_lon_to_unit_vector(lat, lon) * radius)
}

fn phase_angle_degrees(body: &Vector3<f64>, sun: &Vector3<f64>, earth: &Vector3<f64>) -> f64 {
    let to_sun = sun - body;
    let to_earth = earth - body;
    let c = to_sun.dot(&to_earth) / (to_sun.norm() * to_earth.norm());
    c.clamp(-1.0, 1.0).acos().to_degrees()
}

impl SolarSystem {
    /// Solves every body for `days` after the epoch. Bodies whose orbit fails
    /// to converge are logged and left out of this instant.
    pub fn compute(days: f64) -> Self {
        let mut planets = Vec::with_capacity(CelestialBody::PLANETS.len());
        for body in CelestialBody::PLANETS {
            let Some(elements) = body.elements() else { continue };
            match position(&elements, days, SOLVER_PRECISION) {
                Ok(p) => planets.push(BodyState { body, position: p, magnitude: None }),
                Err(e) => log::warn!("{} skipped: {e}", body.label()),
            }
        }

        let sun = sun_offset(&planets);
        let earth = planets
            .iter()
            .find(|p| p.body == CelestialBody::Earth)
            .map(|p| p.position)
            .unwrap_or_else(Vector3::zeros);

        for p in &mut planets {
            if let Some(law) = p.body.magnitude_law() {
                let r = (p.position - sun).norm();
                let big_r = (p.position - earth).norm();
                let fv = phase_angle_degrees(&p.position, &sun, &earth);
                p.magnitude = Some(law.magnitude(r, big_r, fv));
            }
        }

        let earth_to_moon = match moon_from_earth(days) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Moon skipped: {e}");
                Vector3::zeros()
            }
        };

        Self { days, planets, sun, earth, earth_to_moon }
    }

    /// Renderable records in draw order: the sun, then the planets with the
    /// moon standing in for the earth.
    pub fn sprites(&self) -> Vec<Sprite> {
        let mut out = Vec::with_capacity(self.planets.len() + 1);

        if let Some(dir) = (self.sun - self.earth).try_normalize(0.0) {
            out.push(body_sprite(CelestialBody::Sun, dir, 0.0));
        }

        for p in &self.planets {
            if p.body == CelestialBody::Earth {
                if let Some(dir) = self.earth_to_moon.try_normalize(0.0) {
                    out.push(body_sprite(CelestialBody::Moon, dir, 0.0));
                }
                continue;
            }
            let Some(dir) = (p.position - self.earth).try_normalize(0.0) else { continue };
            out.push(body_sprite(p.body, dir, p.magnitude.unwrap_or(0.0)));
        }

        out
    }
}

fn body_sprite(body: CelestialBody, direction: Vector3<f64>, magnitude: f64) -> Sprite {
    Sprite {
        name: body.label().to_string(),
        direction,
        color: Color::WHITE,
        scale: body.base_dot_radius() * body.scale(),
        magnitude,
        texture: body.texture(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_earth_never_in_sprites() {
        for days in [-5000.0, 0.0, 1234.5, 9000.25] {
            let sprites = SolarSystem::compute(days).sprites();
            assert!(sprites.iter().all(|s| s.name != "Earth"));
            assert_eq!(sprites.len(), 10);
        }
    }

    #[test]
    fn test_sprite_order_and_scale() {
        let sprites = SolarSystem::compute(100.0).sprites();
        let names: Vec<&str> = sprites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Sun", "Mercury", "Venus", "Moon", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto"]
        );
        assert_eq!(sprites[0].scale, 5.0);
        assert_eq!(sprites[3].scale, 5.0);
        assert_eq!(sprites[1].scale, 2.0);
        assert_eq!(sprites[6].scale, 4.0);
        assert!(sprites.iter().all(|s| s.color == Color::WHITE));
    }

    #[test]
    fn test_directions_are_unit_vectors() {
        for s in SolarSystem::compute(3210.0).sprites() {
            assert_relative_eq!(s.direction.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sun_offset_is_tiny_and_opposes_mass_sum() {
        let ss = SolarSystem::compute(0.0);
        let sum = weighted_position_sum(&ss.planets);
        assert_relative_eq!(ss.sun, sum * (-1.0 / SUN_MASS), epsilon = 1e-15);
        // Jupiter dominates; the sun sits within about 0.01 AU of the origin.
        assert!(ss.sun.norm() < 0.01);
    }

    #[test]
    fn test_sun_roughly_opposite_earth() {
        let ss = SolarSystem::compute(500.0);
        let to_sun = (ss.sun - ss.earth).normalize();
        let earth_dir = ss.earth.normalize();
        assert!(to_sun.dot(&earth_dir) < -0.999);
    }

    #[test]
    fn test_moon_distance_is_lunar() {
        for days in [0.0, 10.0, 20.0, 7000.0] {
            let d = moon_from_earth(days).unwrap().norm();
            // 356,000..407,000 km in AU
            assert!(d > 0.00237 && d < 0.00273, "moon distance {d} at {days}");
        }
    }

    #[test]
    fn test_venus_magnitude_is_brilliant() {
        let ss = SolarSystem::compute(0.0);
        let venus = ss.planets.iter().find(|p| p.body == CelestialBody::Venus).unwrap();
        let mag = venus.magnitude.unwrap();
        assert!(mag < -3.0 && mag > -5.0, "venus mag {mag}");
    }
}
