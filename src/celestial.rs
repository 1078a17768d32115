//! Solar-system body catalog.
//!
//! Orbital elements come from the NASA planetary fact sheets (J2000 epoch).
//! Magnitude laws use the standard fits of the form
//! `base + 5 log10(r R) + a FV + b FV^n`.

use crate::orbit::OrbitalElements;

/// Sun mass in earth masses.
pub const SUN_MASS: f64 = 3.33e5;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CelestialBody {
    Sun,
    Mercury,
    Venus,
    Earth,
    Moon,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnitudeLaw {
    pub base: f64,
    pub phase_factor: f64,
    pub nonlinear_factor: f64,
    pub nonlinear_exponent: f64,
}

impl MagnitudeLaw {
    /// Apparent magnitude given the sun-body distance `r`, the
    /// observer-body distance `big_r` (both AU) and the phase angle in
    /// degrees.
    pub fn magnitude(&self, r: f64, big_r: f64, phase_deg: f64) -> f64 {
        self.base
            + 5.0 * (r * big_r).log10()
            + self.phase_factor * phase_deg
            + self.nonlinear_factor * phase_deg.powf(self.nonlinear_exponent)
    }
}

impl CelestialBody {
    /// The nine bodies summed for the barycentre, in catalog order.
    pub const PLANETS: [CelestialBody; 9] = [
        Self::Mercury,
        Self::Venus,
        Self::Earth,
        Self::Mars,
        Self::Jupiter,
        Self::Saturn,
        Self::Uranus,
        Self::Neptune,
        Self::Pluto,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sun => "Sun",
            Self::Mercury => "Mercury",
            Self::Venus => "Venus",
            Self::Earth => "Earth",
            Self::Moon => "Moon",
            Self::Mars => "Mars",
            Self::Jupiter => "Jupiter",
            Self::Saturn => "Saturn",
            Self::Uranus => "Uranus",
            Self::Neptune => "Neptune",
            Self::Pluto => "Pluto",
        }
    }

    pub fn texture(&self) -> &'static str {
        match self {
            Self::Sun => "sun.jpg",
            Self::Mercury => "mercury.jpg",
            Self::Venus => "venus.jpg",
            Self::Earth => "earth.png",
            Self::Moon => "moon.jpg",
            Self::Mars => "mars.jpg",
            Self::Jupiter => "jupiter.jpg",
            Self::Saturn => "saturn.jpg",
            Self::Uranus => "uranus.jpg",
            Self::Neptune => "neptune.jpg",
            Self::Pluto => "pluto.jpg",
        }
    }

    /// Per-body multiplier on the sprite size.
    pub fn scale(&self) -> f64 {
        match self {
            Self::Saturn => 2.0,
            _ => 1.0,
        }
    }

    pub fn base_dot_radius(&self) -> f64 {
        match self {
            Self::Sun | Self::Moon => 5.0,
            _ => 2.0,
        }
    }

    /// Fixed J2000 elements. `None` for the sun and the moon, whose
    /// elements depend on time (see [`moon_elements`]).
    pub fn elements(&self) -> Option<OrbitalElements> {
        let (mass, period, a, e, incl, node, peri, mean_long) = match self {
            Self::Mercury => (0.0558, 87.969, 0.38709893, 0.20563069, 7.00487, 48.33167, 77.45645, 252.25084),
            Self::Venus => (0.815, 224.701, 0.72333199, 0.00677323, 3.39471, 76.68069, 131.53298, 181.97973),
            Self::Earth => (1.0, 365.256, 1.00000011, 0.01671022, 0.00005, -11.26064, 102.94719, 100.46435),
            Self::Mars => (0.1075, 686.980, 1.52366231, 0.09341233, 1.85061, 49.57854, 336.04084, 355.45332),
            Self::Jupiter => (17.83, 4332.589, 5.20336301, 0.04839266, 1.30530, 100.55615, 14.75385, 34.40438),
            Self::Saturn => (95.147, 10759.22, 9.53707032, 0.05415060, 2.48446, 113.71504, 92.43194, 49.94432),
            Self::Uranus => (14.54, 30685.4, 19.19126393, 0.04716771, 0.76986, 74.22988, 170.96424, 313.23218),
            Self::Neptune => (17.23, 60189.0, 30.06896348, 0.00858587, 1.76917, 131.72169, 44.97135, 304.88003),
            Self::Pluto => (0.0022, 90465.0, 39.48168677, 0.24880766, 17.14175, 110.30347, 224.06676, 238.92881),
            Self::Sun | Self::Moon => return None,
        };
        Some(OrbitalElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination: incl,
            ascending_node: node,
            perihelion_longitude: peri,
            mean_longitude: mean_long,
            mass,
            period,
        })
    }

    pub fn magnitude_law(&self) -> Option<MagnitudeLaw> {
        let (base, phase_factor, nonlinear_factor, nonlinear_exponent) = match self {
            Self::Mercury => (-0.36, 0.027, 2.2e-13, 6.0),
            Self::Venus => (-4.34, 0.013, 4.2e-7, 3.0),
            Self::Mars => (-1.51, 0.016, 0.0, 1.0),
            Self::Jupiter => (-9.25, 0.014, 0.0, 1.0),
            Self::Saturn => (-9.0, 0.044, 0.0, 1.0),
            Self::Uranus => (-7.15, 0.001, 0.0, 1.0),
            Self::Neptune => (-6.90, 0.001, 0.0, 1.0),
            _ => return None,
        };
        Some(MagnitudeLaw { base, phase_factor, nonlinear_factor, nonlinear_exponent })
    }
}

/// Geocentric lunar elements for `days` after the epoch. The node regresses
/// and the perihelion advances, so these are rebuilt every frame.
pub fn moon_elements(days: f64) -> OrbitalElements {
    let node = 125.1228 - 0.0529538083 * days;
    let perigee_argument = 318.0634 + 0.1643573223 * days;
    OrbitalElements {
        semi_major_axis: 2.569519e-3,
        eccentricity: 0.0549,
        inclination: 5.145,
        ascending_node: node,
        perihelion_longitude: node + perigee_argument,
        mean_longitude: 218.32,
        mass: 1.23e-2,
        period: 27.322,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planets_have_elements() {
        for body in CelestialBody::PLANETS {
            let el = body.elements().expect("planet elements");
            assert!(el.eccentricity < 0.25, "{} e={}", body.label(), el.eccentricity);
            assert!(el.mass > 0.0);
        }
        assert!(CelestialBody::Sun.elements().is_none());
        assert!(CelestialBody::Moon.elements().is_none());
    }

    #[test]
    fn test_magnitude_law_matches_fact_sheet_opposition() {
        // Jupiter near opposition: r ~ 5.2, R ~ 4.2, phase ~ 0 gives about -2.5.
        let law = CelestialBody::Jupiter.magnitude_law().unwrap();
        let mag = law.magnitude(5.2, 4.2, 0.0);
        assert!((mag - -2.55).abs() < 0.1, "mag={mag}");
    }

    #[test]
    fn test_moon_node_regresses() {
        let a = moon_elements(0.0);
        let b = moon_elements(100.0);
        assert!(b.ascending_node < a.ascending_node);
        assert!(b.argument_of_perihelion() > a.argument_of_perihelion());
    }
}
