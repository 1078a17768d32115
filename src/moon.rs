//! Non-Keplerian corrections to the moon's ecliptic longitude and latitude.
//!
//! The sun's pull makes the lunar orbit precess and wobble in ways a fixed
//! ellipse cannot follow. The largest periodic terms (evection, variation,
//! the yearly equation and friends) are summed here as corrections in
//! degrees, to be added to the solved spherical coordinates.

struct Arguments {
    /// Sun's mean anomaly
    ms: f64,
    /// Moon's mean anomaly
    mm: f64,
    /// Mean elongation of the moon
    d: f64,
    /// Moon's argument of latitude
    f: f64,
}

fn arguments(days: f64) -> Arguments {
    let ms = 356.0470 + 0.9856002585 * days;
    let mm = 115.3654 + 13.0649929509 * days;
    let nm = 125.1228 - 0.0529538083 * days;
    let ws = 282.9404 + 4.70935e-5 * days;
    let wm = 318.0634 + 0.1643573223 * days;

    let ls = ms + ws;
    let lm = mm + wm + nm;

    Arguments {
        ms: ms.to_radians(),
        mm: mm.to_radians(),
        d: (lm - ls).to_radians(),
        f: (lm - nm).to_radians(),
    }
}

pub fn moon_longitude_correction_degrees(days: f64) -> f64 {
    let Arguments { ms, mm, d, f } = arguments(days);

    -1.274 * (mm - 2.0 * d).sin()
        + 0.658 * (2.0 * d).sin()
        - 0.186 * ms.sin()
        - 0.059 * (2.0 * mm - 2.0 * d).sin()
        - 0.057 * (mm - 2.0 * d + ms).sin()
        + 0.053 * (mm + 2.0 * d).sin()
        + 0.046 * (2.0 * d - ms).sin()
        + 0.041 * (mm - ms).sin()
        - 0.035 * d.sin()
        - 0.031 * (mm + ms).sin()
        - 0.015 * (2.0 * f - 2.0 * d).sin()
        + 0.011 * (mm - 4.0 * d).sin()
}

pub fn moon_latitude_correction_degrees(days: f64) -> f64 {
    let Arguments { mm, d, f, .. } = arguments(days);

    -0.173 * (f - 2.0 * d).sin()
        - 0.055 * (mm - f - 2.0 * d).sin()
        - 0.046 * (mm + f - 2.0 * d).sin()
        + 0.033 * (f + 2.0 * d).sin()
        + 0.017 * (2.0 * mm + f).sin()
}
