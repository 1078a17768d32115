//! Fixed stars and constellation figures.
//!
//! Stars are stored as unit vectors in the equatorial frame (x toward the
//! vernal equinox, z toward the celestial pole). Both catalogs can be loaded
//! from JSON or fall back to a small built-in set of the brightest named
//! stars and a handful of well-known figures.

use std::path::Path;

use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

use crate::math::lat_lon_to_unit_vector;
use crate::sprite::{Color, Sprite};

/// Fainter stars are not drawn at all.
pub const MAX_DRAWN_MAGNITUDE: f64 = 4.0;
/// Only stars brighter than this compete for the floating name label.
pub const LABEL_MAGNITUDE: f64 = 2.5;

const MAG_TO_DIAMETER: [f64; 7] = [2.0, 1.5, 1.25, 1.0, 0.85, 0.75, 0.5];
const MAG_TO_COLOR: [f32; 7] = [1.0, 0.9, 0.7, 0.5, 0.3, 0.2, 0.1];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{constellation} references unknown star {star}")]
    UnknownStar { constellation: String, star: String },
}

fn read_catalog(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })
}

fn magnitude_bucket(magnitude: f64) -> usize {
    (magnitude as i64).clamp(0, 6) as usize
}

pub fn sprite_diameter(magnitude: f64) -> f64 {
    MAG_TO_DIAMETER[magnitude_bucket(magnitude)]
}

pub fn sprite_color_scale(magnitude: f64) -> f32 {
    MAG_TO_COLOR[magnitude_bucket(magnitude)]
}

/// Unit vector for a right ascension in hours and a declination in degrees.
pub fn ra_dec_to_unit_vector(ra_hours: f64, dec_degrees: f64) -> Vector3<f64> {
    lat_lon_to_unit_vector(dec_degrees.to_radians(), (ra_hours * 15.0).to_radians())
}

#[derive(Clone, Debug, Deserialize)]
struct StarEntry {
    #[serde(default)]
    name: String,
    ra_hours: f64,
    dec_degrees: f64,
    magnitude: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StarRecord {
    /// Empty for anonymous stars.
    pub name: String,
    pub direction: Vector3<f64>,
    pub magnitude: f64,
}

impl StarRecord {
    pub fn new(name: impl Into<String>, ra_hours: f64, dec_degrees: f64, magnitude: f64) -> Self {
        Self {
            name: name.into(),
            direction: ra_dec_to_unit_vector(ra_hours, dec_degrees),
            magnitude,
        }
    }

    pub fn is_drawn(&self) -> bool {
        self.magnitude <= MAX_DRAWN_MAGNITUDE
    }

    pub fn can_be_labelled(&self) -> bool {
        !self.name.is_empty() && self.magnitude < LABEL_MAGNITUDE
    }

    /// Billboard sized and dimmed by magnitude.
    pub fn sprite(&self, size_scale: f64) -> Sprite {
        Sprite {
            name: self.name.clone(),
            direction: self.direction,
            color: Color::WHITE.scaled(sprite_color_scale(self.magnitude)),
            scale: sprite_diameter(self.magnitude) * size_scale,
            magnitude: self.magnitude,
            texture: "star.png",
        }
    }
}

// (name, RA hours, Dec degrees, V magnitude), J2000
const BUILTIN_STARS: &[(&str, f64, f64, f64)] = &[
    ("Sirius", 6.7525, -16.716, -1.46),
    ("Canopus", 6.3992, -52.696, -0.74),
    ("Rigil Kentaurus", 14.6600, -60.834, -0.27),
    ("Arcturus", 14.2610, 19.182, -0.05),
    ("Vega", 18.6156, 38.784, 0.03),
    ("Capella", 5.2782, 45.998, 0.08),
    ("Rigel", 5.2423, -8.202, 0.13),
    ("Procyon", 7.6550, 5.225, 0.34),
    ("Achernar", 1.6286, -57.237, 0.46),
    ("Betelgeuse", 5.9195, 7.407, 0.50),
    ("Hadar", 14.0637, -60.373, 0.61),
    ("Altair", 19.8464, 8.868, 0.76),
    ("Acrux", 12.4433, -63.099, 0.77),
    ("Aldebaran", 4.5987, 16.509, 0.86),
    ("Antares", 16.4901, -26.432, 0.96),
    ("Spica", 13.4199, -11.161, 0.97),
    ("Pollux", 7.7553, 28.026, 1.14),
    ("Fomalhaut", 22.9608, -29.622, 1.16),
    ("Deneb", 20.6905, 45.280, 1.25),
    ("Mimosa", 12.7954, -59.689, 1.25),
    ("Regulus", 10.1395, 11.967, 1.35),
    ("Adhara", 6.9771, -28.972, 1.50),
    ("Castor", 7.5767, 31.888, 1.58),
    ("Shaula", 17.5601, -37.104, 1.62),
    ("Gacrux", 12.5194, -57.113, 1.63),
    ("Bellatrix", 5.4189, 6.350, 1.64),
    ("Elnath", 5.4382, 28.608, 1.65),
    ("Miaplacidus", 9.2200, -69.717, 1.68),
    ("Alnilam", 5.6036, -1.202, 1.69),
    ("Alnair", 22.1372, -46.961, 1.74),
    ("Alnitak", 5.6793, -1.943, 1.77),
    ("Alioth", 12.9005, 55.960, 1.77),
    ("Dubhe", 11.0621, 61.751, 1.79),
    ("Mirfak", 3.4054, 49.861, 1.79),
    ("Wezen", 7.1399, -26.393, 1.84),
    ("Kaus Australis", 18.4029, -34.385, 1.85),
    ("Alkaid", 13.7923, 49.313, 1.86),
    ("Avior", 8.3752, -59.510, 1.86),
    ("Menkalinan", 5.9921, 44.948, 1.90),
    ("Atria", 16.8111, -69.028, 1.92),
    ("Alhena", 6.6285, 16.399, 1.92),
    ("Peacock", 20.4275, -56.735, 1.94),
    ("Polaris", 2.5303, 89.264, 1.98),
    ("Mirzam", 6.3783, -17.956, 1.98),
    ("Alphard", 9.4598, -8.659, 1.98),
    ("Hamal", 2.1195, 23.462, 2.00),
    ("Algieba", 10.3328, 19.842, 2.01),
    ("Nunki", 18.9211, -26.297, 2.05),
    ("Saiph", 5.7959, -9.670, 2.09),
    ("Denebola", 11.8177, 14.572, 2.14),
    ("Sadr", 20.3705, 40.257, 2.23),
    ("Mizar", 13.3988, 54.925, 2.23),
    ("Schedar", 0.6751, 56.537, 2.24),
    ("Mintaka", 5.5334, -0.299, 2.25),
    ("Caph", 0.1530, 59.150, 2.28),
    ("Merak", 11.0307, 56.382, 2.37),
    ("Phecda", 11.8972, 53.695, 2.44),
    ("Navi", 0.9451, 60.717, 2.47),
    ("Gienah", 20.7702, 33.970, 2.48),
    ("Zosma", 11.2351, 20.524, 2.56),
    ("Ruchbah", 1.4302, 60.235, 2.68),
    ("Imai", 12.2524, -58.749, 2.79),
    ("Fawaris", 19.7496, 45.131, 2.87),
    ("Albireo", 19.5120, 27.960, 3.08),
    ("Megrez", 12.2571, 57.033, 3.31),
    ("Chertan", 11.2373, 15.430, 3.33),
    ("Segin", 1.9066, 63.670, 3.37),
    ("Adhafera", 10.2782, 23.417, 3.43),
];

const BUILTIN_FIGURES: &[(&str, &[(&str, &str)])] = &[
    ("Orion", &[
        ("Betelgeuse", "Bellatrix"), ("Bellatrix", "Mintaka"), ("Mintaka", "Alnilam"),
        ("Alnilam", "Alnitak"), ("Alnitak", "Betelgeuse"), ("Mintaka", "Rigel"),
        ("Alnitak", "Saiph"), ("Rigel", "Saiph"),
    ]),
    ("Ursa Major", &[
        ("Dubhe", "Merak"), ("Merak", "Phecda"), ("Phecda", "Megrez"), ("Megrez", "Dubhe"),
        ("Megrez", "Alioth"), ("Alioth", "Mizar"), ("Mizar", "Alkaid"),
    ]),
    ("Cassiopeia", &[
        ("Caph", "Schedar"), ("Schedar", "Navi"), ("Navi", "Ruchbah"), ("Ruchbah", "Segin"),
    ]),
    ("Cygnus", &[
        ("Deneb", "Sadr"), ("Sadr", "Albireo"), ("Fawaris", "Sadr"), ("Sadr", "Gienah"),
    ]),
    ("Crux", &[("Acrux", "Gacrux"), ("Mimosa", "Imai")]),
    ("Leo", &[
        ("Regulus", "Algieba"), ("Algieba", "Zosma"), ("Zosma", "Denebola"),
        ("Denebola", "Chertan"), ("Chertan", "Regulus"), ("Algieba", "Adhafera"),
    ]),
];

#[derive(Clone, Debug, Default)]
pub struct StarCatalog {
    stars: Vec<StarRecord>,
}

impl StarCatalog {
    pub fn builtin() -> Self {
        let stars = BUILTIN_STARS
            .iter()
            .map(|&(name, ra, dec, mag)| StarRecord::new(name, ra, dec, mag))
            .collect();
        Self { stars }
    }

    /// Parses a JSON array of `{name, ra_hours, dec_degrees, magnitude}`.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let entries: Vec<StarEntry> = serde_json::from_str(text)?;
        let stars = entries
            .into_iter()
            .map(|e| StarRecord::new(e.name, e.ra_hours, e.dec_degrees, e.magnitude))
            .collect();
        Ok(Self { stars })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_json(&read_catalog(path.as_ref())?)
    }

    pub fn stars(&self) -> &[StarRecord] {
        &self.stars
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&StarRecord> {
        self.stars.iter().find(|s| s.name == name)
    }

    /// Billboards for every star bright enough to draw. Size and brightness
    /// step down with magnitude.
    pub fn sprites(&self, size_scale: f64) -> Vec<Sprite> {
        self.stars
            .iter()
            .filter(|s| s.is_drawn())
            .map(|s| s.sprite(size_scale))
            .collect()
    }
}

/// Handle for a line group, stable for the life of its [`Constellations`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineGroupId(u32);

#[derive(Clone, Debug)]
pub struct LineGroup {
    pub id: LineGroupId,
    pub name: String,
    /// Segment endpoints, two per segment.
    pub vertices: Vec<Vector3<f64>>,
    /// Normalized mean of the vertices.
    pub center: Vector3<f64>,
    /// Smallest `dot(center, vertex)`; the group is in view when the look
    /// direction is closer to the center than this.
    pub limit: f64,
}

impl LineGroup {
    fn new(id: LineGroupId, name: String, vertices: Vec<Vector3<f64>>) -> Self {
        let sum = vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v);
        let (center, limit) = match sum.try_normalize(0.0) {
            Some(center) => {
                let limit = vertices.iter().map(|v| center.dot(v)).fold(1.0, f64::min);
                (center, limit)
            }
            // Nothing to show; keep it out of every view.
            None => (Vector3::zeros(), 1.0),
        };
        Self { id, name, vertices, center, limit }
    }

    pub fn segments(&self) -> impl Iterator<Item = (&Vector3<f64>, &Vector3<f64>)> {
        self.vertices.chunks_exact(2).map(|pair| (&pair[0], &pair[1]))
    }

    pub fn is_in_view(&self, look_dir: &Vector3<f64>) -> bool {
        look_dir.dot(&self.center) > self.limit
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ConstellationEntry {
    name: String,
    /// `[[ra_hours, dec_degrees], [ra_hours, dec_degrees]]` per segment.
    segments: Vec<[[f64; 2]; 2]>,
}

#[derive(Clone, Debug, Default)]
pub struct Constellations {
    groups: Vec<LineGroup>,
    next_id: u32,
}

impl Constellations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, vertices: Vec<Vector3<f64>>) -> LineGroupId {
        let id = LineGroupId(self.next_id);
        self.next_id += 1;
        self.groups.push(LineGroup::new(id, name.into(), vertices));
        id
    }

    pub fn get(&self, id: LineGroupId) -> Option<&LineGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let entries: Vec<ConstellationEntry> = serde_json::from_str(text)?;
        let mut out = Self::new();
        for entry in entries {
            let vertices = entry
                .segments
                .iter()
                .flat_map(|[a, b]| [ra_dec_to_unit_vector(a[0], a[1]), ra_dec_to_unit_vector(b[0], b[1])])
                .collect();
            out.insert(entry.name, vertices);
        }
        Ok(out)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_json(&read_catalog(path.as_ref())?)
    }

    /// The built-in figures, drawn between stars of `catalog`.
    pub fn builtin(catalog: &StarCatalog) -> Result<Self, CatalogError> {
        let mut out = Self::new();
        for (name, segments) in BUILTIN_FIGURES {
            let mut vertices = Vec::with_capacity(segments.len() * 2);
            for (a, b) in segments.iter() {
                for star in [a, b] {
                    let record = catalog.find(star).ok_or_else(|| CatalogError::UnknownStar {
                        constellation: name.to_string(),
                        star: star.to_string(),
                    })?;
                    vertices.push(record.direction);
                }
            }
            out.insert(*name, vertices);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_magnitude_tables_clamp() {
        assert_eq!(sprite_diameter(-1.46), 2.0);
        assert_eq!(sprite_diameter(0.9), 2.0);
        assert_eq!(sprite_diameter(1.2), 1.5);
        assert_eq!(sprite_diameter(3.9), 1.0);
        assert_eq!(sprite_diameter(9.0), 0.5);
        assert_eq!(sprite_color_scale(2.5), 0.7);
        assert_eq!(sprite_color_scale(-4.0), 1.0);
    }

    #[test]
    fn test_ra_dec_axes() {
        assert_relative_eq!(ra_dec_to_unit_vector(0.0, 0.0), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(ra_dec_to_unit_vector(6.0, 0.0), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(ra_dec_to_unit_vector(3.0, 90.0), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_builtin_catalog_and_figures() {
        let catalog = StarCatalog::builtin();
        assert!(catalog.find("Sirius").unwrap().can_be_labelled());
        assert!(!catalog.find("Megrez").unwrap().can_be_labelled());

        let figures = Constellations::builtin(&catalog).unwrap();
        assert_eq!(figures.len(), BUILTIN_FIGURES.len());
        let orion = figures.iter().find(|g| g.name == "Orion").unwrap();
        assert_eq!(orion.segments().count(), 8);
        assert!(orion.is_in_view(&orion.center));
    }

    #[test]
    fn test_faint_stars_are_not_drawn() {
        let catalog = StarCatalog::from_json(
            r#"[
                {"name": "Bright", "ra_hours": 1.0, "dec_degrees": 2.0, "magnitude": 0.5},
                {"ra_hours": 2.0, "dec_degrees": 3.0, "magnitude": 4.0},
                {"name": "Faint", "ra_hours": 3.0, "dec_degrees": 4.0, "magnitude": 4.2}
            ]"#,
        )
        .unwrap();
        let sprites = catalog.sprites(2.0);
        assert_eq!(sprites.len(), 2);
        assert_eq!(sprites[0].scale, 4.0);
        assert_eq!(sprites[1].name, "");
        assert_eq!(sprites[1].color, Color::WHITE.scaled(0.3));
    }

    #[test]
    fn test_group_center_and_limit() {
        let mut groups = Constellations::new();
        let a = Vector3::new(1.0, 0.0, 1.0).normalize();
        let b = Vector3::new(-1.0, 0.0, 1.0).normalize();
        let id = groups.insert("Arc", vec![a, b]);
        let g = groups.get(id).unwrap();
        assert_relative_eq!(g.center, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(g.limit, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        assert!(g.is_in_view(&Vector3::z()));
        assert!(!g.is_in_view(&Vector3::x()));
    }

    #[test]
    fn test_handles_stay_stable() {
        let mut groups = Constellations::new();
        let first = groups.insert("A", vec![Vector3::x(), Vector3::y()]);
        let second = groups.insert("B", vec![Vector3::y(), Vector3::z()]);
        let third = groups.insert("A", vec![Vector3::x(), Vector3::y()]);
        assert_ne!(first, second);
        assert_ne!(first, third, "same name and shape still gets its own handle");
        assert_eq!(groups.get(second).unwrap().name, "B");
        assert_eq!(groups.get(first).unwrap().name, "A");
    }

    #[test]
    fn test_empty_group_is_never_in_view() {
        let mut groups = Constellations::new();
        let id = groups.insert("Nothing", Vec::new());
        let g = groups.get(id).unwrap();
        assert!(!g.is_in_view(&Vector3::z()));
    }

    #[test]
    fn test_constellation_json() {
        let groups = Constellations::from_json(
            r#"[{"name": "Pair", "segments": [[[0.0, 0.0], [6.0, 0.0]]]}]"#,
        )
        .unwrap();
        let g = groups.iter().next().unwrap();
        assert_relative_eq!(g.vertices[1], Vector3::y(), epsilon = 1e-12);
        assert!(Constellations::from_json("{").is_err());
    }
}
