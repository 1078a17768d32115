//! Persisted runtime settings.
//!
//! Every knob the viewer and the engine share lives in [`Settings`], stored
//! as pretty-printed JSON. Missing fields fall back to their defaults so old
//! files keep loading after new settings are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tle::TleSource;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing settings {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Observer latitude, degrees north.
    pub latitude: f64,
    /// Observer longitude, degrees east.
    pub longitude: f64,
    /// Vertical field of view, degrees.
    pub fov_degrees: f64,
    /// Shifts "now" for every computed position, hours.
    pub time_bias_hours: f64,
    pub max_satellites: usize,
    pub satellite_source: TleSource,
    pub show_satellites: bool,
    /// Freezes label fades, for still captures.
    pub pause_aging: bool,
    /// 1 outlines placed labels, 2 also logs their bounds.
    pub debug_labels: u8,
    pub use_compass: bool,
    /// Dragging the globe also moves the observer.
    pub change_location: bool,
    pub use_core_location: bool,
    /// Per-frame decay of drag inertia.
    pub input_drag: f64,
    /// Manual view elevation, degrees.
    pub manual_phi: f64,
    /// Manual view azimuth, degrees.
    pub manual_theta: f64,
    /// Skip stars and satellites outside the view cone.
    pub cull: bool,
    pub scale: f64,
    pub star_scale: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            latitude: 51.48,
            longitude: 0.0,
            fov_degrees: 60.0,
            time_bias_hours: 0.0,
            max_satellites: 40,
            satellite_source: TleSource::Visual,
            show_satellites: false,
            pause_aging: false,
            debug_labels: 0,
            use_compass: false,
            change_location: false,
            use_core_location: false,
            input_drag: 0.9,
            manual_phi: 0.0,
            manual_theta: 0.0,
            cull: true,
            scale: 1.0,
            star_scale: 1.0,
        }
    }
}

impl Settings {
    /// Reads settings from `path`. A missing file yields the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no settings at {path:?}, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }
        std::fs::write(path, text).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("settings.json")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.max_satellites, 40);
        assert_eq!(s.input_drag, 0.9);
        assert_eq!(s.satellite_source, TleSource::Visual);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = Settings {
            latitude: -33.9,
            longitude: 18.4,
            show_satellites: true,
            satellite_source: TleSource::Stations,
            ..Settings::default()
        };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"satellite_source\": \"stations\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "latitude": 10.0, "fov_degrees": 45.0 }"#).unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.latitude, 10.0);
        assert_eq!(s.fov_degrees, 45.0);
        assert_eq!(s.max_satellites, 40);
        assert!(s.cull);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ latitude: ").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }
}
