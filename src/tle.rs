//! Two-Line Element (TLE) satellite tracking.
//!
//! Loads CelesTrak element sets from a local cache, refreshes them from the
//! network in the background, propagates every satellite with SGP4 and ranks
//! them by how closely they line up with a reference direction.

use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sgp4::Constants;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::fetch::{FetchPoll, FetchTask, UrlReader};
use crate::math::{rotation_z, spherical_to_cartesian};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug)]
pub enum TleError {
    #[error("no valid TLE sets found")]
    Empty,

    #[error("TLE data is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("cache {path:?}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TleSource {
    #[default]
    Visual,
    Stations,
    Gps,
    Weather,
    Geo,
    Amateur,
    Science,
    Starlink,
}

impl TleSource {
    pub const ALL: [TleSource; 8] = [
        Self::Visual, Self::Stations, Self::Gps, Self::Weather,
        Self::Geo, Self::Amateur, Self::Science, Self::Starlink,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Visual => "100 Brightest",
            Self::Stations => "Stations",
            Self::Gps => "GPS",
            Self::Weather => "Weather",
            Self::Geo => "GEO",
            Self::Amateur => "Amateur",
            Self::Science => "Science",
            Self::Starlink => "Starlink",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Self::Visual => "https://celestrak.org/NORAD/elements/gp.php?GROUP=visual&FORMAT=tle",
            Self::Stations => "https://celestrak.org/NORAD/elements/gp.php?GROUP=stations&FORMAT=tle",
            Self::Gps => "https://celestrak.org/NORAD/elements/gp.php?GROUP=gps-ops&FORMAT=tle",
            Self::Weather => "https://celestrak.org/NORAD/elements/gp.php?GROUP=weather&FORMAT=tle",
            Self::Geo => "https://celestrak.org/NORAD/elements/gp.php?GROUP=geo&FORMAT=tle",
            Self::Amateur => "https://celestrak.org/NORAD/elements/gp.php?GROUP=amateur&FORMAT=tle",
            Self::Science => "https://celestrak.org/NORAD/elements/gp.php?GROUP=science&FORMAT=tle",
            Self::Starlink => "https://celestrak.org/NORAD/elements/gp.php?GROUP=starlink&FORMAT=tle",
        }
    }

    /// Name of the cached copy inside the cache directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Visual => "visual.txt",
            Self::Stations => "stations.txt",
            Self::Gps => "gps-ops.txt",
            Self::Weather => "weather.txt",
            Self::Geo => "geo.txt",
            Self::Amateur => "amateur.txt",
            Self::Science => "science.txt",
            Self::Starlink => "starlink.txt",
        }
    }
}

#[derive(Clone)]
pub struct TleSatellite {
    pub name: String,
    pub constants: Constants,
    pub epoch_minutes: f64,
    /// Geocentric inertial (TEME) position in km from the last propagation.
    pub position: Vector3<f64>,
}

impl TleSatellite {
    /// Unit vector from `observer` toward the satellite, both in km.
    pub fn direction_from(&self, observer: &Vector3<f64>) -> Option<Vector3<f64>> {
        (self.position - observer).try_normalize(0.0)
    }
}

pub fn datetime_to_minutes(dt: &sgp4::chrono::NaiveDateTime) -> f64 {
    dt.and_utc().timestamp() as f64 / 60.0
}

/// Parses name + two-line sets. Sets that fail to parse or initialise are
/// skipped; an input with no usable set at all is an error.
pub fn parse_tle_data(data: &str) -> Result<Vec<TleSatellite>, TleError> {
    let lines: Vec<&str> = data.lines().collect();
    let mut satellites = Vec::new();

    let mut i = 0;
    while i + 2 < lines.len() {
        let name_line = lines[i].trim();
        let line1 = lines[i + 1].trim();
        let line2 = lines[i + 2].trim();

        if !line1.starts_with('1') || !line2.starts_with('2') {
            i += 1;
            continue;
        }

        let tle = format!("{}\n{}\n{}", name_line, line1, line2);

        match sgp4::parse_3les(&tle) {
            Ok(elements_vec) => {
                for elements in elements_vec {
                    match Constants::from_elements(&elements) {
                        Ok(constants) => satellites.push(TleSatellite {
                            name: elements.object_name.clone().unwrap_or_default(),
                            epoch_minutes: datetime_to_minutes(&elements.datetime),
                            constants,
                            position: Vector3::zeros(),
                        }),
                        Err(e) => log::debug!("skipping {name_line}: {e}"),
                    }
                }
            }
            Err(e) => log::debug!("skipping {name_line}: {e}"),
        }

        i += 3;
    }

    if satellites.is_empty() {
        Err(TleError::Empty)
    } else {
        Ok(satellites)
    }
}

/// Observer position in the inertial frame (km): the point on the surface at
/// `lat`/`lon` (radians) carried around by the earth's rotation `phase`.
pub fn observer_position(lat: f64, lon: f64, phase: f64) -> Vector3<f64> {
    rotation_z(phase) * spherical_to_cartesian(EARTH_RADIUS_KM, lat, lon)
}

pub struct SatelliteTracker {
    source: TleSource,
    cache_path: PathBuf,
    satellites: Vec<TleSatellite>,
    fetch: Option<FetchTask>,
}

impl SatelliteTracker {
    /// Creates a tracker for `source` and loads whatever copy is cached in
    /// `cache_dir`. A missing or unreadable cache leaves the set empty.
    pub fn new(source: TleSource, cache_dir: impl AsRef<Path>) -> Self {
        let mut tracker = Self {
            source,
            cache_path: cache_dir.as_ref().join(source.file_name()),
            satellites: Vec::new(),
            fetch: None,
        };
        match tracker.load_cache() {
            Ok(n) => log::info!("loaded {n} cached satellites from {:?}", tracker.cache_path),
            Err(TleError::Cache { path, source }) if source.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no satellite cache at {path:?}");
            }
            Err(e) => log::warn!("satellite cache unusable: {e}"),
        }
        tracker
    }

    pub fn source(&self) -> TleSource {
        self.source
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn satellites(&self) -> &[TleSatellite] {
        &self.satellites
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }

    pub fn load_cache(&mut self) -> Result<usize, TleError> {
        let bytes = std::fs::read(&self.cache_path).map_err(|source| TleError::Cache {
            path: self.cache_path.clone(),
            source,
        })?;
        self.satellites = parse_tle_data(&String::from_utf8(bytes)?)?;
        Ok(self.satellites.len())
    }

    /// Starts a background download of the source's element sets. A fetch
    /// already in flight is left alone.
    pub fn start_fetch(&mut self, reader: impl UrlReader) {
        if self.fetch.is_some() {
            return;
        }
        match FetchTask::spawn(reader, self.source.url()) {
            Ok(task) => self.fetch = Some(task),
            Err(e) => log::warn!("satellite fetch not started: {e}"),
        }
    }

    pub fn cancel_fetch(&mut self) {
        if let Some(mut task) = self.fetch.take() {
            log::debug!("cancelling fetch of {}", task.url());
            task.cancel();
        }
    }

    /// Picks up a finished download: the bytes are staged next to the cache
    /// file, then replace both the cache and the current set if they parse.
    /// Returns true when the set was replaced.
    pub fn poll_fetch(&mut self) -> bool {
        let Some(task) = &mut self.fetch else { return false };
        let result = match task.poll() {
            FetchPoll::Pending => return false,
            FetchPoll::Closed => {
                self.fetch = None;
                return false;
            }
            FetchPoll::Ready(result) => result,
        };
        self.fetch = None;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("satellite fetch failed, keeping {} cached: {e}", self.satellites.len());
                return false;
            }
        };

        let staged = match self.stage_cache(&bytes) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        };

        let parsed = String::from_utf8(bytes)
            .map_err(TleError::from)
            .and_then(|text| parse_tle_data(&text));
        match parsed {
            Ok(satellites) => {
                log::info!("fetched {} satellites ({})", satellites.len(), self.source.label());
                self.satellites = satellites;
                if let Some(file) = staged {
                    if let Err(e) = file.persist(&self.cache_path) {
                        log::warn!("cache {:?}: {}", self.cache_path, e.error);
                    }
                }
                true
            }
            Err(e) => {
                // Dropping the staged file removes it; the old cache stays.
                log::warn!("fetched satellite data unusable: {e}");
                false
            }
        }
    }

    /// Writes `bytes` to a temporary file in the cache directory.
    fn stage_cache(&self, bytes: &[u8]) -> Result<NamedTempFile, TleError> {
        let cache_err = |source| TleError::Cache { path: self.cache_path.clone(), source };
        let dir = match self.cache_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(cache_err)?;
        let mut file = NamedTempFile::new_in(&dir).map_err(cache_err)?;
        file.write_all(bytes).map_err(cache_err)?;
        Ok(file)
    }

    /// Propagates every satellite to `unix_seconds`. A satellite the
    /// propagator rejects keeps its previous position.
    pub fn compute_positions(&mut self, unix_seconds: f64) {
        let minutes = unix_seconds / 60.0;
        for sat in &mut self.satellites {
            let minutes_since_epoch = minutes - sat.epoch_minutes;
            match sat.constants.propagate(sgp4::MinutesSinceEpoch(minutes_since_epoch)) {
                Ok(prediction) => sat.position = Vector3::from(prediction.position),
                Err(e) => log::debug!("{}: {e}", sat.name),
            }
        }
    }

    /// Indices of all satellites ordered by decreasing
    /// `dot(reference, position)`.
    pub fn ranked_by(&self, reference: &Vector3<f64>) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.satellites.len()).collect();
        indices.sort_by(|&a, &b| {
            let da = reference.dot(&self.satellites[a].position);
            let db = reference.dot(&self.satellites[b].position);
            db.total_cmp(&da)
        });
        indices
    }
}

impl Drop for SatelliteTracker {
    fn drop(&mut self) {
        self.cancel_fetch();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::tests::StaticReader;
    use crate::fetch::FetchError;
    use approx::assert_relative_eq;
    use std::time::{Duration, Instant};

    pub(crate) const SAMPLE_TLE: &str = "\
ISS (ZARYA)
1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992
2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008
HST
1 20580U 90037B   20194.55788380  .00000704  00000-0  33478-4 0  9994
2 20580  28.4698 176.6441 0002680 148.5163 326.5386 15.09309385456839
";

    fn wait_for_fetch(tracker: &mut SatelliteTracker) -> bool {
        let start = Instant::now();
        while tracker.is_fetching() && start.elapsed() < Duration::from_secs(5) {
            if tracker.poll_fetch() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_parse_sample() {
        let sats = parse_tle_data(SAMPLE_TLE).unwrap();
        assert_eq!(sats.len(), 2);
        assert_eq!(sats[0].name, "ISS (ZARYA)");
        assert_eq!(sats[1].name, "HST");
    }

    #[test]
    fn test_parse_skips_garbage() {
        let data = format!("junk line\nmore junk\n{SAMPLE_TLE}");
        assert_eq!(parse_tle_data(&data).unwrap().len(), 2);
        assert!(matches!(parse_tle_data("nothing here\n"), Err(TleError::Empty)));
    }

    #[test]
    fn test_propagated_iss_is_in_low_orbit() {
        let mut tracker = SatelliteTracker {
            source: TleSource::Stations,
            cache_path: PathBuf::new(),
            satellites: parse_tle_data(SAMPLE_TLE).unwrap(),
            fetch: None,
        };
        let epoch = tracker.satellites[0].epoch_minutes * 60.0;
        tracker.compute_positions(epoch + 600.0);
        let r = tracker.satellites[0].position.norm();
        assert!(r > 6600.0 && r < 6900.0, "ISS radius {r}");
    }

    #[test]
    fn test_ranking_puts_aligned_satellite_first() {
        let mut sats = parse_tle_data(SAMPLE_TLE).unwrap();
        sats[0].position = Vector3::new(0.0, 7000.0, 0.0);
        sats[1].position = Vector3::new(7000.0, 0.0, 0.0);
        let tracker = SatelliteTracker {
            source: TleSource::Visual,
            cache_path: PathBuf::new(),
            satellites: sats,
            fetch: None,
        };
        assert_eq!(tracker.ranked_by(&Vector3::x()), vec![1, 0]);
        assert_eq!(tracker.ranked_by(&Vector3::y()), vec![0, 1]);
    }

    #[test]
    fn test_observer_rotates_with_phase() {
        let p = observer_position(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(p, Vector3::new(0.0, EARTH_RADIUS_KM, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_cache_loaded_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visual.txt"), SAMPLE_TLE).unwrap();
        let tracker = SatelliteTracker::new(TleSource::Visual, dir.path());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_successful_fetch_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("satellite");
        let mut tracker = SatelliteTracker::new(TleSource::Stations, &cache_dir);
        assert!(tracker.is_empty());

        tracker.start_fetch(StaticReader(Ok(SAMPLE_TLE.as_bytes().to_vec())));
        assert!(wait_for_fetch(&mut tracker));
        assert_eq!(tracker.len(), 2);
        assert!(!tracker.is_fetching());

        let cached = std::fs::read_to_string(cache_dir.join("stations.txt")).unwrap();
        assert_eq!(cached, SAMPLE_TLE);
    }

    #[test]
    fn test_failed_fetch_without_cache_leaves_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = SatelliteTracker::new(TleSource::Visual, dir.path());
        tracker.start_fetch(StaticReader(Err(FetchError::Http("offline".into()))));
        assert!(!wait_for_fetch(&mut tracker));
        assert!(tracker.is_empty());
        assert!(!dir.path().join("visual.txt").exists());
    }

    #[test]
    fn test_unparsable_response_keeps_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("visual.txt");
        std::fs::write(&cache, SAMPLE_TLE).unwrap();
        let mut tracker = SatelliteTracker::new(TleSource::Visual, dir.path());
        tracker.start_fetch(StaticReader(Ok(b"<html>rate limited</html>".to_vec())));
        assert!(!wait_for_fetch(&mut tracker));
        assert_eq!(tracker.len(), 2);
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), SAMPLE_TLE);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1, "staged copy left behind");

        let restarted = SatelliteTracker::new(TleSource::Visual, dir.path());
        assert_eq!(restarted.len(), 2);
    }

    #[test]
    fn test_failed_fetch_keeps_stale_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visual.txt"), SAMPLE_TLE).unwrap();
        let mut tracker = SatelliteTracker::new(TleSource::Visual, dir.path());
        tracker.start_fetch(StaticReader(Err(FetchError::Http("offline".into()))));
        wait_for_fetch(&mut tracker);
        assert_eq!(tracker.len(), 2);
    }
}
