use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use nalgebra::{Point2, Vector2, Vector3};

use star3map::annotation::{Annotation, AnnotationSet};
use star3map::bounds::OrientedBox;
use star3map::fetch::{FetchError, UrlReader};
use star3map::layout::{LabelMetrics, NonOverlapLayout};
use star3map::orbit::{position, OrbitalElements};
use star3map::solar_system::SolarSystem;
use star3map::sprite::Color;
use star3map::time::FixedClock;
use star3map::tle::SatelliteTracker;
use star3map::view::TextMeasure;
use star3map::{Settings, SkyEngine};

const TLE: &str = "\
ISS (ZARYA)
1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992
2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008
HST
1 20580U 90037B   20194.55788380  .00000704  00000-0  33478-4 0  9994
2 20580  28.4698 176.6441 0002680 148.5163 326.5386 15.09309385456839
";

struct Unreachable;

impl UrlReader for Unreachable {
    fn read(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Http(format!("{url}: connection refused")))
    }
}

struct MonoWidth;

impl TextMeasure for MonoWidth {
    fn text_size(&self, text: &str) -> Vector2<f64> {
        Vector2::new(8.0 * text.len() as f64, 14.0)
    }
}

/// Flat projection: x and y of the direction scaled to pixels.
struct Flat;

impl LabelMetrics for Flat {
    fn label_bounds(&self, text: &str, direction: &Vector3<f64>) -> OrientedBox {
        let min = Point2::new(direction.x * 200.0, direction.y * 200.0);
        OrientedBox::axis_aligned(min, min + Vector2::new(6.0 * text.len() as f64, 10.0))
    }
}

#[test]
fn circular_orbit_returns_after_one_period() {
    let elements = OrbitalElements {
        semi_major_axis: 1.7,
        eccentricity: 0.0,
        inclination: 0.0,
        ascending_node: 0.0,
        perihelion_longitude: 0.0,
        mean_longitude: 75.0,
        mass: 1.0,
        period: 420.0,
    };
    let start = position(&elements, 0.0, 1e-9).unwrap();
    let lap = position(&elements, 420.0, 1e-9).unwrap();
    assert_relative_eq!(start, lap, epsilon = 1e-9);
    assert_relative_eq!(start.norm(), 1.7, epsilon = 1e-9);
}

#[test]
fn earth_is_never_drawn() {
    for days in [-36525.0, -1.5, 0.0, 8888.8] {
        let names: Vec<String> = SolarSystem::compute(days).sprites().into_iter().map(|s| s.name).collect();
        assert!(!names.iter().any(|n| n == "Earth"));
        assert_eq!(names[0], "Sun");
        assert!(names.iter().any(|n| n == "Moon"));
    }
}

#[test]
fn satellite_along_reference_ranks_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("visual.txt"), TLE).unwrap();
    let mut tracker = SatelliteTracker::new(Default::default(), dir.path());
    assert_eq!(tracker.len(), 2);

    let hst_epoch = tracker.satellites()[1].epoch_minutes * 60.0;
    tracker.compute_positions(hst_epoch);
    // The higher orbit, so nothing else can have a larger projection on it.
    let reference = tracker.satellites()[1].position.normalize();
    assert_eq!(tracker.ranked_by(&reference)[0], 1);
}

#[test]
fn unseen_annotation_is_purged_after_its_lifetime() {
    let mut set = AnnotationSet::new();
    set.insert(Annotation::new(
        "Arcturus".to_string(),
        Vector3::x(),
        Vector3::x(),
        0.0,
        Color::WHITE,
        1.0,
        0.0,
    ));

    let mut t = 0.0;
    while t < 2.4 {
        t += 0.1;
        set.age(t);
        assert_eq!(set.len(), 1, "alive at {t}");
    }
    // 0.5 up, 1.0 hold, 1.0 down, then the grace window (long lapsed).
    set.age(2.6);
    assert!(set.is_empty());
}

#[test]
fn placed_labels_never_intersect() {
    let mut layout = NonOverlapLayout::new();
    let look = Vector3::z();
    let mut placed = Vec::new();
    for i in 0..200 {
        let a = i as f64 * 0.37;
        let r = 0.05 * (i % 17) as f64;
        let dir = Vector3::new(r * a.cos(), r * a.sin(), 1.0).normalize();
        let text = format!("label {i}");
        if i % 7 == 0 {
            layout.reserve(&Flat, &text, &dir, &look, 0.0);
        } else if let Some(bounds) = layout.place(&Flat, &text, &dir, &look, 0.0) {
            placed.push(bounds);
        }
    }
    assert!(placed.len() > 5);
    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            assert!(!a.intersects(b));
        }
    }
}

#[test]
fn failed_fetch_without_cache_turns_satellites_off() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let settings = Settings { show_satellites: true, ..Settings::default() };
    let mut engine = SkyEngine::new(settings, clock, dir.path()).unwrap().with_url_reader(Unreachable);
    engine.fetch_satellites();

    let viewport = Vector2::new(640.0, 480.0);
    let start = Instant::now();
    let mut t = 0.0;
    while engine.tracker().is_fetching() && start.elapsed() < Duration::from_secs(5) {
        engine.frame(t, viewport, &MonoWidth);
        t += 0.016;
        std::thread::sleep(Duration::from_millis(5));
    }
    engine.frame(t, viewport, &MonoWidth);

    assert!(engine.tracker().is_empty());
    assert!(!engine.settings().show_satellites);
    assert!(!engine.tracker().cache_path().exists());
}
