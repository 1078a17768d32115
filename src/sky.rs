//! The engine that owns every piece of sky state and builds one frame at a
//! time.
//!
//! A frame is a flat list of things to paint (sprites, line segments, text,
//! dots) already projected to the screen. Label placement happens here, in a
//! fixed priority order, so that the renderer can draw the lists as they are
//! without checking for overlap.

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nalgebra::{Matrix3, Point2, Vector2, Vector3};

use crate::annotation::{AgingClock, Annotation, AnnotationSet};
use crate::bounds::OrientedBox;
use crate::config::Settings;
use crate::error::Result;
use crate::fetch::UrlReader;
use crate::input::{apply_drag, force_unavailable_off, Availability, DragInput};
use crate::layout::NonOverlapLayout;
use crate::math::{lat_lon_to_unit_vector, rotation_x, rotation_z, spherical_to_cartesian};
use crate::solar_system::SolarSystem;
use crate::sprite::{Color, Sprite};
use crate::stars::{Constellations, LineGroupId, StarCatalog};
use crate::time::{earth_rotation_phase, Clock, TimeBase, EARTH_ROTATION_TILT};
use crate::tle::{observer_position, SatelliteTracker, TleSource, EARTH_RADIUS_KM};
use crate::view::{
    manual_orientation, observer_rotation, Camera, ProjectedLabels, TextMeasure, ViewMode, GLOBE_DISTANCE,
};

const LINE_COLOR: Color = Color::new(0.5, 0.5, 0.7, 0.5);
const LINE_HOLD_SECONDS: f64 = 4.0;
const NAME_COLOR: Color = Color::new(0.5, 0.5, 0.7, 0.8);
const NAME_HOLD_SECONDS: f64 = 2.5;
const BEST_HOLD_SECONDS: f64 = 1.0;

const HORIZON_COLOR: Color = Color::new(0.3, 0.6, 0.3, 0.7);
const HORIZON_SEGMENTS: usize = 72;
const MARKER_COLOR: Color = Color::new(0.8, 0.8, 0.8, 0.9);
/// Cone for the "Up" and "Down" markers.
const ZENITH_MARKER_LIMIT: f64 = 0.3;
const SOLAR_NAME_COLOR: Color = Color::new(1.0, 1.0, 0.6, 1.0);

/// Sprite scale to pixel radius.
const SPRITE_PIXELS: f64 = 2.0;
const SATELLITE_DOT: f64 = 1.5;
const OBSERVER_DOT: f64 = 4.0;
const OBSERVER_COLOR: Color = Color::new(1.0, 0.3, 0.3, 1.0);
/// Observer marker height above the globe surface, earth radii.
const OBSERVER_ALTITUDE: f64 = 1.005;
const GRATICULE_COLOR: Color = Color::new(0.3, 0.3, 0.5, 0.6);
const GRATICULE_STEP_DEGREES: i32 = 30;
const GRATICULE_SEGMENT_DEGREES: i32 = 5;

/// Catalog files looked up by [`SkyEngine::load_catalog_dir`].
pub const STAR_CATALOG_FILE: &str = "stars.json";
pub const CONSTELLATION_CATALOG_FILE: &str = "constellations.json";

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteDraw {
    pub sprite: Sprite,
    pub position: Point2<f64>,
    pub radius: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineDraw {
    pub from: Point2<f64>,
    pub to: Point2<f64>,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextDraw {
    pub text: String,
    /// Footprint the layout reserved for this text.
    pub bounds: OrientedBox,
    pub color: Color,
}

impl TextDraw {
    /// Top-left corner of the text, where a renderer anchors the galley.
    pub fn origin(&self) -> Point2<f64> {
        self.bounds.corners[3]
    }

    /// Rotation of the baseline in screen space, radians clockwise.
    pub fn angle(&self) -> f64 {
        let e = self.bounds.corners[1] - self.bounds.corners[0];
        e.y.atan2(e.x)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointDraw {
    pub position: Point2<f64>,
    pub radius: f64,
    pub color: Color,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disc {
    pub center: Point2<f64>,
    pub radius: f64,
}

/// Everything the renderer paints for one frame, back to front: the globe
/// disc, lines, sprites, points, then labels.
#[derive(Clone, Debug)]
pub struct Frame {
    pub mode: ViewMode,
    pub camera: Camera,
    pub globe: Option<Disc>,
    pub lines: Vec<LineDraw>,
    pub sprites: Vec<SpriteDraw>,
    pub points: Vec<PointDraw>,
    pub labels: Vec<TextDraw>,
    /// Committed label footprints, when label debugging is on.
    pub debug_boxes: Vec<OrientedBox>,
}

impl Frame {
    fn new(mode: ViewMode, camera: Camera) -> Self {
        Self {
            mode,
            camera,
            globe: None,
            lines: Vec::new(),
            sprites: Vec::new(),
            points: Vec::new(),
            labels: Vec::new(),
            debug_boxes: Vec::new(),
        }
    }

    fn push_segment(&mut self, from: &Vector3<f64>, to: &Vector3<f64>, color: Color) {
        if let (Some(from), Some(to)) = (self.camera.project(from), self.camera.project(to)) {
            self.lines.push(LineDraw { from, to, color });
        }
    }

    fn push_label(&mut self, text: &str, bounds: OrientedBox, color: Color) {
        self.labels.push(TextDraw { text: text.to_string(), bounds, color });
    }
}

/// Per-frame instants shared by both views.
#[derive(Clone, Copy, Debug)]
struct FrameTime {
    /// Aging clock reading.
    now: f64,
    days: f64,
    phase: f64,
    wall_seconds: f64,
}

/// The best single name to show near the center of the view.
struct Candidate {
    name: String,
    direction: Vector3<f64>,
    dot: f64,
}

fn offer(best: &mut Option<Candidate>, name: &str, direction: Vector3<f64>, dot: f64) {
    if best.as_ref().is_none_or(|b| dot > b.dot) {
        *best = Some(Candidate { name: name.to_string(), direction, dot });
    }
}

/// Satellite dot color, cycling slowly through pale hues.
pub fn satellite_tint(wall_seconds: f64) -> Color {
    let channel = |offset: f64| (((wall_seconds + offset) * TAU).cos() * 0.5 + 0.5) * 0.5 + 0.5;
    Color::new(channel(0.0) as f32, channel(1.0 / 3.0) as f32, channel(2.0 / 3.0) as f32, 1.0)
}

pub struct SkyEngine {
    settings: Settings,
    time: TimeBase,
    cache_dir: PathBuf,
    tracker: SatelliteTracker,
    stars: StarCatalog,
    constellations: Constellations,
    labels: AnnotationSet<String>,
    lines: AnnotationSet<LineGroupId>,
    aging: AgingClock,
    mode: ViewMode,
    input: DragInput,
    /// Device attitude, local frame to eye, from the platform compass.
    platform_orientation: Option<Matrix3<f64>>,
    location_received: bool,
    reader: Option<Arc<dyn UrlReader + Sync>>,
    /// Satellite toggle as of the previous frame.
    satellites_shown: bool,
}

impl SkyEngine {
    /// Builds the engine with the built-in star catalog and figures, and
    /// loads any cached satellites for the configured source.
    pub fn new(settings: Settings, clock: impl Clock + Send + 'static, cache_dir: impl AsRef<Path>) -> Result<Self> {
        let time = TimeBase::new(clock)?;
        let stars = StarCatalog::builtin();
        let constellations = Constellations::builtin(&stars)?;
        let cache_dir = cache_dir.as_ref().to_path_buf();
        let tracker = SatelliteTracker::new(settings.satellite_source, &cache_dir);
        log::info!(
            "sky engine ready: {} stars, {} constellations, {} satellites",
            stars.len(),
            constellations.len(),
            tracker.len()
        );
        Ok(Self {
            settings,
            time,
            cache_dir,
            tracker,
            stars,
            constellations,
            labels: AnnotationSet::new(),
            lines: AnnotationSet::new(),
            aging: AgingClock::default(),
            mode: ViewMode::Stars,
            input: DragInput::new(),
            platform_orientation: None,
            location_received: false,
            reader: None,
            satellites_shown: false,
        })
    }

    /// Sets where satellite data is downloaded from. Without a reader the
    /// engine only ever uses the cache.
    pub fn with_url_reader(mut self, reader: impl UrlReader + Sync) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Swaps in other catalogs.
    pub fn with_catalogs(mut self, stars: StarCatalog, constellations: Constellations) -> Self {
        self.replace_catalogs(stars, constellations);
        self
    }

    /// Existing annotations are dropped since their keys may no longer mean
    /// anything.
    fn replace_catalogs(&mut self, stars: StarCatalog, constellations: Constellations) {
        self.stars = stars;
        self.constellations = constellations;
        self.labels = AnnotationSet::new();
        self.lines = AnnotationSet::new();
    }

    /// Loads `stars.json` and `constellations.json` from `dir` in place of
    /// the current sets. A missing file keeps the current set. On error
    /// nothing is replaced.
    pub fn load_catalog_dir(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let star_path = dir.as_ref().join(STAR_CATALOG_FILE);
        let figure_path = dir.as_ref().join(CONSTELLATION_CATALOG_FILE);
        if !star_path.exists() && !figure_path.exists() {
            return Ok(());
        }

        let stars = if star_path.exists() { Some(StarCatalog::load(&star_path)?) } else { None };
        let constellations = if figure_path.exists() { Some(Constellations::load(&figure_path)?) } else { None };
        let stars = stars.unwrap_or_else(|| std::mem::take(&mut self.stars));
        let constellations = constellations.unwrap_or_else(|| std::mem::take(&mut self.constellations));
        log::info!(
            "catalogs from {:?}: {} stars, {} constellations",
            dir.as_ref(),
            stars.len(),
            constellations.len()
        );
        self.replace_catalogs(stars, constellations);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn time(&self) -> &TimeBase {
        &self.time
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn tracker(&self) -> &SatelliteTracker {
        &self.tracker
    }

    pub fn stars(&self) -> &StarCatalog {
        &self.stars
    }

    pub fn constellations(&self) -> &Constellations {
        &self.constellations
    }

    pub fn labels(&self) -> &AnnotationSet<String> {
        &self.labels
    }

    pub fn lines(&self) -> &AnnotationSet<LineGroupId> {
        &self.lines
    }

    pub fn show_stars(&mut self) {
        self.mode = ViewMode::Stars;
    }

    /// Switches to the globe, centered on the observer.
    pub fn show_globe(&mut self) {
        self.mode = ViewMode::Globe { lat: self.settings.latitude, lon: self.settings.longitude };
    }

    /// Starts downloading the current satellite source.
    pub fn fetch_satellites(&mut self) {
        match &self.reader {
            Some(reader) => self.tracker.start_fetch(reader.clone()),
            None => log::debug!("no url reader, satellites come from the cache only"),
        }
    }

    /// Switches satellite sources and refreshes the new one. The old tracker
    /// is dropped, which abandons its download.
    pub fn set_satellite_source(&mut self, source: TleSource) {
        self.settings.satellite_source = source;
        if self.tracker.source() != source {
            self.tracker = SatelliteTracker::new(source, &self.cache_dir);
            self.fetch_satellites();
        }
    }

    pub fn set_platform_orientation(&mut self, orientation: Option<Matrix3<f64>>) {
        self.platform_orientation = orientation;
    }

    /// A fix from the platform's location service, degrees.
    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        self.location_received = true;
        if self.settings.use_core_location {
            self.settings.latitude = latitude;
            self.settings.longitude = longitude;
        }
    }

    /// Feeds one pointer sample in screen pixels.
    pub fn pointer(&mut self, active: bool, x: f64, y: f64) {
        if let Some(step) = self.input.process(active, x, y, self.settings.fov_degrees) {
            apply_drag(step, &mut self.mode, &mut self.settings);
        }
    }

    /// Camera for the current view at the current time.
    pub fn camera(&self, viewport: Vector2<f64>) -> Camera {
        let days = self.time.days_since_epoch(self.settings.time_bias_hours);
        self.camera_at(earth_rotation_phase(days), viewport)
    }

    fn camera_at(&self, phase: f64, viewport: Vector2<f64>) -> Camera {
        match self.mode {
            ViewMode::Stars => {
                let orientation = match (self.settings.use_compass, self.platform_orientation) {
                    (true, Some(m)) => m,
                    _ => manual_orientation(self.settings.manual_phi, self.settings.manual_theta),
                };
                Camera::new(orientation * self.observer_frame(phase), Vector3::zeros(), self.settings.fov_degrees, viewport)
            }
            ViewMode::Globe { lat, lon } => Camera::new(
                observer_rotation(lat.to_radians(), lon.to_radians(), 0.0),
                Vector3::new(0.0, 0.0, -GLOBE_DISTANCE),
                self.settings.fov_degrees,
                viewport,
            ),
        }
    }

    fn observer_frame(&self, phase: f64) -> Matrix3<f64> {
        observer_rotation(self.settings.latitude.to_radians(), self.settings.longitude.to_radians(), phase)
    }

    /// Advances everything to `wall_seconds` and lays out one frame.
    pub fn frame(&mut self, wall_seconds: f64, viewport: Vector2<f64>, measure: &dyn TextMeasure) -> Frame {
        self.tracker.poll_fetch();
        if self.settings.show_satellites && !self.satellites_shown && self.tracker.is_empty() {
            self.fetch_satellites();
        }
        force_unavailable_off(
            &mut self.settings,
            Availability {
                compass: self.platform_orientation.is_some(),
                location: self.location_received,
                satellites: !self.tracker.is_empty() || self.tracker.is_fetching(),
            },
        );
        self.satellites_shown = self.settings.show_satellites;
        self.input.apply_inertia(&mut self.mode, &mut self.settings);

        let now = self.aging.tick(wall_seconds, self.settings.pause_aging);
        let days = self.time.days_since_epoch(self.settings.time_bias_hours);
        let at = FrameTime { now, days, phase: earth_rotation_phase(days), wall_seconds };

        if self.settings.show_satellites {
            self.tracker.compute_positions(self.time.unix_seconds(self.settings.time_bias_hours));
        }

        let mut frame = Frame::new(self.mode, self.camera_at(at.phase, viewport));
        let mut layout = NonOverlapLayout::new();
        match self.mode {
            ViewMode::Stars => self.star_view(&mut frame, &mut layout, measure, at),
            ViewMode::Globe { lat, lon } => self.globe_view(&mut frame, &mut layout, measure, at, lat, lon),
        }

        if self.settings.debug_labels > 0 {
            frame.debug_boxes = layout.committed().to_vec();
            if self.settings.debug_labels > 1 {
                for b in layout.committed().iter().filter(|b| b.longest_edge() > 10.0) {
                    log::debug!("label bounds {:?}", b.corners);
                }
            }
        }
        frame
    }

    fn star_view(&mut self, frame: &mut Frame, layout: &mut NonOverlapLayout, measure: &dyn TextMeasure, at: FrameTime) {
        let camera = frame.camera;
        let look = camera.look_dir();
        let limit = camera.cull_limit();
        let label_limit = camera.label_limit();
        let metrics = ProjectedLabels { camera: &camera, measure, up: camera.screen_up() };
        let paused = self.settings.pause_aging;
        let scale = self.settings.scale;

        // Local east, north and zenith in the world frame.
        let to_world = self.observer_frame(at.phase).transpose();
        let east = to_world * Vector3::x();
        let north = to_world * Vector3::y();
        let zenith = to_world * Vector3::z();

        for i in 0..HORIZON_SEGMENTS {
            let a = TAU * i as f64 / HORIZON_SEGMENTS as f64;
            let b = TAU * (i + 1) as f64 / HORIZON_SEGMENTS as f64;
            let from = to_world * Vector3::new(a.cos(), a.sin(), 0.0);
            let to = to_world * Vector3::new(b.cos(), b.sin(), 0.0);
            frame.push_segment(&from, &to, HORIZON_COLOR);
        }

        for group in self.constellations.iter() {
            if !group.is_in_view(&look) {
                continue;
            }
            self.lines.create_or_seen(&group.id, at.now, || {
                Annotation::new(group.id, group.center, look, 0.0, LINE_COLOR, LINE_HOLD_SECONDS, at.now)
            });
            self.labels.create_or_seen(&group.name, at.now, || {
                Annotation::new(group.name.clone(), group.center, look, 0.0, NAME_COLOR, NAME_HOLD_SECONDS, at.now)
            });
        }
        if !paused {
            self.lines.age(at.now);
        }
        for line in self.lines.iter() {
            if line.alpha() <= 0.0 {
                continue;
            }
            let Some(group) = self.constellations.get(line.key) else { continue };
            let color = line.faded_color();
            for (from, to) in group.segments() {
                frame.push_segment(from, to, color);
            }
        }

        // Solar-system names outrank everything below; hold their space.
        let tilt = rotation_x(EARTH_ROTATION_TILT);
        let solar: Vec<Sprite> = SolarSystem::compute(at.days)
            .sprites()
            .into_iter()
            .map(|s| Sprite { direction: tilt * s.direction, ..s })
            .collect();
        for s in &solar {
            layout.reserve(&metrics, &s.name, &s.direction, &look, limit);
        }

        for (text, direction) in [("Up", zenith), ("Down", -zenith)] {
            if let Some(bounds) = layout.place(&metrics, text, &direction, &look, ZENITH_MARKER_LIMIT) {
                frame.push_label(text, bounds, MARKER_COLOR);
            }
        }
        for (text, direction) in [("N", north), ("E", east), ("S", -north), ("W", -east)] {
            if let Some(bounds) = layout.place(&metrics, text, &direction, &look, limit) {
                frame.push_label(text, bounds, MARKER_COLOR);
            }
        }

        let mut best = None;
        for star in self.stars.stars() {
            if !star.is_drawn() {
                continue;
            }
            let dot = look.dot(&star.direction);
            if self.settings.cull && dot < limit {
                continue;
            }
            if let Some(position) = camera.project(&star.direction) {
                let sprite = star.sprite(self.settings.star_scale);
                let radius = sprite.scale * scale * SPRITE_PIXELS;
                frame.sprites.push(SpriteDraw { sprite, position, radius });
            }
            if star.can_be_labelled() && dot > label_limit {
                offer(&mut best, &star.name, star.direction, dot);
            }
        }

        if self.settings.show_satellites {
            let tint = satellite_tint(at.wall_seconds);
            let observer = observer_position(
                self.settings.latitude.to_radians(),
                self.settings.longitude.to_radians(),
                at.phase,
            );
            let satellites = self.tracker.satellites();
            for (rank, &i) in self.tracker.ranked_by(&look).iter().enumerate() {
                let sat = &satellites[i];
                let Some(direction) = sat.direction_from(&observer) else { continue };
                let dot = look.dot(&direction);
                if self.settings.cull && dot < limit {
                    continue;
                }
                if let Some(position) = camera.project(&direction) {
                    frame.points.push(PointDraw { position, radius: SATELLITE_DOT * scale, color: tint });
                }
                if rank < self.settings.max_satellites && dot > label_limit {
                    offer(&mut best, &sat.name, direction, dot);
                }
            }
        }

        if !paused {
            self.labels.age(at.now);
        }
        for label in self.labels.iter() {
            if label.alpha() <= 0.0 {
                continue;
            }
            if let Some(bounds) = layout.place(&metrics, &label.key, &label.direction, &label.look_dir, label.limit) {
                frame.push_label(&label.key, bounds, label.faded_color());
            }
        }

        if let Some(best) = best {
            if !self.labels.mark_seen(&best.name, at.now)
                && layout.can_place(&metrics, &best.name, &best.direction, &look, limit)
            {
                log::trace!("labelling {}", best.name);
                self.labels.insert(Annotation::new(
                    best.name,
                    best.direction,
                    look,
                    limit,
                    Color::WHITE,
                    BEST_HOLD_SECONDS,
                    at.now,
                ));
            }
        }

        layout.clear_reserved();
        for sprite in solar {
            if self.settings.cull && look.dot(&sprite.direction) < limit {
                continue;
            }
            if let Some(bounds) = layout.place(&metrics, &sprite.name, &sprite.direction, &look, limit) {
                frame.push_label(&sprite.name, bounds, SOLAR_NAME_COLOR);
            }
            if let Some(position) = camera.project(&sprite.direction) {
                let radius = sprite.scale * scale * SPRITE_PIXELS;
                frame.sprites.push(SpriteDraw { sprite, position, radius });
            }
        }
    }

    fn globe_view(
        &mut self,
        frame: &mut Frame,
        layout: &mut NonOverlapLayout,
        measure: &dyn TextMeasure,
        at: FrameTime,
        lat: f64,
        lon: f64,
    ) {
        let camera = frame.camera;
        let look = camera.look_dir();
        let metrics = ProjectedLabels { camera: &camera, measure, up: camera.screen_up() };
        let scale = self.settings.scale;

        frame.globe = camera
            .project_sphere(&Vector3::zeros(), 1.0)
            .map(|(center, radius)| Disc { center, radius });

        for (from, to) in graticule() {
            if !camera.occluded_by_unit_sphere(&((from + to) * 0.5)) {
                frame.push_segment(&from, &to, GRATICULE_COLOR);
            }
        }

        let observer = spherical_to_cartesian(
            OBSERVER_ALTITUDE,
            self.settings.latitude.to_radians(),
            self.settings.longitude.to_radians(),
        );
        if !camera.occluded_by_unit_sphere(&observer) {
            if let Some(position) = camera.project(&observer) {
                frame.points.push(PointDraw { position, radius: OBSERVER_DOT * scale, color: OBSERVER_COLOR });
            }
        }

        if !self.settings.show_satellites {
            return;
        }
        let tint = satellite_tint(at.wall_seconds);
        let reference = rotation_z(at.phase) * lat_lon_to_unit_vector(lat.to_radians(), lon.to_radians());
        let to_earth_fixed = rotation_z(-at.phase);
        let satellites = self.tracker.satellites();
        for (rank, &i) in self.tracker.ranked_by(&reference).iter().enumerate() {
            let sat = &satellites[i];
            let p = to_earth_fixed * sat.position / EARTH_RADIUS_KM;
            if p.norm() < 1.0 || camera.occluded_by_unit_sphere(&p) {
                continue;
            }
            let Some(position) = camera.project(&p) else { continue };
            frame.points.push(PointDraw { position, radius: SATELLITE_DOT * scale, color: tint });
            if rank < self.settings.max_satellites {
                if let Some(bounds) = layout.place(&metrics, &sat.name, &p, &look, f64::NEG_INFINITY) {
                    frame.push_label(&sat.name, bounds, tint);
                }
            }
        }
    }

    /// Abandons any download in flight.
    pub fn shutdown(&mut self) {
        self.tracker.cancel_fetch();
        log::info!("sky engine shut down");
    }
}

/// Parallels and meridians on the unit sphere as short segments.
fn graticule() -> Vec<(Vector3<f64>, Vector3<f64>)> {
    let point = |lat: i32, lon: i32| lat_lon_to_unit_vector((lat as f64).to_radians(), (lon as f64).to_radians());
    let mut out = Vec::new();
    for lat in (-90 + GRATICULE_STEP_DEGREES..90).step_by(GRATICULE_STEP_DEGREES as usize) {
        for lon in (-180..180).step_by(GRATICULE_SEGMENT_DEGREES as usize) {
            out.push((point(lat, lon), point(lat, lon + GRATICULE_SEGMENT_DEGREES)));
        }
    }
    for lon in (-180..180).step_by(GRATICULE_STEP_DEGREES as usize) {
        for lat in (-90..90).step_by(GRATICULE_SEGMENT_DEGREES as usize) {
            out.push((point(lat, lon), point(lat + GRATICULE_SEGMENT_DEGREES, lon)));
        }
    }
    out
}
