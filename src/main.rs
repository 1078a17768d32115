//! Desktop sky viewer.
//!
//! Hosts a [`SkyEngine`] in an eframe window, feeds it pointer drags and
//! paints each frame it returns with the egui painter.

use std::path::PathBuf;

use eframe::egui;
use eframe::egui::epaint::TextShape;
use nalgebra::{Point2, Vector2};

use star3map::fetch::UreqReader;
use star3map::sky::Frame;
use star3map::sprite::Color;
use star3map::time::SystemClock;
use star3map::tle::TleSource;
use star3map::view::TextMeasure;
use star3map::{Settings, SkyEngine, ViewMode};

const LABEL_FONT_SIZE: f32 = 14.0;

fn home_dir(sub: &str) -> PathBuf {
    match std::env::var_os("HOME") {
        Some(h) => PathBuf::from(h).join(sub),
        None => PathBuf::from("."),
    }
}

/// Holds the settings and, optionally, `stars.json` and `constellations.json`.
fn config_dir() -> PathBuf {
    home_dir(".config").join("star3map")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn cache_dir() -> PathBuf {
    home_dir(".cache").join("star3map").join("satellite")
}

fn color32(c: Color) -> egui::Color32 {
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    egui::Color32::from_rgba_unmultiplied(byte(c.r), byte(c.g), byte(c.b), byte(c.a))
}

fn pos2(p: Point2<f64>, origin: egui::Pos2) -> egui::Pos2 {
    egui::pos2(origin.x + p.x as f32, origin.y + p.y as f32)
}

struct PainterMeasure<'a> {
    painter: &'a egui::Painter,
}

impl TextMeasure for PainterMeasure<'_> {
    fn text_size(&self, text: &str) -> Vector2<f64> {
        let galley = self.painter.layout_no_wrap(
            text.to_string(),
            egui::FontId::proportional(LABEL_FONT_SIZE),
            egui::Color32::WHITE,
        );
        let size = galley.size();
        Vector2::new(size.x as f64, size.y as f64)
    }
}

struct App {
    engine: SkyEngine,
    settings_path: PathBuf,
}

impl App {
    fn new(engine: SkyEngine, settings_path: PathBuf) -> Self {
        Self { engine, settings_path }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("View");
        ui.horizontal(|ui| {
            let stars = self.engine.mode() == ViewMode::Stars;
            if ui.selectable_label(stars, "Sky").clicked() {
                self.engine.show_stars();
            }
            if ui.selectable_label(!stars, "Globe").clicked() {
                self.engine.show_globe();
            }
        });

        let mut source = self.engine.settings().satellite_source;
        egui::ComboBox::from_id_salt("satellite_source")
            .selected_text(source.label())
            .show_ui(ui, |ui| {
                for s in TleSource::ALL {
                    ui.selectable_value(&mut source, s, s.label());
                }
            });
        if source != self.engine.tracker().source() {
            self.engine.set_satellite_source(source);
        }
        ui.horizontal(|ui| {
            let fetching = self.engine.tracker().is_fetching();
            if ui.add_enabled(!fetching, egui::Button::new("Fetch TLEs")).clicked() {
                self.engine.fetch_satellites();
            }
            if fetching {
                ui.spinner();
            } else {
                ui.label(format!("{} satellites", self.engine.tracker().len()));
            }
        });

        let s = self.engine.settings_mut();
        ui.checkbox(&mut s.show_satellites, "Satellites");
        ui.add(egui::Slider::new(&mut s.max_satellites, 0..=200).text("Labelled"));

        ui.separator();
        ui.heading("Observer");
        ui.add(egui::Slider::new(&mut s.latitude, -90.0..=90.0).text("Latitude"));
        ui.add(egui::Slider::new(&mut s.longitude, -180.0..=180.0).text("Longitude"));
        ui.checkbox(&mut s.change_location, "Drag globe moves observer");
        ui.checkbox(&mut s.use_core_location, "Location service");
        ui.checkbox(&mut s.use_compass, "Compass");
        ui.add(egui::Slider::new(&mut s.time_bias_hours, -48.0..=48.0).text("Time bias (h)"));

        ui.separator();
        ui.heading("Display");
        ui.add(egui::Slider::new(&mut s.fov_degrees, 20.0..=120.0).text("Field of view"));
        ui.add(egui::Slider::new(&mut s.scale, 0.5..=3.0).text("Scale"));
        ui.add(egui::Slider::new(&mut s.star_scale, 0.5..=3.0).text("Star scale"));
        ui.add(egui::Slider::new(&mut s.input_drag, 0.0..=0.99).text("Drag"));
        ui.checkbox(&mut s.cull, "Cull");
        ui.checkbox(&mut s.pause_aging, "Pause labels");
        ui.add(egui::Slider::new(&mut s.debug_labels, 0..=2).text("Debug labels"));

        ui.separator();
        ui.label(self.engine.time().now().format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
}

fn paint(painter: &egui::Painter, origin: egui::Pos2, frame: &Frame) {
    if let Some(globe) = frame.globe {
        painter.circle_filled(pos2(globe.center, origin), globe.radius as f32, egui::Color32::from_rgb(10, 30, 70));
    }
    for line in &frame.lines {
        painter.line_segment(
            [pos2(line.from, origin), pos2(line.to, origin)],
            egui::Stroke::new(1.0, color32(line.color)),
        );
    }
    for s in &frame.sprites {
        painter.circle_filled(pos2(s.position, origin), s.radius as f32, color32(s.sprite.color));
    }
    for p in &frame.points {
        painter.circle_filled(pos2(p.position, origin), p.radius as f32, color32(p.color));
    }
    for label in &frame.labels {
        let color = color32(label.color);
        let galley = painter.layout_no_wrap(label.text.clone(), egui::FontId::proportional(LABEL_FONT_SIZE), color);
        painter.add(TextShape::new(pos2(label.origin(), origin), galley, color).with_angle(label.angle() as f32));
    }
    for b in &frame.debug_boxes {
        let points = b.corners.iter().map(|c| pos2(*c, origin)).collect();
        painter.add(egui::Shape::closed_line(points, egui::Stroke::new(1.0, egui::Color32::RED)));
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::SidePanel::left("settings").resizable(false).show(ctx, |ui| self.side_panel(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::drag());
                let rect = response.rect;

                match response.interact_pointer_pos() {
                    Some(p) if response.dragged() => {
                        self.engine.pointer(true, (p.x - rect.min.x) as f64, (p.y - rect.min.y) as f64)
                    }
                    _ => self.engine.pointer(false, 0.0, 0.0),
                }

                let wall_seconds = ctx.input(|i| i.time);
                let viewport = Vector2::new(rect.width() as f64, rect.height() as f64);
                let measure = PainterMeasure { painter: &painter };
                let frame = self.engine.frame(wall_seconds, viewport, &measure);
                paint(&painter, rect.min, &frame);
            });

        ctx.request_repaint();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.engine.shutdown();
        if let Err(e) = self.engine.settings().save(&self.settings_path) {
            log::warn!("{e}");
        }
    }
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings_path = settings_path();
    let settings = match Settings::load(&settings_path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("{e}, using defaults");
            Settings::default()
        }
    };
    let mut engine = match SkyEngine::new(settings, SystemClock, cache_dir()) {
        Ok(engine) => engine.with_url_reader(UreqReader),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = engine.load_catalog_dir(config_dir()) {
        log::warn!("{e}, using the built-in catalogs");
    }
    engine.fetch_satellites();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        &format!("star3map ({})", env!("GIT_HASH")),
        options,
        Box::new(move |_cc| Ok(Box::new(App::new(engine, settings_path)))),
    )
}
