//! Pointer drags with inertia.
//!
//! Drags are measured in degrees (scaled by the field of view so the sky
//! tracks the finger) and steer either the globe or the manual star view.
//! The largest step of a drag keeps coasting after release until the drag
//! factor has bled it away.

use nalgebra::Vector2;

use crate::config::Settings;
use crate::math::modulo_range;
use crate::view::ViewMode;

/// Inertia below this magnitude no longer moves the view.
const INERTIA_THRESHOLD: f64 = 1.0;

#[derive(Clone, Debug, Default)]
pub struct DragInput {
    prev: Option<Vector2<f64>>,
    inertia: Vector2<f64>,
    touch_active: bool,
}

impl DragInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inertia(&self) -> Vector2<f64> {
        self.inertia
    }

    pub fn is_touching(&self) -> bool {
        self.touch_active
    }

    /// Feeds one pointer sample. Returns the drag step in degrees while the
    /// pointer is held and has moved since the previous sample.
    pub fn process(&mut self, active: bool, x: f64, y: f64, fov_degrees: f64) -> Option<Vector2<f64>> {
        self.touch_active = active;
        if !active {
            self.prev = None;
            return None;
        }

        let pos = Vector2::new(x, y);
        let step = self.prev.map(|prev| (pos - prev) * (0.25 * fov_degrees / 90.0));
        self.prev = Some(pos);

        let step = step?;
        if step.x.abs() > self.inertia.x.abs() {
            self.inertia.x = step.x;
        }
        if step.y.abs() > self.inertia.y.abs() {
            self.inertia.y = step.y;
        }
        Some(step)
    }

    /// Decays the inertia by `drag` and returns the coasting step, if any.
    pub fn coast(&mut self, drag: f64) -> Option<Vector2<f64>> {
        self.inertia *= drag;
        if !self.touch_active && self.inertia.norm() > INERTIA_THRESHOLD {
            Some(self.inertia)
        } else {
            None
        }
    }

    /// Lets a released drag keep turning the view. Returns whether it moved.
    pub fn apply_inertia(&mut self, mode: &mut ViewMode, settings: &mut Settings) -> bool {
        match self.coast(settings.input_drag) {
            Some(step) => {
                apply_drag(step, mode, settings);
                true
            }
            None => false,
        }
    }
}

/// Moves the current view by a drag step: the globe pans (and optionally
/// carries the observer along), the star view turns when it is not
/// following the compass.
pub fn apply_drag(step: Vector2<f64>, mode: &mut ViewMode, settings: &mut Settings) {
    match mode {
        ViewMode::Globe { lat, lon } => {
            if step.x == 0.0 && step.y == 0.0 {
                return;
            }
            *lat = (*lat - step.y).clamp(-90.0, 90.0);
            *lon = modulo_range(*lon - step.x, -180.0, 180.0);
            if settings.change_location {
                settings.use_core_location = false;
                settings.latitude = *lat;
                settings.longitude = *lon;
            }
        }
        ViewMode::Stars if !settings.use_compass => {
            settings.manual_phi = (settings.manual_phi - step.y).clamp(-90.0, 90.0);
            settings.manual_theta = modulo_range(settings.manual_theta + step.x, -180.0, 180.0);
        }
        ViewMode::Stars => {}
    }
}

/// Which platform feeds have delivered anything yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Availability {
    pub compass: bool,
    pub location: bool,
    pub satellites: bool,
}

/// Turns off toggles whose data never arrived.
pub fn force_unavailable_off(settings: &mut Settings, available: Availability) {
    if settings.use_core_location && !available.location {
        log::info!("turning off location services: no location update received");
        settings.use_core_location = false;
    }
    if settings.use_compass && !available.compass {
        log::info!("turning off compass: no compass update received");
        settings.use_compass = false;
    }
    if settings.show_satellites && !available.satellites {
        log::info!("turning off satellites: no TLE data");
        settings.show_satellites = false;
    }
}
