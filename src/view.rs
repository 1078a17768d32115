//! View state and the projection math shared by both views.
//!
//! The star view looks out from the observer into the inertial equatorial
//! frame; the globe view looks down on a unit earth from two radii away.
//! Both hand a [`Camera`] to the frame builder, which uses it for projection,
//! culling and label placement.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix3, Point2, Vector2, Vector3};

use crate::bounds::OrientedBox;
use crate::layout::LabelMetrics;
use crate::math::{rotation_x, rotation_y, rotation_z};

/// Globe camera distance from the earth's center, in earth radii.
pub const GLOBE_DISTANCE: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewMode {
    Stars,
    /// Globe centered on `lat`/`lon`, degrees.
    Globe { lat: f64, lon: f64 },
}

/// World-to-local rotation for an observer at `lat`/`lon` (radians). The
/// local frame has x east, y north and z toward the zenith. `earth_phase`
/// turns the earth-fixed frame into the inertial one; pass 0 for an
/// earth-fixed world.
pub fn observer_rotation(lat: f64, lon: f64, earth_phase: f64) -> Matrix3<f64> {
    rotation_y(-FRAC_PI_2)
        * rotation_x(-FRAC_PI_2)
        * rotation_y(lat)
        * rotation_z(-lon)
        * rotation_z(-earth_phase)
}

/// Local-to-eye rotation for a hand-steered view. `phi` is the elevation and
/// `theta` the azimuth, both in degrees; (0, 0) looks at the northern horizon.
pub fn manual_orientation(phi_degrees: f64, theta_degrees: f64) -> Matrix3<f64> {
    rotation_x(-(phi_degrees + 90.0).to_radians()) * rotation_z(-theta_degrees.to_radians())
}

/// Measures text in pixels. Implemented by the renderer.
pub trait TextMeasure {
    fn text_size(&self, text: &str) -> Vector2<f64>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World to eye.
    pub rotation: Matrix3<f64>,
    /// Eye-space offset applied after the rotation.
    pub translation: Vector3<f64>,
    /// Vertical field of view.
    pub fov_degrees: f64,
    /// Width and height in pixels.
    pub viewport: Vector2<f64>,
}

impl Camera {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>, fov_degrees: f64, viewport: Vector2<f64>) -> Self {
        Self { rotation, translation, fov_degrees, viewport }
    }

    pub fn aspect(&self) -> f64 {
        if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        }
    }

    fn half_tan(&self) -> f64 {
        (self.fov_degrees.to_radians() * 0.5).tan()
    }

    pub fn to_eye(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * world + self.translation
    }

    /// Eye position in world coordinates.
    pub fn position(&self) -> Vector3<f64> {
        -(self.rotation.transpose() * self.translation)
    }

    /// Screen position in pixels, y down. `None` behind the eye.
    pub fn project(&self, world: &Vector3<f64>) -> Option<Point2<f64>> {
        let eye = self.to_eye(world);
        if eye.z > -1e-6 {
            return None;
        }
        let t = self.half_tan();
        let ndc_x = eye.x / (-eye.z * t * self.aspect());
        let ndc_y = eye.y / (-eye.z * t);
        Some(Point2::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc_y) * 0.5 * self.viewport.y,
        ))
    }

    /// World direction through the center of the screen.
    pub fn look_dir(&self) -> Vector3<f64> {
        self.rotation.transpose() * Vector3::new(0.0, 0.0, -1.0)
    }

    /// World direction through the top-right corner of the screen.
    pub fn corner_dir(&self) -> Vector3<f64> {
        let t = self.half_tan();
        let eye = Vector3::new(t * self.aspect(), t, -1.0).normalize();
        self.rotation.transpose() * eye
    }

    /// World direction that appears straight up on screen.
    pub fn screen_up(&self) -> Vector3<f64> {
        self.rotation.transpose() * Vector3::y()
    }

    /// Cosine of the angle between the look direction and a screen corner.
    /// Anything with a smaller dot product is off screen.
    pub fn cull_limit(&self) -> f64 {
        self.look_dir().dot(&self.corner_dir())
    }

    /// A tighter cone around the center, for picking the one label worth
    /// drawing.
    pub fn label_limit(&self) -> f64 {
        (self.cull_limit() + 8.0) / 9.0
    }

    /// Screen circle covering a sphere, from its center and a point on its
    /// visible limb.
    pub fn project_sphere(&self, center: &Vector3<f64>, radius: f64) -> Option<(Point2<f64>, f64)> {
        let eye_center = self.to_eye(center);
        let d = eye_center.norm();
        if d <= radius {
            return None;
        }
        let c = self.project(center)?;
        // Tangent point seen from the eye, in the plane of eye and screen x.
        let along = eye_center / d;
        let side = along.cross(&Vector3::y()).try_normalize(0.0).unwrap_or_else(Vector3::x);
        let limb_eye = eye_center - along * (radius * radius / d) + side * (radius * (d * d - radius * radius).sqrt() / d);
        let limb_world = self.rotation.transpose() * (limb_eye - self.translation);
        let l = self.project(&limb_world)?;
        Some((c, (l - c).norm()))
    }

    /// Whether the segment from the eye to `world` passes through the unit
    /// sphere at the origin before reaching it.
    pub fn occluded_by_unit_sphere(&self, world: &Vector3<f64>) -> bool {
        let eye = self.position();
        let d = world - eye;
        let len2 = d.norm_squared();
        if len2 == 0.0 {
            return false;
        }
        let t = (-eye.dot(&d) / len2).clamp(0.0, 1.0);
        t < 1.0 && (eye + d * t).norm() < 1.0
    }

    /// Footprint of `size` pixels of text whose baseline is centered on
    /// `anchor`, rotated so that `up` (a world direction) points up the text.
    pub fn label_box(&self, anchor: &Vector3<f64>, up: &Vector3<f64>, size: Vector2<f64>) -> OrientedBox {
        let Some(p) = self.project(anchor) else { return OrientedBox::empty() };
        let step = 0.01 * anchor.norm().max(1e-3);
        let Some(q) = self.project(&(anchor + up * step)) else { return OrientedBox::empty() };
        let screen_up = match (q - p).try_normalize(0.0) {
            Some(u) => u,
            None => Vector2::new(0.0, -1.0),
        };
        let along = Vector2::new(-screen_up.y, screen_up.x);
        let origin = p - along * (size.x * 0.5);
        OrientedBox::from_axes(origin, along, screen_up, size)
    }
}

/// Label footprints for one frame: text measured by the renderer, anchored
/// at a world point and turned to follow `up`.
pub struct ProjectedLabels<'a> {
    pub camera: &'a Camera,
    pub measure: &'a dyn TextMeasure,
    pub up: Vector3<f64>,
}

impl LabelMetrics for ProjectedLabels<'_> {
    fn label_bounds(&self, text: &str, direction: &Vector3<f64>) -> OrientedBox {
        if text.is_empty() {
            return OrientedBox::empty();
        }
        self.camera.label_box(direction, &self.up, self.measure.text_size(text))
    }
}
