//! Screen-space label rectangles.
//!
//! Labels are drawn along the projected "up" direction of the sky, so their
//! footprints are arbitrary rectangles rather than axis-aligned ones. Overlap
//! is decided with the separating axis test over both boxes' edge normals.

use nalgebra::{Point2, Vector2};

const AREA_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    /// Corners in winding order, pixels.
    pub corners: [Point2<f64>; 4],
}

impl OrientedBox {
    pub fn new(corners: [Point2<f64>; 4]) -> Self {
        Self { corners }
    }

    /// Rectangle with one corner at `origin`, its width running along
    /// `along` and its height along `up`. Both axes are normalized here.
    pub fn from_axes(origin: Point2<f64>, along: Vector2<f64>, up: Vector2<f64>, size: Vector2<f64>) -> Self {
        let along = along.try_normalize(0.0).unwrap_or_else(Vector2::x);
        let up = up.try_normalize(0.0).unwrap_or_else(|| Vector2::new(-along.y, along.x));
        let w = along * size.x;
        let h = up * size.y;
        Self::new([origin, origin + w, origin + w + h, origin + h])
    }

    /// All four corners at the origin. Never intersects anything.
    pub fn empty() -> Self {
        Self::new([Point2::origin(); 4])
    }

    pub fn axis_aligned(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self::new([
            min,
            Point2::new(max.x, min.y),
            max,
            Point2::new(min.x, max.y),
        ])
    }

    pub fn area(&self) -> f64 {
        let c = &self.corners;
        let mut twice = 0.0;
        for i in 0..4 {
            let (a, b) = (c[i], c[(i + 1) % 4]);
            twice += a.x * b.y - b.x * a.y;
        }
        (twice * 0.5).abs()
    }

    /// Degenerate boxes come from labels that project to nothing (behind the
    /// camera, or empty text). They never take part in layout.
    pub fn is_empty(&self) -> bool {
        self.area() < AREA_EPSILON
    }

    pub fn center(&self) -> Point2<f64> {
        let sum = self.corners.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / 4.0)
    }

    pub fn longest_edge(&self) -> f64 {
        (0..4)
            .map(|i| (self.corners[(i + 1) % 4] - self.corners[i]).norm())
            .fold(0.0, f64::max)
    }

    fn project(&self, axis: &Vector2<f64>) -> (f64, f64) {
        self.corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let d = axis.dot(&p.coords);
            (lo.min(d), hi.max(d))
        })
    }

    fn edge_normals(&self) -> impl Iterator<Item = Vector2<f64>> + '_ {
        (0..4).filter_map(move |i| {
            let e = self.corners[(i + 1) % 4] - self.corners[i];
            Vector2::new(-e.y, e.x).try_normalize(0.0)
        })
    }

    /// True when the interiors overlap. Boxes that only share an edge or a
    /// corner do not intersect.
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        for axis in self.edge_normals().chain(other.edge_normals()) {
            let (a_lo, a_hi) = self.project(&axis);
            let (b_lo, b_hi) = other.project(&axis);
            if a_hi <= b_lo || b_hi <= a_lo {
                return false;
            }
        }
        true
    }
}
