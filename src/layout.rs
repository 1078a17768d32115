//! Greedy non-overlapping label placement.
//!
//! Labels are offered in priority order. Each one that passes its view cone
//! and does not collide with anything already placed (or reserved) is
//! committed; the rest are dropped for this frame.

use nalgebra::Vector3;

use crate::bounds::OrientedBox;

/// Measures a label and projects it to its on-screen footprint.
pub trait LabelMetrics {
    fn label_bounds(&self, text: &str, direction: &Vector3<f64>) -> OrientedBox;
}

#[derive(Clone, Debug, Default)]
pub struct NonOverlapLayout {
    committed: Vec<OrientedBox>,
    reserved: Vec<OrientedBox>,
}

fn outside_cone(direction: &Vector3<f64>, look_dir: &Vector3<f64>, limit: f64) -> bool {
    look_dir.dot(direction) < limit
}

impl NonOverlapLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &[OrientedBox] {
        &self.committed
    }

    pub fn reserved(&self) -> &[OrientedBox] {
        &self.reserved
    }

    /// Holds space for a label that will be placed later in the frame.
    pub fn reserve<M: LabelMetrics + ?Sized>(
        &mut self,
        metrics: &M,
        text: &str,
        direction: &Vector3<f64>,
        look_dir: &Vector3<f64>,
        limit: f64,
    ) {
        if outside_cone(direction, look_dir, limit) {
            return;
        }
        self.reserved.push(metrics.label_bounds(text, direction));
    }

    pub fn clear_reserved(&mut self) {
        self.reserved.clear();
    }

    /// Whether the label would fit among the committed labels. Reservations
    /// are ignored.
    pub fn can_place<M: LabelMetrics + ?Sized>(
        &self,
        metrics: &M,
        text: &str,
        direction: &Vector3<f64>,
        look_dir: &Vector3<f64>,
        limit: f64,
    ) -> bool {
        if outside_cone(direction, look_dir, limit) {
            return false;
        }
        let bounds = metrics.label_bounds(text, direction);
        !self.committed.iter().any(|b| b.intersects(&bounds))
    }

    /// Commits the label if it is in view, projects to something, and
    /// misses every committed and reserved box. Returns its bounds when
    /// placed.
    pub fn place<M: LabelMetrics + ?Sized>(
        &mut self,
        metrics: &M,
        text: &str,
        direction: &Vector3<f64>,
        look_dir: &Vector3<f64>,
        limit: f64,
    ) -> Option<OrientedBox> {
        if outside_cone(direction, look_dir, limit) {
            return None;
        }
        let bounds = metrics.label_bounds(text, direction);
        if bounds.is_empty() {
            return None;
        }
        let blocked = self
            .committed
            .iter()
            .chain(self.reserved.iter())
            .any(|b| b.intersects(&bounds));
        if blocked {
            return None;
        }
        self.committed.push(bounds);
        Some(bounds)
    }
}
