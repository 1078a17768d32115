//! Fading labels and line groups.
//!
//! Every annotation walks `RampUp → Hold → RampDown → Terminate` once. The
//! owning [`AnnotationSet`] keeps at most one annotation per key and drops
//! terminated ones that have not been asked for again within a short grace
//! window. All timestamps are read from an [`AgingClock`] so that pausing
//! freezes every fade in place.

use nalgebra::Vector3;

use crate::sprite::Color;

pub const RAMP_UP_SECONDS: f64 = 0.5;
pub const RAMP_DOWN_SECONDS: f64 = 1.0;
/// A terminated annotation survives this long after it was last seen.
pub const SEEN_GRACE_SECONDS: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FadeState {
    RampUp,
    Hold,
    RampDown,
    Terminate,
}

/// Seconds that only advance while aging is not paused.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgingClock {
    elapsed: f64,
    last_wall: Option<f64>,
}

impl AgingClock {
    /// Advances by the wall-clock step since the previous tick unless
    /// `paused`, and returns the aging time. Backward steps count as zero.
    pub fn tick(&mut self, wall_seconds: f64, paused: bool) -> f64 {
        let step = self.last_wall.map_or(0.0, |last| (wall_seconds - last).max(0.0));
        self.last_wall = Some(wall_seconds);
        if !paused {
            self.elapsed += step;
        }
        self.elapsed
    }

    pub fn now(&self) -> f64 {
        self.elapsed
    }
}

#[derive(Clone, Debug)]
pub struct Annotation<K> {
    pub key: K,
    pub direction: Vector3<f64>,
    /// View direction when the annotation was created; together with
    /// `limit` it gates drawing for the annotation's whole life.
    pub look_dir: Vector3<f64>,
    pub limit: f64,
    pub color: Color,
    pub hold_seconds: f64,
    state: FadeState,
    phase_start: f64,
    last_seen: f64,
    alpha: f32,
}

impl<K> Annotation<K> {
    pub fn new(
        key: K,
        direction: Vector3<f64>,
        look_dir: Vector3<f64>,
        limit: f64,
        color: Color,
        hold_seconds: f64,
        now: f64,
    ) -> Self {
        Self {
            key,
            direction,
            look_dir,
            limit,
            color,
            hold_seconds,
            state: FadeState::RampUp,
            phase_start: now,
            last_seen: now,
            alpha: 0.0,
        }
    }

    pub fn state(&self) -> FadeState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn last_seen(&self) -> f64 {
        self.last_seen
    }

    pub fn is_terminated(&self) -> bool {
        self.state == FadeState::Terminate
    }

    /// Base color with the current fade applied.
    pub fn faded_color(&self) -> Color {
        self.color.with_alpha(self.alpha)
    }

    /// Refreshes the grace window. The fade phase is untouched.
    pub fn seen(&mut self, now: f64) {
        self.last_seen = now;
    }

    /// Brings state and alpha up to `now`. A long step can cross several
    /// phases in one call.
    pub fn age(&mut self, now: f64) {
        let base = self.color.a as f64;
        loop {
            let delta = now - self.phase_start;
            match self.state {
                FadeState::RampUp if delta > RAMP_UP_SECONDS => {
                    self.phase_start += RAMP_UP_SECONDS;
                    self.state = FadeState::Hold;
                }
                FadeState::RampUp => {
                    self.set_alpha(delta / RAMP_UP_SECONDS * base);
                    return;
                }
                FadeState::Hold if delta > self.hold_seconds => {
                    self.phase_start += self.hold_seconds;
                    self.state = FadeState::RampDown;
                }
                FadeState::Hold => {
                    self.set_alpha(base);
                    return;
                }
                FadeState::RampDown if delta > RAMP_DOWN_SECONDS => {
                    self.phase_start += RAMP_DOWN_SECONDS;
                    self.state = FadeState::Terminate;
                }
                FadeState::RampDown => {
                    self.set_alpha((1.0 - delta / RAMP_DOWN_SECONDS) * base);
                    return;
                }
                FadeState::Terminate => {
                    self.alpha = 0.0;
                    return;
                }
            }
        }
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, self.color.a as f64) as f32;
    }
}

/// Insertion-ordered annotations, unique by key.
#[derive(Clone, Debug)]
pub struct AnnotationSet<K> {
    items: Vec<Annotation<K>>,
}

impl<K> Default for AnnotationSet<K> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<K: PartialEq> AnnotationSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&Annotation<K>> {
        self.items.iter().find(|a| a.key == *key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Adds `annotation` unless one with the same key already exists.
    /// Returns whether it was added.
    pub fn insert(&mut self, annotation: Annotation<K>) -> bool {
        if self.contains(&annotation.key) {
            return false;
        }
        self.items.push(annotation);
        true
    }

    /// Marks the annotation for `key` as seen at `now`; false if absent.
    pub fn mark_seen(&mut self, key: &K, now: f64) -> bool {
        match self.items.iter_mut().find(|a| a.key == *key) {
            Some(a) => {
                a.seen(now);
                true
            }
            None => false,
        }
    }

    /// Creates the annotation for `key` with `make` if it is missing,
    /// otherwise marks the existing one seen.
    pub fn create_or_seen(&mut self, key: &K, now: f64, make: impl FnOnce() -> Annotation<K>) {
        if !self.mark_seen(key, now) {
            let annotation = make();
            debug_assert!(annotation.key == *key);
            self.items.push(annotation);
        }
    }

    /// Ages every annotation, then purges the terminated ones whose grace
    /// window has lapsed.
    pub fn age(&mut self, now: f64) {
        for a in &mut self.items {
            a.age(now);
        }
        let before = self.items.len();
        self.items
            .retain(|a| !a.is_terminated() || now - a.last_seen < SEEN_GRACE_SECONDS);
        let purged = before - self.items.len();
        if purged > 0 {
            log::trace!("purged {purged} annotations");
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation<K>> {
        self.items.iter()
    }
}
