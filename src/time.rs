//! Time base for orbital phase.
//!
//! Converts wall-clock time into seconds and days since the J2000 epoch
//! (2000-01-01 12:00:00 UTC), with a user-adjustable bias in hours, and
//! provides the earth's sidereal rotation phase used to place the observer
//! in the inertial frame.

use chrono::{DateTime, TimeZone, Utc};
use std::f64::consts::TAU;

use crate::error::{Error, Result};

pub const SECONDS_PER_DAY: f64 = 86400.0;
/// Sidereal rotation period of the earth in days.
pub const EARTH_ROTATION_PERIOD_DAYS: f64 = 0.9972708;
/// Rotation phase offset at the epoch, radians.
pub const EARTH_ROTATION_PHASE: f64 = -1.747;
/// Obliquity of the ecliptic, radians.
pub const EARTH_ROTATION_TILT: f64 = 0.4092797;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant. Useful for reproducible frames.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn j2000_epoch() -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0)
        .single()
        .ok_or(Error::Epoch)
}

pub struct TimeBase {
    epoch: DateTime<Utc>,
    clock: Box<dyn Clock + Send>,
}

impl TimeBase {
    pub fn new(clock: impl Clock + Send + 'static) -> Result<Self> {
        let epoch = j2000_epoch()?;
        log::debug!("J2000 epoch resolved to {epoch}");
        Ok(Self { epoch, clock: Box::new(clock) })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn seconds_since_epoch(&self, bias_hours: f64) -> i64 {
        let dt = (self.clock.now() - self.epoch).num_seconds();
        let bias = (bias_hours * 3600.0) as i64;
        dt + bias
    }

    pub fn days_since_epoch(&self, bias_hours: f64) -> f64 {
        self.seconds_since_epoch(bias_hours) as f64 / SECONDS_PER_DAY
    }

    /// Unix time in seconds, biased the same way as the J2000 values so
    /// satellites and planets share one notion of "now".
    pub fn unix_seconds(&self, bias_hours: f64) -> f64 {
        self.epoch.timestamp() as f64 + self.seconds_since_epoch(bias_hours) as f64
    }
}

/// Sidereal rotation phase of the earth in radians.
pub fn earth_rotation_phase(days_since_epoch: f64) -> f64 {
    (days_since_epoch / EARTH_ROTATION_PERIOD_DAYS) * TAU - EARTH_ROTATION_PHASE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn at(dt: DateTime<Utc>) -> TimeBase {
        TimeBase::new(FixedClock(dt)).unwrap()
    }

    #[test]
    fn test_epoch_is_noon_utc() {
        let epoch = j2000_epoch().unwrap();
        assert_eq!(epoch.to_rfc3339(), "2000-01-01T12:00:00+00:00");
        assert_eq!(epoch.timestamp(), 946_728_000);
    }

    #[test]
    fn test_days_since_epoch() {
        let epoch = j2000_epoch().unwrap();
        let tb = at(epoch + Duration::days(10) + Duration::hours(12));
        assert_eq!(tb.seconds_since_epoch(0.0), 10 * 86400 + 12 * 3600);
        assert_relative_eq!(tb.days_since_epoch(0.0), 10.5);
    }

    #[test]
    fn test_bias_hours_truncated_to_whole_seconds() {
        let epoch = j2000_epoch().unwrap();
        let tb = at(epoch);
        assert_eq!(tb.seconds_since_epoch(2.0), 7200);
        assert_eq!(tb.seconds_since_epoch(-1.5), -5400);
        assert_eq!(tb.seconds_since_epoch(0.0001), 0);
    }

    #[test]
    fn test_unix_seconds_follows_bias() {
        let epoch = j2000_epoch().unwrap();
        let tb = at(epoch + Duration::seconds(30));
        assert_relative_eq!(tb.unix_seconds(1.0), 946_728_000.0 + 30.0 + 3600.0);
    }

    #[test]
    fn test_earth_phase_advances_one_turn_per_sidereal_day() {
        let p0 = earth_rotation_phase(0.0);
        let p1 = earth_rotation_phase(EARTH_ROTATION_PERIOD_DAYS);
        assert_relative_eq!(p0, 1.747);
        assert_relative_eq!(p1 - p0, TAU, epsilon = 1e-12);
    }
}
