//! Sky map engine.
//!
//! Computes where the sun, moon, planets, bright stars and tracked satellites
//! sit in the observer's sky each frame, and decides which of their labels can
//! be drawn without overlapping, fading them in and out over time.

pub mod annotation;
pub mod bounds;
pub mod celestial;
pub mod config;
pub mod error;
pub mod fetch;
pub mod input;
pub mod layout;
pub mod math;
pub mod moon;
pub mod orbit;
pub mod sky;
pub mod solar_system;
pub mod sprite;
pub mod stars;
pub mod time;
pub mod tle;
pub mod view;

pub use config::Settings;
pub use error::{Error, Result};
pub use sky::{Frame, SkyEngine};
pub use view::{Camera, ViewMode};
