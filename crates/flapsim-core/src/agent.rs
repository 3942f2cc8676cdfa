//! Bird body and its per-tick flight integration.

use serde::{Deserialize, Serialize};

use crate::FlapConfig;

/// Flight constants copied out of [`FlapConfig`] for the hot path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Physics {
    pub impulse_velocity: f64,
    pub gravity: f64,
    pub terminal_velocity: f64,
    pub rise_boost: f64,
    pub max_tilt: f64,
    pub tilt_velocity: f64,
    pub dive_tilt: f64,
    pub dive_threshold: f64,
}

impl Physics {
    #[must_use]
    pub fn from_config(config: &FlapConfig) -> Self {
        Self {
            impulse_velocity: config.impulse_velocity,
            gravity: config.gravity,
            terminal_velocity: config.terminal_velocity,
            rise_boost: config.rise_boost,
            max_tilt: config.max_tilt,
            tilt_velocity: config.tilt_velocity,
            dive_tilt: config.dive_tilt,
            dive_threshold: config.dive_threshold,
        }
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::from_config(&FlapConfig::default())
    }
}

/// A single simulated bird.
///
/// Vertical motion is not integrated from a velocity; each tick replays the displacement law
/// `v0 * t + gravity * t^2` for the number of ticks since the last impulse, so the arc after a jump
/// is fully determined by `t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bird {
    x: i32,
    y: f64,
    tilt: f64,
    ticks_since_impulse: u32,
    impulse_velocity: f64,
    impulse_height: f64,
}

impl Bird {
    /// Spawn a bird at rest.
    #[must_use]
    pub const fn new(x: i32, y: f64) -> Self {
        Self {
            x,
            y,
            tilt: 0.0,
            ticks_since_impulse: 0,
            impulse_velocity: 0.0,
            impulse_height: y,
        }
    }

    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Cosmetic rotation in degrees; positive tilts the beak upward.
    #[must_use]
    pub const fn tilt(&self) -> f64 {
        self.tilt
    }

    #[must_use]
    pub const fn ticks_since_impulse(&self) -> u32 {
        self.ticks_since_impulse
    }

    /// Height recorded at the most recent impulse.
    #[must_use]
    pub const fn impulse_height(&self) -> f64 {
        self.impulse_height
    }

    /// Flap upward.
    pub fn impulse(&mut self, physics: &Physics) {
        self.impulse_velocity = physics.impulse_velocity;
        self.ticks_since_impulse = 0;
        self.impulse_height = self.y;
    }

    /// Integrate one tick, returning the vertical displacement that was applied.
    pub fn advance(&mut self, physics: &Physics) -> f64 {
        self.ticks_since_impulse += 1;
        let t = f64::from(self.ticks_since_impulse);

        let mut displacement = self.impulse_velocity * t + physics.gravity * (t * t);
        if displacement >= physics.terminal_velocity {
            displacement = physics.terminal_velocity;
        }
        if displacement < 0.0 {
            displacement -= physics.rise_boost;
        }
        self.y += displacement;

        if displacement < 0.0 || self.y < self.impulse_height + physics.dive_threshold {
            if self.tilt < physics.max_tilt {
                self.tilt = physics.max_tilt;
            }
        } else if self.tilt > physics.dive_tilt {
            self.tilt -= physics.tilt_velocity;
        }
        displacement
    }

    /// Screen row used when placing the sprite mask.
    #[must_use]
    pub fn pixel_y(&self) -> i32 {
        self.y.round_ties_even() as i32
    }
}
