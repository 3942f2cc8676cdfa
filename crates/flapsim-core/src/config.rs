//! Flat configuration shared by every flapsim component.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a [`FlapConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Static configuration for a flapsim run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlapConfig {
    /// Width of the playfield in pixels.
    pub window_width: u32,
    /// Height of the playfield in pixels.
    pub window_height: u32,
    /// Horizontal spawn position of every bird; fixed for the whole run.
    pub start_x: i32,
    /// Vertical spawn position of every bird.
    pub start_y: f64,
    /// Screen row of the ground line.
    pub ground_y: f64,
    /// Velocity assigned on impulse (negative is upward).
    pub impulse_velocity: f64,
    /// Quadratic gravity coefficient applied to the tick counter.
    pub gravity: f64,
    /// Maximum downward displacement per tick.
    pub terminal_velocity: f64,
    /// Extra upward displacement added while rising.
    pub rise_boost: f64,
    /// Maximum upward tilt in degrees.
    pub max_tilt: f64,
    /// Tilt decrease per tick while diving.
    pub tilt_velocity: f64,
    /// Lowest tilt reachable while diving.
    pub dive_tilt: f64,
    /// Distance below the impulse height before the bird starts to dive.
    pub dive_threshold: f64,
    /// Vertical size of the gap between the two barriers.
    pub gap_size: i32,
    /// Inclusive lower bound of the random gap top.
    pub gap_min: i32,
    /// Exclusive upper bound of the random gap top.
    pub gap_max: i32,
    /// Horizontal scroll per tick for obstacles and ground.
    pub scroll_velocity: i32,
    /// Horizontal offset where new obstacles appear.
    pub obstacle_spawn_x: i32,
    /// Leading obstacle x at or below which a finished generation may stop.
    pub exit_obstacle_x: i32,
    /// Fitness added to each living bird every tick.
    pub survival_reward: f64,
    /// Fitness added to every living bird when an obstacle is cleared.
    pub pass_reward: f64,
    /// Fitness change applied to a bird that hits an obstacle.
    pub collision_penalty: f64,
    /// Logical ticks per second; 0 runs unthrottled.
    pub tick_rate_hz: u32,
    /// Score at which a generation may stop.
    pub score_threshold: u32,
    /// Maximum number of generations the outer loop should request.
    pub max_generations: u32,
    /// Policy output above which a bird jumps.
    pub jump_threshold: f64,
    /// Optional RNG seed for reproducible obstacle streams.
    pub rng_seed: Option<u64>,
}

impl Default for FlapConfig {
    fn default() -> Self {
        Self {
            window_width: 400,
            window_height: 640,
            start_x: 184,
            start_y: 280.0,
            ground_y: 584.0,
            impulse_velocity: -8.4,
            gravity: 1.2,
            terminal_velocity: 12.0,
            rise_boost: 1.6,
            max_tilt: 25.0,
            tilt_velocity: 20.0,
            dive_tilt: -90.0,
            dive_threshold: 40.0,
            gap_size: 160,
            gap_min: 40,
            gap_max: 360,
            scroll_velocity: 4,
            obstacle_spawn_x: 480,
            exit_obstacle_x: -10,
            survival_reward: 0.1,
            pass_reward: 5.0,
            collision_penalty: -1.0,
            tick_rate_hz: 60,
            score_threshold: 100,
            max_generations: 20,
            jump_threshold: 0.5,
            rng_seed: None,
        }
    }
}

impl FlapConfig {
    /// Configuration for training runs: identical rules without the real-time limiter.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            tick_rate_hz: 0,
            ..Self::default()
        }
    }

    /// Checks every physics and reward constant, failing on the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid("window dimensions must be non-zero"));
        }
        let finite = [
            self.start_y,
            self.ground_y,
            self.impulse_velocity,
            self.gravity,
            self.terminal_velocity,
            self.rise_boost,
            self.max_tilt,
            self.tilt_velocity,
            self.dive_tilt,
            self.dive_threshold,
            self.survival_reward,
            self.pass_reward,
            self.collision_penalty,
            self.jump_threshold,
        ];
        if finite.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::Invalid(
                "physics and reward constants must be finite",
            ));
        }
        if self.ground_y <= 0.0 || self.ground_y > f64::from(self.window_height) {
            return Err(ConfigError::Invalid(
                "ground_y must lie inside the window",
            ));
        }
        if self.start_y < 0.0 || self.start_y >= self.ground_y {
            return Err(ConfigError::Invalid(
                "start_y must lie between the top of the window and the ground",
            ));
        }
        if self.gravity <= 0.0 || self.terminal_velocity <= 0.0 {
            return Err(ConfigError::Invalid(
                "gravity and terminal_velocity must be positive",
            ));
        }
        if self.impulse_velocity >= 0.0 {
            return Err(ConfigError::Invalid("impulse_velocity must be negative"));
        }
        if self.rise_boost < 0.0 || self.tilt_velocity < 0.0 || self.dive_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "rise_boost, tilt_velocity and dive_threshold must be non-negative",
            ));
        }
        if self.dive_tilt > self.max_tilt {
            return Err(ConfigError::Invalid("dive_tilt cannot exceed max_tilt"));
        }
        if self.gap_size <= 0 {
            return Err(ConfigError::Invalid("gap_size must be positive"));
        }
        if self.gap_min >= self.gap_max {
            return Err(ConfigError::Invalid("gap_min must be below gap_max"));
        }
        if self.scroll_velocity <= 0 {
            return Err(ConfigError::Invalid("scroll_velocity must be positive"));
        }
        if self.survival_reward < 0.0 || self.pass_reward < 0.0 || self.collision_penalty > 0.0 {
            return Err(ConfigError::Invalid(
                "rewards must be non-negative and the collision penalty non-positive",
            ));
        }
        Ok(())
    }

    /// Returns an RNG seeded from the configuration, drawing entropy when no seed is set.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
