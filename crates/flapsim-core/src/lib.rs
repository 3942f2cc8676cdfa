//! Core simulation for flapsim: bird physics, the scrolling pipe stream, pixel-mask collisions and
//! the generation loop that scores a set of decision policies.

pub mod agent;
pub mod config;
pub mod evaluation;
pub mod flock;
pub mod mask;
pub mod obstacle;
pub mod policy;
pub mod population;

use serde::{Deserialize, Serialize};

pub use agent::{Bird, Physics};
pub use config::{ConfigError, FlapConfig};
pub use evaluation::{
    EvalError, Evaluator, FitnessEntry, FitnessReport, Frame, FrameObserver, InterruptFlag,
    NullObserver, Termination,
};
pub use flock::{AgentId, ControllerId, Flock, Member};
pub use mask::{BitMask, MaskError, SpriteSet, collides};
pub use obstacle::{Ground, Pipe, PipeSpec};
pub use policy::{FnPolicy, OBSERVATION_SIZE, Observation, Policy, PolicyError, PolicyRegistry};
pub use population::{DeathCause, Population, Retired, Rewards, TickReport};

/// Simulation clock within one generation (ticks processed since it started).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Index of an evaluated generation; the first one is zero.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
