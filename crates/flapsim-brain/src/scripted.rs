//! Hand-written controllers, handy as baselines and in tests.

use flapsim_core::{OBSERVATION_SIZE, PolicyRegistry};
use serde::{Deserialize, Serialize};

use crate::{Brain, into_policy};

/// Flaps whenever the bird sits lower than the middle of the target gap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GapChaserBrain {
    /// Extra distance below the gap middle tolerated before flapping.
    pub slack: f64,
}

impl GapChaserBrain {
    pub const KIND: &'static str = "gap-chaser";

    #[must_use]
    pub const fn new(slack: f64) -> Self {
        Self { slack }
    }

    /// Register a factory producing chasers with the given slack.
    pub fn register(registry: &mut PolicyRegistry, slack: f64) -> u64 {
        registry.register(Self::KIND, move |_rng| into_policy(Self::new(slack)))
    }
}

impl Brain for GapChaserBrain {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn input_size(&self) -> usize {
        OBSERVATION_SIZE
    }

    fn tick(&mut self, inputs: &[f64]) -> Vec<f64> {
        let (Some(top), Some(bottom)) = (inputs.get(2), inputs.get(3)) else {
            return Vec::new();
        };
        let flap = *top > *bottom + self.slack;
        vec![if flap { 1.0 } else { 0.0 }]
    }
}
