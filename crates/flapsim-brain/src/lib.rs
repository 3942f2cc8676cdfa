//! Brains that steer flapsim birds, and the adapter that turns them into evaluator policies.

pub mod mlp;
pub mod scripted;

use flapsim_core::{OBSERVATION_SIZE, Observation, Policy, PolicyError};
use thiserror::Error;

pub use mlp::{Activation, MlpBrain, MlpConfig};
pub use scripted::GapChaserBrain;

/// Shared interface implemented by all bird brains.
pub trait Brain {
    /// Immutable brain identifier (useful for analytics).
    fn kind(&self) -> &'static str;

    /// Number of inputs the brain expects per tick.
    fn input_size(&self) -> usize;

    /// Evaluate brain outputs given the latest observation vector.
    fn tick(&mut self, inputs: &[f64]) -> Vec<f64>;
}

/// Errors raised while building brains.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrainError {
    #[error("genome holds {actual} weights, architecture needs {expected}")]
    GenomeLength { expected: usize, actual: usize },
    #[error("genome weight {index} is not finite")]
    NonFiniteWeight { index: usize },
    #[error("hidden layer {index} has no neurons")]
    EmptyLayer { index: usize },
}

/// Exposes a [`Brain`] as a [`Policy`], reading the first output as the jump signal.
#[derive(Debug, Clone)]
pub struct BrainPolicy<B> {
    brain: B,
}

impl<B: Brain> BrainPolicy<B> {
    #[must_use]
    pub const fn new(brain: B) -> Self {
        Self { brain }
    }

    #[must_use]
    pub const fn brain(&self) -> &B {
        &self.brain
    }

    pub fn into_inner(self) -> B {
        self.brain
    }
}

impl<B: Brain> Policy for BrainPolicy<B> {
    fn kind(&self) -> &'static str {
        self.brain.kind()
    }

    fn decide(&mut self, observation: &Observation) -> Result<f64, PolicyError> {
        let expected = self.brain.input_size();
        if expected != OBSERVATION_SIZE {
            return Err(PolicyError::InputMismatch {
                expected,
                actual: OBSERVATION_SIZE,
            });
        }
        self.brain
            .tick(&observation.to_array())
            .first()
            .copied()
            .ok_or(PolicyError::EmptyOutput)
    }
}

/// Box a brain as a dynamically dispatched policy.
#[must_use]
pub fn into_policy<B>(brain: B) -> Box<dyn Policy>
where
    B: Brain + 'static,
{
    Box::new(BrainPolicy::new(brain))
}
