//! Decision-policy seam between the simulation and external controllers.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

/// Number of values in an [`Observation`].
pub const OBSERVATION_SIZE: usize = 4;

/// What a bird sees each tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Current vertical position of the bird.
    pub bird_y: f64,
    /// Left edge of the pipe the bird is heading for.
    pub pipe_x: f64,
    /// Distance from the bird to the gap top.
    pub gap_top_distance: f64,
    /// Distance from the bird to the gap bottom.
    pub gap_bottom_distance: f64,
}

impl Observation {
    #[must_use]
    pub const fn to_array(&self) -> [f64; OBSERVATION_SIZE] {
        [
            self.bird_y,
            self.pipe_x,
            self.gap_top_distance,
            self.gap_bottom_distance,
        ]
    }

    /// Whether the bird sits below the middle of the gap.
    #[must_use]
    pub fn below_gap_center(&self) -> bool {
        self.gap_top_distance > self.gap_bottom_distance
    }
}

/// Failure reported by a controller while deciding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyError {
    #[error("controller produced no outputs")]
    EmptyOutput,
    #[error("controller expects {expected} inputs, observation has {actual}")]
    InputMismatch { expected: usize, actual: usize },
    #[error("controller failed: {0}")]
    Failed(String),
}

/// Maps an observation to a jump signal; values above the configured threshold flap.
pub trait Policy {
    /// Static identifier of the controller implementation.
    fn kind(&self) -> &'static str;

    /// Evaluate the jump signal for one bird. Must not depend on anything but the controller's own
    /// state and `observation`.
    fn decide(&mut self, observation: &Observation) -> Result<f64, PolicyError>;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn decide(&mut self, observation: &Observation) -> Result<f64, PolicyError> {
        (**self).decide(observation)
    }
}

impl<P: Policy + ?Sized> Policy for &mut P {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn decide(&mut self, observation: &Observation) -> Result<f64, PolicyError> {
        (**self).decide(observation)
    }
}

/// Adapter turning a closure into a [`Policy`].
pub struct FnPolicy<F> {
    kind: &'static str,
    decide: F,
}

impl<F> std::fmt::Debug for FnPolicy<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPolicy").field("kind", &self.kind).finish()
    }
}

impl<F> FnPolicy<F>
where
    F: FnMut(&Observation) -> f64,
{
    #[must_use]
    pub const fn new(kind: &'static str, decide: F) -> Self {
        Self { kind, decide }
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: FnMut(&Observation) -> f64,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn decide(&mut self, observation: &Observation) -> Result<f64, PolicyError> {
        Ok((self.decide)(observation))
    }
}

type PolicySpawner = Box<dyn Fn(&mut dyn RngCore) -> Box<dyn Policy>>;

struct PolicyEntry {
    kind: Cow<'static, str>,
    spawner: PolicySpawner,
}

/// Registry of controller factories keyed by opaque handles.
#[derive(Default)]
pub struct PolicyRegistry {
    next_key: u64,
    entries: HashMap<u64, PolicyEntry>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("next_key", &self.next_key)
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new controller factory, returning its registry key.
    pub fn register<F>(&mut self, kind: impl Into<Cow<'static, str>>, factory: F) -> u64
    where
        F: Fn(&mut dyn RngCore) -> Box<dyn Policy> + 'static,
    {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(
            key,
            PolicyEntry {
                kind: kind.into(),
                spawner: Box::new(factory),
            },
        );
        key
    }

    /// Instantiate a fresh controller from the factory referenced by `key`.
    pub fn spawn(&self, rng: &mut dyn RngCore, key: u64) -> Option<Box<dyn Policy>> {
        self.entries.get(&key).map(|entry| (entry.spawner)(rng))
    }

    /// Instantiate `count` controllers from `key`.
    pub fn spawn_many(
        &self,
        rng: &mut dyn RngCore,
        key: u64,
        count: usize,
    ) -> Option<Vec<Box<dyn Policy>>> {
        let entry = self.entries.get(&key)?;
        Some((0..count).map(|_| (entry.spawner)(rng)).collect())
    }

    /// Retrieve the descriptive identifier associated with a registry entry.
    #[must_use]
    pub fn kind(&self, key: u64) -> Option<&str> {
        self.entries.get(&key).map(|entry| entry.kind.as_ref())
    }

    /// Returns whether a key is registered.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    fn observation(bird_y: f64, gap_top: f64, gap_bottom: f64) -> Observation {
        Observation {
            bird_y,
            pipe_x: 300.0,
            gap_top_distance: (bird_y - gap_top).abs(),
            gap_bottom_distance: (bird_y - gap_bottom).abs(),
        }
    }

    #[test]
    fn gap_center_comparison_uses_distances() {
        assert!(observation(300.0, 200.0, 360.0).below_gap_center());
        assert!(!observation(260.0, 200.0, 360.0).below_gap_center());
        assert!(!observation(100.0, 200.0, 360.0).below_gap_center());
        assert!(observation(500.0, 200.0, 360.0).below_gap_center());
    }

    #[test]
    fn closures_and_boxes_act_as_policies() {
        let mut calls = 0;
        {
            let mut policy = FnPolicy::new("counter", |obs: &Observation| {
                calls += 1;
                obs.bird_y
            });
            assert_eq!(policy.kind(), "counter");
            let obs = observation(12.0, 0.0, 0.0);
            assert_eq!(policy.decide(&obs), Ok(12.0));
            let by_ref: &mut dyn Policy = &mut policy;
            assert_eq!(by_ref.decide(&obs), Ok(12.0));
        }
        assert_eq!(calls, 2);

        let mut boxed: Box<dyn Policy> = Box::new(FnPolicy::new("one", |_: &Observation| 1.0));
        assert_eq!(boxed.kind(), "one");
        assert_eq!(boxed.decide(&observation(0.0, 0.0, 0.0)), Ok(1.0));
    }

    #[test]
    fn registry_spawns_from_factories() {
        let mut registry = PolicyRegistry::new();
        let key = registry.register("random-threshold", |rng| {
            let bias: f64 = rng.random_range(0.0..1.0);
            Box::new(FnPolicy::new("random-threshold", move |_: &Observation| bias))
        });
        assert!(registry.contains(key));
        assert_eq!(registry.kind(key), Some("random-threshold"));

        let mut rng = SmallRng::seed_from_u64(3);
        let policies = registry.spawn_many(&mut rng, key, 5).expect("spawned");
        assert_eq!(policies.len(), 5);
        assert!(registry.spawn(&mut rng, key + 1).is_none());
        assert!(!registry.contains(key + 1));
        assert!(registry.spawn_many(&mut rng, key + 1, 1).is_none());
    }
}
