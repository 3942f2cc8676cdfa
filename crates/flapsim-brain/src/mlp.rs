//! Fully connected feed-forward network with a single sigmoid output.
//!
//! Weights are stored flat, layer by layer and neuron by neuron, each neuron's incoming weights
//! followed by its bias. The same layout is accepted from and returned to external optimizers as a
//! genome.

use flapsim_core::{OBSERVATION_SIZE, PolicyRegistry};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{Brain, BrainError, into_policy};

/// Number of network outputs; the first (only) one is the jump signal.
const OUTPUT_SIZE: usize = 1;

/// Activation applied to hidden layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Activation {
    /// Hyperbolic tangent activation.
    #[default]
    Tanh,
    /// Logistic sigmoid activation.
    Sigmoid,
    /// Rectified linear unit (ReLU).
    Relu,
}

impl Activation {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Tanh => value.tanh(),
            Self::Sigmoid => logistic(value),
            Self::Relu => value.max(0.0),
        }
    }
}

fn logistic(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

/// Architecture of an [`MlpBrain`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MlpConfig {
    /// Sizes of hidden layers between the fixed input/output layers.
    pub hidden_layers: Vec<usize>,
    /// Activation function applied to hidden layers.
    pub activation: Activation,
    /// Random weights are drawn uniformly from `-weight_range..weight_range`.
    pub weight_range: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![6],
            activation: Activation::Tanh,
            weight_range: 1.0,
        }
    }
}

impl MlpConfig {
    /// Layer widths from input to output.
    fn architecture(&self) -> Vec<usize> {
        let mut layers = Vec::with_capacity(self.hidden_layers.len() + 2);
        layers.push(OBSERVATION_SIZE);
        layers.extend(self.hidden_layers.iter().copied());
        layers.push(OUTPUT_SIZE);
        layers
    }

    /// Number of weights (biases included) a genome for this architecture must hold.
    #[must_use]
    pub fn genome_len(&self) -> usize {
        self.architecture()
            .windows(2)
            .map(|pair| (pair[0] + 1) * pair[1])
            .sum()
    }

    fn check(&self) -> Result<(), BrainError> {
        match self.hidden_layers.iter().position(|width| *width == 0) {
            Some(index) => Err(BrainError::EmptyLayer { index }),
            None => Ok(()),
        }
    }
}

/// Feed-forward brain mapping the four observation values to one jump probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MlpBrain {
    config: MlpConfig,
    layers: Vec<usize>,
    weights: Vec<f64>,
}

impl MlpBrain {
    /// Identifier for the policy registry.
    pub const KIND: &'static str = "mlp";

    /// Construct a brain with uniformly random weights.
    pub fn random(config: MlpConfig, rng: &mut dyn RngCore) -> Result<Self, BrainError> {
        config.check()?;
        Ok(Self::random_unchecked(config, rng))
    }

    fn random_unchecked(config: MlpConfig, rng: &mut dyn RngCore) -> Self {
        let range = config.weight_range.abs().max(f64::EPSILON);
        let weights = (0..config.genome_len())
            .map(|_| rng.random_range(-range..range))
            .collect();
        Self::assemble(config, weights)
    }

    /// Construct a brain from a flat genome produced by an external optimizer.
    pub fn from_genome(config: MlpConfig, genome: &[f64]) -> Result<Self, BrainError> {
        config.check()?;
        let expected = config.genome_len();
        if genome.len() != expected {
            return Err(BrainError::GenomeLength {
                expected,
                actual: genome.len(),
            });
        }
        if let Some(index) = genome.iter().position(|weight| !weight.is_finite()) {
            return Err(BrainError::NonFiniteWeight { index });
        }
        Ok(Self::assemble(config, genome.to_vec()))
    }

    /// Register a random-weight MLP factory and return its key.
    pub fn register(registry: &mut PolicyRegistry, config: MlpConfig) -> Result<u64, BrainError> {
        config.check()?;
        let config = Arc::new(config);
        Ok(registry.register(Self::KIND, move |rng| {
            into_policy(Self::random_unchecked((*config).clone(), rng))
        }))
    }

    fn assemble(config: MlpConfig, weights: Vec<f64>) -> Self {
        Self {
            layers: config.architecture(),
            config,
            weights,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Flat copy of every weight, in genome order.
    #[must_use]
    pub fn genome(&self) -> &[f64] {
        &self.weights
    }

    fn forward(&self, inputs: &[f64]) -> Vec<f64> {
        let expected = self.layers.first().copied().unwrap_or(0);
        let mut current: Vec<f64> = (0..expected)
            .map(|index| inputs.get(index).copied().unwrap_or(0.0))
            .collect();
        let mut offset = 0;
        let depth = self.layers.len().saturating_sub(1);
        for (layer, pair) in self.layers.windows(2).enumerate() {
            let (fan_in, width) = (pair[0], pair[1]);
            let output_layer = layer + 1 == depth;
            let mut next = Vec::with_capacity(width);
            for _ in 0..width {
                let Some(neuron) = self.weights.get(offset..offset + fan_in + 1) else {
                    // Weights shorter than the architecture: nothing sensible to emit.
                    return Vec::new();
                };
                let sum: f64 = neuron[..fan_in]
                    .iter()
                    .zip(&current)
                    .map(|(weight, input)| weight * input)
                    .sum::<f64>()
                    + neuron[fan_in];
                next.push(if output_layer {
                    logistic(sum)
                } else {
                    self.config.activation.apply(sum)
                });
                offset += fan_in + 1;
            }
            current = next;
        }
        current
    }
}

impl Brain for MlpBrain {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn input_size(&self) -> usize {
        OBSERVATION_SIZE
    }

    fn tick(&mut self, inputs: &[f64]) -> Vec<f64> {
        self.forward(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flapsim_core::{Observation, Policy};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn no_hidden() -> MlpConfig {
        MlpConfig {
            hidden_layers: Vec::new(),
            ..MlpConfig::default()
        }
    }

    #[test]
    fn genome_length_counts_biases() {
        assert_eq!(no_hidden().genome_len(), 5);
        assert_eq!(MlpConfig::default().genome_len(), 5 * 6 + 7);
        let deep = MlpConfig {
            hidden_layers: vec![3, 2],
            ..MlpConfig::default()
        };
        assert_eq!(deep.genome_len(), 5 * 3 + 4 * 2 + 3);
    }

    #[test]
    fn random_brain_outputs_a_probability() {
        let mut rng = SmallRng::seed_from_u64(0xDEADBEEF);
        let mut brain = MlpBrain::random(MlpConfig::default(), &mut rng).expect("brain");
        assert_eq!(brain.genome().len(), MlpConfig::default().genome_len());
        let outputs = brain.tick(&[280.0, 480.0, 40.0, 120.0]);
        assert_eq!(outputs.len(), 1);
        assert!((0.0..=1.0).contains(&outputs[0]));
    }

    #[test]
    fn genome_weights_drive_the_output() {
        // Single neuron: sigmoid(gap_top_distance - gap_bottom_distance).
        let genome = [0.0, 0.0, 1.0, -1.0, 0.0];
        let mut brain = MlpBrain::from_genome(no_hidden(), &genome).expect("brain");
        let below = brain.tick(&[300.0, 400.0, 100.0, 60.0])[0];
        let above = brain.tick(&[220.0, 400.0, 20.0, 140.0])[0];
        assert!(below > 0.5);
        assert!(above < 0.5);
        assert!((brain.tick(&[0.0; 4])[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn hidden_layers_apply_the_configured_activation() {
        let config = MlpConfig {
            hidden_layers: vec![1],
            activation: Activation::Relu,
            weight_range: 1.0,
        };
        // Hidden neuron: relu(bird_y); output: sigmoid(hidden - 1).
        let genome = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, -1.0];
        let mut brain = MlpBrain::from_genome(config, &genome).expect("brain");
        assert!((brain.tick(&[-5.0, 0.0, 0.0, 0.0])[0] - logistic(-1.0)).abs() < 1e-12);
        assert!((brain.tick(&[3.0, 0.0, 0.0, 0.0])[0] - logistic(2.0)).abs() < 1e-12);
    }

    #[test]
    fn malformed_genomes_are_rejected() {
        assert_eq!(
            MlpBrain::from_genome(no_hidden(), &[0.0; 4]),
            Err(BrainError::GenomeLength {
                expected: 5,
                actual: 4
            })
        );
        assert_eq!(
            MlpBrain::from_genome(no_hidden(), &[0.0, f64::NAN, 0.0, 0.0, 0.0]),
            Err(BrainError::NonFiniteWeight { index: 1 })
        );
        let hollow = MlpConfig {
            hidden_layers: vec![4, 0],
            ..MlpConfig::default()
        };
        assert_eq!(
            MlpBrain::from_genome(hollow, &[]),
            Err(BrainError::EmptyLayer { index: 1 })
        );
    }

    #[test]
    fn registry_spawns_distinct_networks() {
        let mut registry = PolicyRegistry::new();
        let key = MlpBrain::register(&mut registry, MlpConfig::default()).expect("register");
        assert_eq!(registry.kind(key), Some(MlpBrain::KIND));
        let mut rng = SmallRng::seed_from_u64(42);
        let mut policies = registry.spawn_many(&mut rng, key, 2).expect("spawn");
        let observation = Observation {
            bird_y: 280.0,
            pipe_x: 480.0,
            gap_top_distance: 30.0,
            gap_bottom_distance: 130.0,
        };
        let a = policies[0].decide(&observation).expect("signal");
        let b = policies[1].decide(&observation).expect("signal");
        assert!(a.is_finite() && b.is_finite());
        assert_eq!(policies[0].kind(), MlpBrain::KIND);
    }
}
