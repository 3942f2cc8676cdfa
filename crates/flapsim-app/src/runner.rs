//! Multi-generation driver: spawns fresh controllers from a registry and evaluates them in turn.

use flapsim_core::{
    EvalError, Evaluator, FitnessReport, FrameObserver, Generation, InterruptFlag, Policy,
    PolicyRegistry, Termination,
};
use ordered_float::OrderedFloat;
use rand::{SeedableRng, rngs::SmallRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by the generation runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no controller factory registered under key {0}")]
    UnknownFactory(u64),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum StopReason {
    /// A generation met the score threshold.
    ScoreReached,
    /// Every allotted generation ran.
    GenerationsExhausted,
    Interrupted,
}

/// Per-generation line of the run report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationSummary {
    pub generation: Generation,
    pub seed: u64,
    pub score: u32,
    pub ticks: u64,
    pub termination: Termination,
    pub best_controller: Option<usize>,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub survivors: usize,
}

impl GenerationSummary {
    fn from_report(report: &FitnessReport) -> Self {
        let best = report.best();
        Self {
            generation: report.generation,
            seed: report.seed,
            score: report.score,
            ticks: report.ticks,
            termination: report.termination,
            best_controller: best.map(|entry| entry.controller.0),
            best_fitness: best.map_or(0.0, |entry| entry.fitness),
            mean_fitness: report.mean_fitness().unwrap_or(0.0),
            survivors: report.survivors(),
        }
    }
}

/// Everything a run produced, ready to be written out as JSON.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunSummary {
    pub controller_kind: String,
    pub population: usize,
    pub stop: StopReason,
    pub generations: Vec<GenerationSummary>,
}

impl RunSummary {
    /// Generation with the highest best fitness.
    #[must_use]
    pub fn best_generation(&self) -> Option<&GenerationSummary> {
        self.generations
            .iter()
            .rev()
            .max_by_key(|summary| OrderedFloat(summary.best_fitness))
    }
}

/// Runs up to `max_generations` generations of `population` controllers spawned from one factory.
pub struct GenerationRunner {
    evaluator: Evaluator,
    registry: PolicyRegistry,
    factory: u64,
    population: usize,
    max_generations: u32,
    rng: SmallRng,
}

impl std::fmt::Debug for GenerationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRunner")
            .field("evaluator", &self.evaluator)
            .field("factory", &self.factory)
            .field("population", &self.population)
            .field("max_generations", &self.max_generations)
            .finish_non_exhaustive()
    }
}

impl GenerationRunner {
    pub fn new(
        evaluator: Evaluator,
        registry: PolicyRegistry,
        factory: u64,
        population: usize,
    ) -> Result<Self, RunError> {
        if !registry.contains(factory) {
            return Err(RunError::UnknownFactory(factory));
        }
        let config = evaluator.config();
        let max_generations = config.max_generations;
        let rng = SmallRng::seed_from_u64(config.rng_seed.unwrap_or(0xF1A9_5EED_0000_0001_u64));
        Ok(Self {
            evaluator,
            registry,
            factory,
            population,
            max_generations,
            rng,
        })
    }

    /// Handle that stops the run at the next tick boundary.
    #[must_use]
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.evaluator.interrupt_flag()
    }

    pub fn run(&mut self, observer: &mut dyn FrameObserver) -> Result<RunSummary, RunError> {
        let kind = self.registry.kind(self.factory).unwrap_or_default().to_string();
        let mut generations = Vec::with_capacity(self.max_generations as usize);
        let mut stop = StopReason::GenerationsExhausted;

        for _ in 0..self.max_generations {
            let mut policies: Vec<Box<dyn Policy>> = self
                .registry
                .spawn_many(&mut self.rng, self.factory, self.population)
                .ok_or(RunError::UnknownFactory(self.factory))?;
            let report = self.evaluator.evaluate(&mut policies, observer)?;
            let summary = GenerationSummary::from_report(&report);
            info!(
                generation = summary.generation.0,
                score = summary.score,
                best = summary.best_fitness,
                mean = summary.mean_fitness,
                survivors = summary.survivors,
                "generation summary"
            );
            generations.push(summary);

            match report.termination {
                Termination::ScoreReached => {
                    stop = StopReason::ScoreReached;
                    break;
                }
                Termination::Interrupted => {
                    warn!(generation = report.generation.0, "run interrupted");
                    stop = StopReason::Interrupted;
                    break;
                }
                Termination::Extinct => {}
            }
        }

        Ok(RunSummary {
            controller_kind: kind,
            population: self.population,
            stop,
            generations,
        })
    }
}
