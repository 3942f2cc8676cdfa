//! Generation runner: builds a population per controller set and drives it to completion.

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::Bird;
use crate::config::ConfigError;
use crate::flock::{ControllerId, Member};
use crate::mask::SpriteSet;
use crate::obstacle::{Ground, Pipe};
use crate::policy::{Policy, PolicyError};
use crate::population::{DeathCause, Population, TickReport};
use crate::{FlapConfig, Generation, Tick};

/// Errors that abort a generation.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("controller {} failed", .controller.0)]
    Policy {
        controller: ControllerId,
        source: PolicyError,
    },
    #[error("no policy supplied for {0:?}")]
    UnknownController(ControllerId),
}

/// Cooperative cancellation shared between the evaluator and whoever wants to stop it.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running generation stop before its next tick.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a generation ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Every bird died (or there were none to begin with).
    Extinct,
    /// The score threshold was met and the leading pipe scrolled out.
    ScoreReached,
    /// The interrupt flag was raised.
    Interrupted,
}

/// Final fitness of one controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FitnessEntry {
    pub controller: ControllerId,
    pub fitness: f64,
    pub ticks_alive: u64,
    /// `None` while the bird was still flying when the generation ended.
    pub cause: Option<DeathCause>,
    /// Tick at which the bird died.
    pub died_at: Option<Tick>,
}

impl FitnessEntry {
    #[must_use]
    pub const fn survived(&self) -> bool {
        self.cause.is_none()
    }
}

/// Outcome of one generation, one entry per controller in controller order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessReport {
    pub generation: Generation,
    /// Seed of the pipe stream used for this generation.
    pub seed: u64,
    pub score: u32,
    pub ticks: u64,
    pub termination: Termination,
    pub entries: Vec<FitnessEntry>,
}

impl FitnessReport {
    fn empty(generation: Generation, seed: u64) -> Self {
        Self {
            generation,
            seed,
            score: 0,
            ticks: 0,
            termination: Termination::Extinct,
            entries: Vec::new(),
        }
    }

    /// Fitness earned by `controller`, if it took part.
    #[must_use]
    pub fn fitness(&self, controller: ControllerId) -> Option<f64> {
        self.entries.get(controller.0).map(|entry| entry.fitness)
    }

    /// Copy every fitness into the caller's slots, indexed by controller. Returns how many slots
    /// were written.
    pub fn write_into(&self, slots: &mut [f64]) -> usize {
        let mut written = 0;
        for (slot, entry) in slots.iter_mut().zip(&self.entries) {
            *slot = entry.fitness;
            written += 1;
        }
        written
    }

    /// Entry with the highest fitness; the lowest controller id wins ties.
    #[must_use]
    pub fn best(&self) -> Option<&FitnessEntry> {
        self.entries
            .iter()
            .rev()
            .max_by_key(|entry| OrderedFloat(entry.fitness))
    }

    #[must_use]
    pub fn mean_fitness(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self.entries.iter().map(|entry| entry.fitness).sum();
        Some(total / self.entries.len() as f64)
    }

    /// Number of controllers whose bird was still alive at the end.
    #[must_use]
    pub fn survivors(&self) -> usize {
        self.entries.iter().filter(|entry| entry.survived()).count()
    }
}

/// Read-only view of the world handed to renderers after every tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub generation: Generation,
    pub tick: Tick,
    pub score: u32,
    /// Index into `pipes` of the pipe the birds are steering for.
    pub target: usize,
    pub members: &'a [Member],
    pub pipes: &'a [Pipe],
    pub ground: &'a Ground,
    pub sprites: &'a SpriteSet,
    pub events: TickReport,
}

impl Frame<'_> {
    #[must_use]
    pub fn alive(&self) -> usize {
        self.members.len()
    }

    pub fn birds(&self) -> impl Iterator<Item = &Bird> + '_ {
        self.members.iter().map(|member| &member.bird)
    }

    #[must_use]
    pub fn target_pipe(&self) -> Option<&Pipe> {
        self.pipes.get(self.target)
    }
}

/// Hook invoked after every processed tick.
pub trait FrameObserver {
    fn on_frame(&mut self, frame: &Frame<'_>);
}

/// Observer that ignores every frame.
#[derive(Debug, Default)]
pub struct NullObserver;

impl FrameObserver for NullObserver {
    fn on_frame(&mut self, _frame: &Frame<'_>) {}
}

/// Sleeps between ticks to hold a fixed rate; a zero rate never sleeps.
#[derive(Debug)]
struct Pacer {
    period: Option<Duration>,
    next: Instant,
}

impl Pacer {
    fn new(rate_hz: u32) -> Self {
        Self {
            period: (rate_hz > 0).then(|| Duration::from_secs(1) / rate_hz),
            next: Instant::now(),
        }
    }

    fn wait(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
            self.next += period;
        } else {
            // Fell behind; restart the schedule instead of bursting.
            self.next = now + period;
        }
    }
}

/// Owns configuration, sprites and the generation counter across repeated evaluations.
pub struct Evaluator {
    config: FlapConfig,
    sprites: Arc<SpriteSet>,
    rng: SmallRng,
    next_generation: Generation,
    interrupt: InterruptFlag,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("next_generation", &self.next_generation)
            .field("interrupted", &self.interrupt.is_raised())
            .finish()
    }
}

impl Evaluator {
    /// Build an evaluator with the procedural sprite silhouettes.
    pub fn new(config: FlapConfig) -> Result<Self, ConfigError> {
        Self::with_sprites(config, SpriteSet::procedural())
    }

    /// Build an evaluator with caller-supplied silhouettes.
    pub fn with_sprites(config: FlapConfig, sprites: SpriteSet) -> Result<Self, ConfigError> {
        config.validate()?;
        if sprites.bird.width() == 0 || sprites.bird_height() == 0 || sprites.pipe_width() == 0 {
            return Err(ConfigError::Invalid("sprite masks must be non-empty"));
        }
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            sprites: Arc::new(sprites),
            rng,
            next_generation: Generation::zero(),
            interrupt: InterruptFlag::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &FlapConfig {
        &self.config
    }

    #[must_use]
    pub fn sprites(&self) -> &SpriteSet {
        &self.sprites
    }

    /// Generation number the next call to [`Evaluator::evaluate`] will use.
    #[must_use]
    pub const fn next_generation(&self) -> Generation {
        self.next_generation
    }

    /// Handle that stops the running generation when raised.
    #[must_use]
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Run one generation with one bird per policy and report every controller's fitness.
    ///
    /// The generation counter advances even for an empty controller set, which reports no entries
    /// and zero ticks. A failing policy aborts the generation.
    pub fn evaluate<P: Policy>(
        &mut self,
        policies: &mut [P],
        observer: &mut dyn FrameObserver,
    ) -> Result<FitnessReport, EvalError> {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        let seed: u64 = self.rng.random();
        debug!(
            generation = generation.0,
            controllers = policies.len(),
            seed,
            "generation started"
        );
        if policies.is_empty() {
            return Ok(FitnessReport::empty(generation, seed));
        }

        let mut population = Population::new(
            &self.config,
            Arc::clone(&self.sprites),
            policies.len(),
            SmallRng::seed_from_u64(seed),
        );
        let mut pacer = Pacer::new(self.config.tick_rate_hz);
        let termination = loop {
            if self.interrupt.is_raised() {
                break Termination::Interrupted;
            }
            pacer.wait();
            let Some(events) = population.step(policies)? else {
                break Termination::Extinct;
            };
            observer.on_frame(&Frame {
                generation,
                tick: events.tick,
                score: population.score(),
                target: events.target,
                members: population.members(),
                pipes: population.pipes(),
                ground: population.ground(),
                sprites: population.sprites(),
                events,
            });
            if population.is_extinct() {
                break Termination::Extinct;
            }
            if self.finished(&population) {
                break Termination::ScoreReached;
            }
        };

        let report = collect_report(&population, policies.len(), generation, seed, termination);
        info!(
            generation = generation.0,
            score = report.score,
            ticks = report.ticks,
            ?termination,
            best = report.best().map_or(0.0, |entry| entry.fitness),
            survivors = report.survivors(),
            "generation finished"
        );
        Ok(report)
    }

    fn finished(&self, population: &Population) -> bool {
        population.score() >= self.config.score_threshold
            && population
                .pipes()
                .first()
                .is_some_and(|pipe| pipe.x() <= self.config.exit_obstacle_x)
    }
}

fn collect_report(
    population: &Population,
    controllers: usize,
    generation: Generation,
    seed: u64,
    termination: Termination,
) -> FitnessReport {
    let mut entries: Vec<FitnessEntry> = (0..controllers)
        .map(|index| FitnessEntry {
            controller: ControllerId(index),
            fitness: 0.0,
            ticks_alive: 0,
            cause: None,
            died_at: None,
        })
        .collect();
    for retired in population.retired() {
        if let Some(entry) = entries.get_mut(retired.controller.0) {
            entry.fitness = retired.fitness;
            entry.ticks_alive = retired.ticks_alive;
            entry.cause = Some(retired.cause);
            entry.died_at = Some(retired.tick);
        }
    }
    for member in population.members() {
        if let Some(entry) = entries.get_mut(member.controller.0) {
            entry.fitness = member.fitness;
            entry.ticks_alive = member.ticks_alive;
        }
    }
    FitnessReport {
        generation,
        seed,
        score: population.score(),
        ticks: population.tick().0,
        termination,
        entries,
    }
}
