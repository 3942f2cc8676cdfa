//! Live birds, the pipe stream and the fixed-order tick that ties them together.

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

use crate::agent::{Bird, Physics};
use crate::flock::{AgentId, ControllerId, Flock, Member};
use crate::mask::{SpriteSet, collides};
use crate::obstacle::{Ground, Pipe, PipeSpec};
use crate::policy::{Observation, Policy};
use crate::{EvalError, FlapConfig, Tick};

/// Why a bird left the flock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeathCause {
    /// Touched a barrier.
    Collision,
    /// Sprite reached the ground line.
    Ground,
    /// Flew above the top of the playfield.
    Ceiling,
}

/// Final record of a bird removed from the flock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Retired {
    pub controller: ControllerId,
    pub fitness: f64,
    pub ticks_alive: u64,
    pub cause: DeathCause,
    pub tick: Tick,
}

/// Fitness adjustments applied by the tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rewards {
    pub survival: f64,
    pub pass: f64,
    pub collision: f64,
}

impl Rewards {
    #[must_use]
    pub const fn from_config(config: &FlapConfig) -> Self {
        Self {
            survival: config.survival_reward,
            pass: config.pass_reward,
            collision: config.collision_penalty,
        }
    }
}

/// Summary of one processed tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: Tick,
    /// Index of the pipe the birds observed, relative to the pipes left after the tick.
    pub target: usize,
    /// Whether a pipe was cleared (and a new one spawned).
    pub cleared: bool,
    pub collisions: usize,
    pub out_of_bounds: usize,
    pub alive: usize,
}

/// Everything that lives for exactly one generation.
pub struct Population {
    physics: Physics,
    pipe_spec: PipeSpec,
    rewards: Rewards,
    jump_threshold: f64,
    ground_line: f64,
    spawn_x: i32,
    sprites: Arc<SpriteSet>,
    rng: SmallRng,
    flock: Flock,
    pipes: Vec<Pipe>,
    ground: Ground,
    score: u32,
    tick: Tick,
    target: usize,
    pending_deaths: Vec<(AgentId, DeathCause)>,
    retired: Vec<Retired>,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("tick", &self.tick)
            .field("score", &self.score)
            .field("alive", &self.flock.len())
            .field("retired", &self.retired.len())
            .field("pipes", &self.pipes.len())
            .finish()
    }
}

impl Population {
    /// Spawn one bird per controller at the configured start position, plus the first pipe.
    pub fn new(
        config: &FlapConfig,
        sprites: Arc<SpriteSet>,
        controllers: usize,
        mut rng: SmallRng,
    ) -> Self {
        let pipe_spec = PipeSpec::new(config, &sprites);
        let mut flock = Flock::with_capacity(controllers);
        for index in 0..controllers {
            let bird = Bird::new(config.start_x, config.start_y);
            flock.insert(Member::new(bird, ControllerId(index)));
        }
        let first = Pipe::spawn(config.obstacle_spawn_x, &pipe_spec, &mut rng);
        Self {
            physics: Physics::from_config(config),
            pipe_spec,
            rewards: Rewards::from_config(config),
            jump_threshold: config.jump_threshold,
            ground_line: config.ground_y,
            spawn_x: config.obstacle_spawn_x,
            sprites,
            rng,
            flock,
            pipes: vec![first],
            ground: Ground::new(config.ground_y as i32, config.scroll_velocity),
            score: 0,
            tick: Tick::zero(),
            target: 0,
            pending_deaths: Vec::new(),
            retired: Vec::with_capacity(controllers),
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns `Ok(None)` without touching any state when no birds remain. The stages run in a
    /// fixed order: physics and decisions, ground, collisions and passes, rewards and spawning,
    /// pipe cleanup, bounds.
    pub fn step<P: Policy>(
        &mut self,
        policies: &mut [P],
    ) -> Result<Option<TickReport>, EvalError> {
        let Some(leader_x) = self.flock.members().first().map(|m| m.bird.x()) else {
            return Ok(None);
        };
        if self.pipes.is_empty() {
            let pipe = Pipe::spawn(self.spawn_x, &self.pipe_spec, &mut self.rng);
            self.pipes.push(pipe);
        }
        self.target = self.target_index(leader_x);
        let next_tick = self.tick.next();

        self.stage_decide(policies)?;
        self.ground.advance();
        let (cleared, expired) = self.stage_pipes();
        let collisions = self.stage_death_cleanup(next_tick);
        if cleared {
            self.stage_clear_reward();
        }
        let shift = expired.iter().take(self.target).filter(|gone| **gone).count();
        let mut expired = expired.into_iter();
        self.pipes.retain(|_| !expired.next().unwrap_or(false));
        self.target -= shift;
        self.stage_bounds();
        let out_of_bounds = self.stage_death_cleanup(next_tick);

        self.tick = next_tick;
        Ok(Some(TickReport {
            tick: next_tick,
            target: self.target,
            cleared,
            collisions,
            out_of_bounds,
            alive: self.flock.len(),
        }))
    }

    fn target_index(&self, leader_x: i32) -> usize {
        match self.pipes.first() {
            Some(first) if self.pipes.len() > 1 && leader_x > first.right() => 1,
            _ => 0,
        }
    }

    fn stage_decide<P: Policy>(&mut self, policies: &mut [P]) -> Result<(), EvalError> {
        let target = self.pipes[self.target];
        let physics = self.physics;
        for member in self.flock.members_mut() {
            member.bird.advance(&physics);
            member.fitness += self.rewards.survival;
            member.ticks_alive += 1;

            let observation = observe(&member.bird, &target);
            let controller = member.controller;
            let policy = policies
                .get_mut(controller.0)
                .ok_or(EvalError::UnknownController(controller))?;
            let signal = policy
                .decide(&observation)
                .map_err(|source| EvalError::Policy { controller, source })?;
            if signal > self.jump_threshold {
                member.bird.impulse(&physics);
            }
        }
        Ok(())
    }

    /// Collision and pass checks for every pipe, followed by its scroll. Returns whether any pipe
    /// was passed for the first time and which pipes were already off screen before moving.
    fn stage_pipes(&mut self) -> (bool, Vec<bool>) {
        let mut cleared = false;
        let mut expired = Vec::with_capacity(self.pipes.len());
        let mut doomed: HashSet<AgentId> = HashSet::new();
        for pipe in &mut self.pipes {
            for (id, member) in self.flock.iter_mut() {
                if doomed.contains(&id) {
                    continue;
                }
                if collides(&member.bird, pipe, &self.sprites) {
                    member.fitness += self.rewards.collision;
                    doomed.insert(id);
                    self.pending_deaths.push((id, DeathCause::Collision));
                }
                // Passing counts even for a bird that just crashed into this pipe.
                if !pipe.passed() && pipe.x() < member.bird.x() {
                    pipe.mark_passed();
                    cleared = true;
                }
            }
            expired.push(pipe.is_off_screen());
            pipe.advance();
        }
        (cleared, expired)
    }

    fn stage_clear_reward(&mut self) {
        self.score += 1;
        for member in self.flock.members_mut() {
            member.fitness += self.rewards.pass;
        }
        let pipe = Pipe::spawn(self.spawn_x, &self.pipe_spec, &mut self.rng);
        trace!(
            score = self.score,
            gap_top = pipe.gap_top(),
            "pipe cleared, spawned replacement"
        );
        self.pipes.push(pipe);
    }

    fn stage_bounds(&mut self) {
        let bird_height = f64::from(self.sprites.bird_height());
        for (id, member) in self.flock.iter() {
            let y = member.bird.y();
            if y + bird_height >= self.ground_line {
                self.pending_deaths.push((id, DeathCause::Ground));
            } else if y < 0.0 {
                self.pending_deaths.push((id, DeathCause::Ceiling));
            }
        }
    }

    /// Remove every bird queued in `pending_deaths`, moving its record to the retired ledger.
    fn stage_death_cleanup(&mut self, tick: Tick) -> usize {
        if self.pending_deaths.is_empty() {
            return 0;
        }
        let dead: HashMap<AgentId, DeathCause> = self.pending_deaths.drain(..).collect();
        let removed = self.flock.remove_many(|id| dead.contains_key(&id));
        for (id, member) in &removed {
            let cause = dead.get(id).copied().unwrap_or(DeathCause::Collision);
            trace!(
                controller = member.controller.0,
                fitness = member.fitness,
                ?cause,
                "bird retired"
            );
            self.retired.push(Retired {
                controller: member.controller,
                fitness: member.fitness,
                ticks_alive: member.ticks_alive,
                cause,
                tick,
            });
        }
        removed.len()
    }

    /// Live members in spawn order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        self.flock.members()
    }

    #[must_use]
    pub fn flock(&self) -> &Flock {
        &self.flock
    }

    #[must_use]
    pub fn alive(&self) -> usize {
        self.flock.len()
    }

    #[must_use]
    pub fn is_extinct(&self) -> bool {
        self.flock.is_empty()
    }

    /// Live pipes, leftmost first.
    #[must_use]
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    #[must_use]
    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    /// Pipes cleared so far.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Index into [`Population::pipes`] of the pipe observed during the most recent tick.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Birds removed so far, in order of death.
    #[must_use]
    pub fn retired(&self) -> &[Retired] {
        &self.retired
    }

    #[must_use]
    pub fn sprites(&self) -> &SpriteSet {
        &self.sprites
    }
}

fn observe(bird: &Bird, pipe: &Pipe) -> Observation {
    let y = bird.y();
    Observation {
        bird_y: y,
        pipe_x: f64::from(pipe.x()),
        gap_top_distance: (y - f64::from(pipe.gap_top())).abs(),
        gap_bottom_distance: (y - f64::from(pipe.gap_bottom())).abs(),
    }
}
