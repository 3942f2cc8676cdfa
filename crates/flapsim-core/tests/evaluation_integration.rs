use flapsim_core::{
    ControllerId, DeathCause, EvalError, Evaluator, FlapConfig, FnPolicy, Frame, FrameObserver,
    Generation, InterruptFlag, NullObserver, Observation, Policy, PolicyError, Termination, Tick,
};
use std::time::Instant;

fn never(_: &Observation) -> f64 {
    0.0
}

fn chase_gap(obs: &Observation) -> f64 {
    if obs.below_gap_center() { 1.0 } else { 0.0 }
}

fn seeded(seed: u64) -> FlapConfig {
    FlapConfig {
        rng_seed: Some(seed),
        ..FlapConfig::headless()
    }
}

fn chase_config(seed: u64) -> FlapConfig {
    FlapConfig {
        score_threshold: 10,
        ..seeded(seed)
    }
}

#[derive(Default)]
struct Recorder {
    fitness: Vec<f64>,
    alive: Vec<usize>,
    targets: Vec<usize>,
    ground_offsets: Vec<(i32, i32)>,
}

impl FrameObserver for Recorder {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        if let Some(member) = frame.members.first() {
            self.fitness.push(member.fitness);
        }
        self.alive.push(frame.alive());
        self.targets.push(frame.target);
        self.ground_offsets.push(frame.ground.offsets());
        assert!(frame.target_pipe().is_some());
        assert_eq!(frame.events.alive, frame.alive());
    }
}

#[test]
fn passive_bird_falls_to_the_ground() {
    let mut evaluator = Evaluator::new(seeded(11)).expect("evaluator");
    let mut policies = vec![FnPolicy::new("never", never as fn(&Observation) -> f64)];
    let mut recorder = Recorder::default();

    let report = evaluator
        .evaluate(&mut policies, &mut recorder)
        .expect("generation");

    assert_eq!(report.generation, Generation(0));
    assert_eq!(report.termination, Termination::Extinct);
    assert_eq!(report.ticks, 23);
    assert_eq!(report.score, 0);
    let entry = report.entries[0];
    assert_eq!(entry.cause, Some(DeathCause::Ground));
    assert_eq!(entry.died_at, Some(Tick(23)));
    assert_eq!(entry.ticks_alive, 23);
    assert!((entry.fitness - 0.1 * 23.0).abs() < 1e-9);
    assert_eq!(recorder.alive.last(), Some(&0));
    assert!(recorder.targets.iter().all(|target| *target == 0));
    assert_eq!(recorder.ground_offsets[0], (-4, 668));
}

#[test]
fn gap_chaser_clears_ten_pipes() {
    let mut evaluator = Evaluator::new(chase_config(2024)).expect("evaluator");
    let mut policies = vec![FnPolicy::new("chaser", chase_gap as fn(&Observation) -> f64)];
    let mut recorder = Recorder::default();

    let report = evaluator
        .evaluate(&mut policies, &mut recorder)
        .expect("generation");

    assert_eq!(report.termination, Termination::ScoreReached);
    assert!(report.score >= 10);
    let entry = report.entries[0];
    assert!(entry.survived());
    assert!(entry.fitness >= 10.0 * 5.0 + 0.1 * report.ticks as f64 - 1e-6);
    assert!(
        recorder.fitness.windows(2).all(|pair| pair[1] > pair[0]),
        "fitness must grow every tick"
    );
    assert!(recorder.targets.contains(&1));
}

#[test]
fn passive_and_active_birds_share_a_generation() {
    let mut evaluator = Evaluator::new(chase_config(7)).expect("evaluator");
    let mut policies: Vec<Box<dyn Policy>> = vec![
        Box::new(FnPolicy::new("never", never)),
        Box::new(FnPolicy::new("chaser", chase_gap)),
        Box::new(FnPolicy::new("never", never)),
    ];

    let report = evaluator
        .evaluate(&mut policies, &mut NullObserver)
        .expect("generation");

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.survivors(), 1);
    assert_eq!(
        report.best().map(|entry| entry.controller),
        Some(ControllerId(1))
    );
    for passive in [0, 2] {
        let fitness = report.fitness(ControllerId(passive)).expect("fitness");
        assert!((fitness - 2.3).abs() < 1e-9);
    }
    let mut slots = [0.0; 3];
    assert_eq!(report.write_into(&mut slots), 3);
    assert_eq!(slots[1], report.entries[1].fitness);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let mut evaluator = Evaluator::new(seeded(99)).expect("evaluator");
        let mut reports = Vec::new();
        for _ in 0..2 {
            let mut policies: Vec<_> = (0..6)
                .map(|offset| {
                    let bias = offset as f64 * 10.0;
                    FnPolicy::new("offset", move |obs: &Observation| {
                        if obs.gap_top_distance > obs.gap_bottom_distance + bias {
                            1.0
                        } else {
                            0.0
                        }
                    })
                })
                .collect();
            reports.push(
                evaluator
                    .evaluate(&mut policies, &mut NullObserver)
                    .expect("generation"),
            );
        }
        reports
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first[0].generation, Generation(0));
    assert_eq!(first[1].generation, Generation(1));
    assert_ne!(first[0].seed, first[1].seed);
}

#[test]
fn empty_controller_set_still_counts_a_generation() {
    let mut evaluator = Evaluator::new(seeded(1)).expect("evaluator");
    let mut policies: Vec<Box<dyn Policy>> = Vec::new();

    let report = evaluator
        .evaluate(&mut policies, &mut NullObserver)
        .expect("generation");

    assert!(report.entries.is_empty());
    assert_eq!(report.ticks, 0);
    assert_eq!(report.termination, Termination::Extinct);
    assert_eq!(report.best(), None);
    assert_eq!(evaluator.next_generation(), Generation(1));
}

struct StopAfter {
    flag: InterruptFlag,
    tick: Tick,
}

impl FrameObserver for StopAfter {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        if frame.tick == self.tick {
            self.flag.raise();
        }
    }
}

#[test]
fn interrupt_returns_partial_fitness() {
    let mut evaluator = Evaluator::new(seeded(3)).expect("evaluator");
    let mut observer = StopAfter {
        flag: evaluator.interrupt_flag(),
        tick: Tick(5),
    };
    let mut policies = vec![
        FnPolicy::new("chaser", chase_gap as fn(&Observation) -> f64),
        FnPolicy::new("chaser", chase_gap as fn(&Observation) -> f64),
    ];

    let report = evaluator
        .evaluate(&mut policies, &mut observer)
        .expect("generation");

    assert_eq!(report.termination, Termination::Interrupted);
    assert_eq!(report.ticks, 5);
    assert_eq!(report.survivors(), 2);
    for entry in &report.entries {
        assert!((entry.fitness - 0.5).abs() < 1e-9);
    }
}

struct FailsAt {
    calls: u32,
    limit: u32,
}

impl Policy for FailsAt {
    fn kind(&self) -> &'static str {
        "fails-at"
    }

    fn decide(&mut self, _observation: &Observation) -> Result<f64, PolicyError> {
        self.calls += 1;
        if self.calls >= self.limit {
            return Err(PolicyError::Failed(format!("gave up after {} calls", self.calls)));
        }
        Ok(0.0)
    }
}

#[test]
fn policy_failure_aborts_the_generation() {
    let mut evaluator = Evaluator::new(seeded(5)).expect("evaluator");
    let mut policies = vec![
        FailsAt {
            calls: 0,
            limit: 100,
        },
        FailsAt { calls: 0, limit: 3 },
    ];

    let err = evaluator
        .evaluate(&mut policies, &mut NullObserver)
        .expect_err("policy failure");

    assert_eq!(
        err,
        EvalError::Policy {
            controller: ControllerId(1),
            source: PolicyError::Failed("gave up after 3 calls".into()),
        }
    );
    assert_eq!(evaluator.next_generation(), Generation(1));
}

#[test]
fn real_time_rate_paces_ticks() {
    let config = FlapConfig {
        tick_rate_hz: 1000,
        ..seeded(8)
    };
    let mut evaluator = Evaluator::new(config).expect("evaluator");
    let mut policies = vec![FnPolicy::new("never", never as fn(&Observation) -> f64)];

    let start = Instant::now();
    let report = evaluator
        .evaluate(&mut policies, &mut NullObserver)
        .expect("generation");

    assert_eq!(report.ticks, 23);
    assert!(start.elapsed().as_millis() >= 15);
}
