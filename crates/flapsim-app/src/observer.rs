use flapsim_core::{Frame, FrameObserver};
use tracing::{debug, trace};

/// Logs a summary of every `stride`-th frame; a zero stride logs nothing.
#[derive(Debug, Clone)]
pub struct TraceObserver {
    stride: u64,
    frames: u64,
}

impl TraceObserver {
    #[must_use]
    pub const fn new(stride: u64) -> Self {
        Self { stride, frames: 0 }
    }

    /// Frames seen so far across all generations.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameObserver for TraceObserver {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        self.frames += 1;
        if frame.events.cleared {
            debug!(
                generation = frame.generation.0,
                tick = frame.tick.0,
                score = frame.score,
                alive = frame.alive(),
                "pipe cleared"
            );
        }
        if self.stride == 0 || frame.tick.0 % self.stride != 0 {
            return;
        }
        let leader = frame.members.first();
        let target = frame.target_pipe();
        trace!(
            generation = frame.generation.0,
            tick = frame.tick.0,
            score = frame.score,
            alive = frame.alive(),
            leader_y = leader.map(|member| member.bird.y()),
            leader_tilt = leader.map(|member| member.bird.tilt()),
            leader_fitness = leader.map(|member| member.fitness),
            target_x = target.map(|pipe| pipe.x()),
            target_gap = target.map(|pipe| pipe.gap_top()),
            ground = ?frame.ground.offsets(),
            "frame"
        );
    }
}
