//! Scrolling pipe pairs and the cosmetic ground strip.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::FlapConfig;
use crate::mask::SpriteSet;

/// Width of one ground tile in pixels.
pub const GROUND_TILE_WIDTH: i32 = 672;

/// Geometry and placement rules shared by every pipe in a stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipeSpec {
    pub gap_size: i32,
    pub gap_min: i32,
    pub gap_max: i32,
    pub velocity: i32,
    pub width: i32,
    pub barrier_height: i32,
}

impl PipeSpec {
    #[must_use]
    pub fn new(config: &FlapConfig, sprites: &SpriteSet) -> Self {
        Self {
            gap_size: config.gap_size,
            gap_min: config.gap_min,
            gap_max: config.gap_max,
            velocity: config.scroll_velocity,
            width: sprites.pipe_width() as i32,
            barrier_height: sprites.pipe_height() as i32,
        }
    }
}

/// Upper and lower barrier pair separated by a vertical gap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pipe {
    x: i32,
    gap_top: i32,
    top: i32,
    bottom: i32,
    width: i32,
    velocity: i32,
    passed: bool,
}

impl Pipe {
    /// Create a pipe at `x` whose gap top is drawn uniformly from the spec's range.
    pub fn spawn<R: Rng + ?Sized>(x: i32, spec: &PipeSpec, rng: &mut R) -> Self {
        let gap_top = rng.random_range(spec.gap_min..spec.gap_max);
        Self::with_gap(x, gap_top, spec)
    }

    /// Create a pipe with a fixed gap top.
    #[must_use]
    pub const fn with_gap(x: i32, gap_top: i32, spec: &PipeSpec) -> Self {
        Self {
            x,
            gap_top,
            top: gap_top - spec.barrier_height,
            bottom: gap_top + spec.gap_size,
            width: spec.width,
            velocity: spec.velocity,
            passed: false,
        }
    }

    /// Left edge.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Lowest open row above the gap; the upper barrier ends just above it.
    #[must_use]
    pub const fn gap_top(&self) -> i32 {
        self.gap_top
    }

    /// First row of the lower barrier.
    #[must_use]
    pub const fn gap_bottom(&self) -> i32 {
        self.bottom
    }

    #[must_use]
    pub fn gap_center(&self) -> f64 {
        f64::from(self.gap_top + self.bottom) / 2.0
    }

    /// Screen row where the upper barrier sprite starts.
    #[must_use]
    pub const fn top(&self) -> i32 {
        self.top
    }

    /// Screen row where the lower barrier sprite starts.
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.bottom
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Flag the pipe as passed, returning `true` only on the first call.
    pub fn mark_passed(&mut self) -> bool {
        let first = !self.passed;
        self.passed = true;
        first
    }

    /// Whether the right edge has left the screen.
    #[must_use]
    pub const fn is_off_screen(&self) -> bool {
        self.right() < 0
    }

    pub fn advance(&mut self) {
        self.x -= self.velocity;
    }
}

/// Two ground tiles leapfrogging each other to fake an endless floor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ground {
    y: i32,
    x1: i32,
    x2: i32,
    velocity: i32,
}

impl Ground {
    #[must_use]
    pub const fn new(y: i32, velocity: i32) -> Self {
        Self {
            y,
            x1: 0,
            x2: GROUND_TILE_WIDTH,
            velocity,
        }
    }

    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Left edges of both tiles.
    #[must_use]
    pub const fn offsets(&self) -> (i32, i32) {
        (self.x1, self.x2)
    }

    pub fn advance(&mut self) {
        self.x1 -= self.velocity;
        self.x2 -= self.velocity;

        if self.x1 + GROUND_TILE_WIDTH < 0 {
            self.x1 = self.x2 + GROUND_TILE_WIDTH;
        }
        if self.x2 + GROUND_TILE_WIDTH < 0 {
            self.x2 = self.x1 + GROUND_TILE_WIDTH;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    fn spec() -> PipeSpec {
        PipeSpec::new(&FlapConfig::default(), &SpriteSet::procedural())
    }

    #[test]
    fn spawned_gaps_stay_in_range() {
        let spec = spec();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let pipe = Pipe::spawn(480, &spec, &mut rng);
            assert!((40..360).contains(&pipe.gap_top()));
            assert_eq!(pipe.gap_bottom() - pipe.gap_top(), 160);
            assert_eq!(pipe.top(), pipe.gap_top() - 640);
            assert!(!pipe.passed());
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let spec = spec();
        let mut a = SmallRng::seed_from_u64(99);
        let mut b = SmallRng::seed_from_u64(99);
        let gaps_a: Vec<i32> = (0..20)
            .map(|_| Pipe::spawn(0, &spec, &mut a).gap_top())
            .collect();
        let gaps_b: Vec<i32> = (0..20)
            .map(|_| Pipe::spawn(0, &spec, &mut b).gap_top())
            .collect();
        assert_eq!(gaps_a, gaps_b);
    }

    #[test]
    fn scrolls_until_off_screen() {
        let spec = spec();
        let mut pipe = Pipe::with_gap(8, 200, &spec);
        pipe.advance();
        assert_eq!(pipe.x(), 4);
        assert_eq!(pipe.gap_top(), 200);
        assert_eq!(pipe.gap_center(), 280.0);

        let mut ticks = 0;
        while !pipe.is_off_screen() {
            pipe.advance();
            ticks += 1;
        }
        assert_eq!(pipe.x(), -108);
        assert_eq!(ticks, 28);
    }

    #[test]
    fn passed_flag_flips_once() {
        let mut pipe = Pipe::with_gap(0, 100, &spec());
        assert!(pipe.mark_passed());
        assert!(!pipe.mark_passed());
        assert!(pipe.passed());
    }

    #[test]
    fn ground_tiles_wrap() {
        let mut ground = Ground::new(584, 4);
        for _ in 0..169 {
            ground.advance();
        }
        // Tile one left the screen at x = -676 and jumped behind tile two.
        assert_eq!(ground.offsets(), (-4 + GROUND_TILE_WIDTH, -4));
        assert_eq!(ground.y(), 584);
    }
}
