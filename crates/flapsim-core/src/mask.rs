//! Bit-exact sprite silhouettes and the collision test built on them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::Bird;
use crate::obstacle::Pipe;

/// Bird sprite width in pixels.
pub const BIRD_WIDTH: u32 = 68;
/// Bird sprite height in pixels.
pub const BIRD_HEIGHT: u32 = 48;
/// Pipe sprite width in pixels.
pub const PIPE_WIDTH: u32 = 104;
/// Pipe sprite height in pixels.
pub const PIPE_HEIGHT: u32 = 640;
/// Height of the wide cap at the open end of each pipe.
const PIPE_LIP_HEIGHT: u32 = 48;
/// Horizontal inset of the pipe body relative to its cap.
const PIPE_BODY_INSET: u32 = 4;
/// Alpha value above which a sprite pixel counts as solid.
pub const ALPHA_THRESHOLD: u8 = 127;

const WORD_BITS: u32 = u64::BITS;

/// Errors produced while building masks from external pixel data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("mask dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("alpha buffer holds {actual} samples but {width}x{height} needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Row-major bit set marking the solid pixels of a sprite.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitMask {
    width: u32,
    height: u32,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl std::fmt::Debug for BitMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitMask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("solid", &self.count())
            .finish()
    }
}

impl BitMask {
    /// Create a fully transparent mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let words_per_row = width.div_ceil(WORD_BITS) as usize;
        Self {
            width,
            height,
            words_per_row,
            bits: vec![0; words_per_row * height as usize],
        }
    }

    /// Create a fully solid mask.
    #[must_use]
    pub fn filled(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    /// Build a mask by evaluating `solid` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut solid: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if solid(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    /// Build a mask from a row-major alpha channel, marking samples above `threshold`.
    pub fn from_alpha(
        width: u32,
        height: u32,
        alpha: &[u8],
        threshold: u8,
    ) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(MaskError::SizeMismatch {
                width,
                height,
                expected,
                actual: alpha.len(),
            });
        }
        Ok(Self::from_fn(width, height, |x, y| {
            alpha[y as usize * width as usize + x as usize] > threshold
        }))
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel at (`x`, `y`) is solid; out-of-range pixels are transparent.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let word = self.bits[self.word_index(x, y)];
        (word >> (x % WORD_BITS)) & 1 == 1
    }

    /// Set or clear a pixel. Writes outside the mask are ignored.
    pub fn set(&mut self, x: u32, y: u32, solid: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = self.word_index(x, y);
        let bit = 1u64 << (x % WORD_BITS);
        if solid {
            self.bits[index] |= bit;
        } else {
            self.bits[index] &= !bit;
        }
    }

    /// Number of solid pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Mirror the mask top to bottom.
    #[must_use]
    pub fn flipped_vertical(&self) -> Self {
        let mut flipped = Self::new(self.width, self.height);
        let row = self.words_per_row;
        for y in 0..self.height as usize {
            let target = self.height as usize - 1 - y;
            flipped.bits[target * row..(target + 1) * row]
                .copy_from_slice(&self.bits[y * row..(y + 1) * row]);
        }
        flipped
    }

    /// First overlapping pixel (in this mask's coordinates) when `other` is placed with its
    /// top-left corner at `offset` relative to this mask.
    #[must_use]
    pub fn overlap(&self, other: &BitMask, offset: (i32, i32)) -> Option<(u32, u32)> {
        let (dx, dy) = (i64::from(offset.0), i64::from(offset.1));
        let x_start = dx.max(0);
        let x_end = (dx + i64::from(other.width)).min(i64::from(self.width));
        let y_start = dy.max(0);
        let y_end = (dy + i64::from(other.height)).min(i64::from(self.height));
        if x_start >= x_end || y_start >= y_end {
            return None;
        }

        for y in y_start..y_end {
            let other_y = (y - dy) as u32;
            let mut x = x_start;
            while x < x_end {
                let span = (x_end - x).min(i64::from(WORD_BITS)) as u32;
                let mine = self.row_bits(y as u32, x as u32, span);
                let theirs = other.row_bits(other_y, (x - dx) as u32, span);
                let hits = mine & theirs;
                if hits != 0 {
                    return Some((x as u32 + hits.trailing_zeros(), y as u32));
                }
                x += i64::from(span);
            }
        }
        None
    }

    /// Whether any solid pixel of `other` lands on a solid pixel of this mask.
    #[must_use]
    pub fn overlaps(&self, other: &BitMask, offset: (i32, i32)) -> bool {
        self.overlap(other, offset).is_some()
    }

    fn word_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.words_per_row + (x / WORD_BITS) as usize
    }

    /// Extract `len` (at most 64) bits of row `y` starting at column `start`.
    fn row_bits(&self, y: u32, start: u32, len: u32) -> u64 {
        debug_assert!(len > 0 && len <= WORD_BITS);
        let base = y as usize * self.words_per_row;
        let word = (start / WORD_BITS) as usize;
        let shift = start % WORD_BITS;
        let mut value = self.bits[base + word] >> shift;
        if shift > 0 && word + 1 < self.words_per_row {
            value |= self.bits[base + word + 1] << (WORD_BITS - shift);
        }
        if len < WORD_BITS {
            value &= (1u64 << len) - 1;
        }
        value
    }
}

/// Silhouettes for every sprite that takes part in collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteSet {
    pub bird: BitMask,
    /// Upper barrier, open end facing down.
    pub pipe_top: BitMask,
    /// Lower barrier, open end facing up.
    pub pipe_bottom: BitMask,
}

impl SpriteSet {
    /// Built-in silhouettes: an oval bird and a capped pipe.
    #[must_use]
    pub fn procedural() -> Self {
        let pipe_bottom = procedural_pipe();
        Self {
            bird: procedural_bird(),
            pipe_top: pipe_bottom.flipped_vertical(),
            pipe_bottom,
        }
    }

    /// Use caller-supplied bird and pipe silhouettes. The pipe mask is the lower barrier; the
    /// upper barrier is its vertical mirror.
    #[must_use]
    pub fn from_masks(bird: BitMask, pipe: BitMask) -> Self {
        Self {
            bird,
            pipe_top: pipe.flipped_vertical(),
            pipe_bottom: pipe,
        }
    }

    #[must_use]
    pub fn bird_height(&self) -> u32 {
        self.bird.height()
    }

    #[must_use]
    pub fn pipe_width(&self) -> u32 {
        self.pipe_bottom.width()
    }

    #[must_use]
    pub fn pipe_height(&self) -> u32 {
        self.pipe_top.height()
    }
}

impl Default for SpriteSet {
    fn default() -> Self {
        Self::procedural()
    }
}

fn procedural_bird() -> BitMask {
    let rx = f64::from(BIRD_WIDTH) / 2.0;
    let ry = f64::from(BIRD_HEIGHT) / 2.0;
    BitMask::from_fn(BIRD_WIDTH, BIRD_HEIGHT, |x, y| {
        let nx = (f64::from(x) + 0.5 - rx) / rx;
        let ny = (f64::from(y) + 0.5 - ry) / ry;
        nx * nx + ny * ny <= 1.0
    })
}

fn procedural_pipe() -> BitMask {
    BitMask::from_fn(PIPE_WIDTH, PIPE_HEIGHT, |x, y| {
        y < PIPE_LIP_HEIGHT || (PIPE_BODY_INSET..PIPE_WIDTH - PIPE_BODY_INSET).contains(&x)
    })
}

/// Exact silhouette test between a bird and both barriers of a pipe.
#[must_use]
pub fn collides(bird: &Bird, pipe: &Pipe, sprites: &SpriteSet) -> bool {
    let bird_y = bird.pixel_y();
    let dx = pipe.x() - bird.x();
    let top_offset = (dx, pipe.top() - bird_y);
    let bottom_offset = (dx, pipe.bottom() - bird_y);

    let bottom_hit = sprites.bird.overlaps(&sprites.pipe_bottom, bottom_offset);
    let top_hit = sprites.bird.overlaps(&sprites.pipe_top, top_offset);
    top_hit || bottom_hit
}
