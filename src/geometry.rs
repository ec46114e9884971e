//! Square/file/rank arithmetic, ray enumeration, and the probability
//! helpers (normalization, weighted sampling) shared by every other module.

use std::fmt;

use indexmap::IndexMap;
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A board square, `index = rank*8 + file`, rank 0 = White's home rank,
/// file 0 = the a-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Square(u8);

impl Square {
    pub const COUNT: u8 = 64;

    #[inline]
    pub const fn new(index: u8) -> Self {
        assert!(index < 64, "square index out of range");
        Square(index)
    }

    #[inline]
    pub fn try_new(index: u8) -> Option<Self> {
        (index < 64).then_some(Square(index))
    }

    #[inline]
    pub fn from_file_rank(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then(|| Square(rank * 8 + file))
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn file(self) -> u8 {
        self.0 % 8
    }

    #[inline]
    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    /// `(file, rank)` offset by `(df, dr)`, `None` if it would leave the board.
    pub fn offset(self, df: i8, dr: i8) -> Option<Self> {
        let file = self.file() as i8 + df;
        let rank = self.rank() as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Self::from_file_rank(file as u8, rank as u8)
        } else {
            None
        }
    }

    pub fn algebraic(self) -> String {
        format!(
            "{}{}",
            (b'a' + self.file()) as char,
            (b'1' + self.rank()) as char
        )
    }

    pub fn from_algebraic(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file_ch = chars.next()?;
        let rank_ch = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        if !('a'..='h').contains(&file_ch) || !('1'..='8').contains(&rank_ch) {
            return None;
        }
        let file = file_ch as u8 - b'a';
        let rank = rank_ch as u8 - b'1';
        Self::from_file_rank(file, rank)
    }

    pub fn chebyshev_distance(self, other: Self) -> u8 {
        self.file()
            .abs_diff(other.file())
            .max(self.rank().abs_diff(other.rank()))
    }

    pub fn manhattan_distance(self, other: Self) -> u8 {
        self.file().abs_diff(other.file()) + self.rank().abs_diff(other.rank())
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.algebraic())
    }
}

/// The intermediate squares strictly between `from` and `to`, in order
/// from `from` towards `to`. Empty when the squares coincide or are not
/// aligned on a rank, file, or diagonal.
pub fn path_between(from: Square, to: Square) -> Vec<Square> {
    let df = to.file() as i8 - from.file() as i8;
    let dr = to.rank() as i8 - from.rank() as i8;

    let (step_file, step_rank) = match (df.signum(), dr.signum()) {
        (0, 0) => return Vec::new(),
        (sf, sr) if df == 0 || dr == 0 || df.abs() == dr.abs() => (sf, sr),
        _ => return Vec::new(),
    };

    let steps = df.abs().max(dr.abs());
    let mut squares = Vec::with_capacity(steps as usize - 1);
    let mut cursor = from;
    for _ in 1..steps {
        cursor = cursor
            .offset(step_file, step_rank)
            .expect("path_between stays on board between two on-board squares");
        squares.push(cursor);
    }
    squares
}

/// Sum of a distribution's probabilities.
pub fn total_mass(distribution: &IndexMap<Square, f64>) -> f64 {
    distribution.values().sum()
}

/// Scale a distribution in place so it sums to 1. Fails when total mass is
/// (numerically) zero — there is nothing to scale by.
pub fn normalize(distribution: &mut IndexMap<Square, f64>, epsilon: f64) -> Result<(), EngineError> {
    let total = total_mass(distribution);
    if total.abs() <= epsilon {
        return Err(EngineError::invalid_state(
            "cannot normalize a distribution with zero total mass",
        ));
    }
    for value in distribution.values_mut() {
        *value /= total;
    }
    distribution.retain(|_, p| *p > epsilon);
    Ok(())
}

/// An injected source of uniform randomness in `[0, 1)`, used by weighted
/// sampling during measurement. Not re-entrant: callers own one per move.
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;
}

impl<R: RngCore> RandomSource for R {
    fn next_f64(&mut self) -> f64 {
        // Top 53 bits give a uniform value in [0, 1) with full f64 mantissa
        // precision, the same construction `rand::Rng::random::<f64>()` uses.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// A deterministic, seedable [`RandomSource`] for tests that need the same
/// seed to reproduce the same sequence of moves and identical snapshots.
pub struct SeededRandomSource(SmallRng);

impl SeededRandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandomSource {
    fn next_f64(&mut self) -> f64 {
        self.0.next_f64()
    }
}

/// A [`RandomSource`] that always returns a fixed value, useful for driving
/// end-to-end scenarios that specify an exact measurement draw.
pub struct FixedRandomSource(pub f64);

impl RandomSource for FixedRandomSource {
    fn next_f64(&mut self) -> f64 {
        self.0
    }
}

/// Draw a square from `distribution` by accumulating probability mass
/// against `rng.next_f64() * total`. The distribution is assumed
/// normalized (or at least positive-total); callers needing a hard
/// guarantee should `normalize` first.
pub fn sample(distribution: &IndexMap<Square, f64>, rng: &mut dyn RandomSource) -> Square {
    let total = total_mass(distribution);
    debug_assert!(total > 0.0, "sampling an empty distribution");
    let draw = rng.next_f64() * total;
    let mut acc = 0.0;
    for (&square, &p) in distribution {
        acc += p;
        if draw < acc {
            return square;
        }
    }
    // Floating-point rounding can push `draw` a hair past the accumulated
    // total; fall back to the last entry rather than panic.
    *distribution
        .keys()
        .last()
        .expect("sampling an empty distribution")
}
