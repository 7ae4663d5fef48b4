//! Injectable randomness for the synthetic metrics and simulated activity.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`. Everything random in the session
/// goes through this trait so tests can script exact values.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;

    /// Uniform draw in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_unit() * (high - low)
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }

    /// Index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize {
        ((self.next_unit() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

/// Production source backed by rand's `StdRng`.
pub struct StdRandom(StdRng);

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of unit values, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    pos: usize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into();
        assert!(!values.is_empty(), "SequenceSource needs at least one value");
        Self { values, pos: 0 }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.pos
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_respects_bounds() {
        let mut r = StdRandom::seeded(7);
        for _ in 0..1000 {
            let v = r.uniform(1.5, 4.5);
            assert!((1.5..4.5).contains(&v));
        }
    }

    #[test]
    fn test_sequence_cycles() {
        let mut r = SequenceSource::new(vec![0.0, 0.5]);
        assert_eq!(r.uniform(1.0, 3.0), 1.0);
        assert_eq!(r.uniform(1.0, 3.0), 2.0);
        assert_eq!(r.uniform(1.0, 3.0), 1.0);
        assert_eq!(r.draws(), 3);
    }

    #[test]
    fn test_index_never_overflows() {
        let mut r = SequenceSource::constant(1.0);
        assert_eq!(r.index(3), 2);
    }
}
