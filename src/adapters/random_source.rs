//! Random number source for value generation.
//!
//! A seeded source runs a 32-bit linear congruential recurrence so a fixed
//! seed and call sequence replay bit for bit. Unseeded sources draw from OS
//! entropy. The source implements [`RngCore`], which lets `fake` fakers and
//! `rand::Rng` helpers draw from the same stream.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

const LCG_MULTIPLIER: u64 = 1_664_525;
const LCG_INCREMENT: u64 = 1_013_904_223;
const LCG_MODULUS: u64 = 1 << 32;

#[derive(Debug, Clone)]
enum Mode {
    Seeded { seed: u64, state: u64 },
    Entropy(StdRng),
    /// Replays a fixed list of draws, cycling. Used to force outcomes in tests.
    Scripted { values: Vec<f64>, cursor: usize },
}

#[derive(Debug, Clone)]
pub struct RandomSource {
    mode: Mode,
}

impl RandomSource {
    /// Non-deterministic source backed by OS entropy.
    pub fn new() -> Self {
        Self {
            mode: Mode::Entropy(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            mode: Mode::Seeded {
                seed,
                state: seed % LCG_MODULUS,
            },
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map(Self::seeded).unwrap_or_default()
    }

    /// Source that returns `values` in order, wrapping around. Values are
    /// clamped into `[0, 1)`; an empty list behaves like a stream of zeros.
    pub fn scripted(values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0 - f64::EPSILON) } else { 0.0 })
            .collect();
        Self {
            mode: Mode::Scripted { values, cursor: 0 },
        }
    }

    pub fn is_seeded(&self) -> bool {
        matches!(self.mode, Mode::Seeded { .. })
    }

    /// Next draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        match &mut self.mode {
            Mode::Seeded { state, .. } => {
                *state = (*state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
                *state as f64 / LCG_MODULUS as f64
            }
            Mode::Entropy(rng) => rng.gen::<f64>(),
            Mode::Scripted { values, cursor } => {
                let value = values.get(*cursor).copied().unwrap_or(0.0);
                if !values.is_empty() {
                    *cursor = (*cursor + 1) % values.len();
                }
                value
            }
        }
    }

    /// Integer in `[min, max]`, both inclusive. Reversed bounds are swapped.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        let span = (high as i128 - low as i128 + 1) as f64;
        let offset = (self.next_f64() * span).floor() as i128;
        (low as i128 + offset).min(high as i128) as i64
    }

    /// Float in `[min, max)`. Reversed bounds are swapped.
    pub fn next_float(&mut self, min: f64, max: f64) -> f64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        low + self.next_f64() * (high - low)
    }

    /// True with probability `probability`.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.next_int(0, items.len() as i64 - 1) as usize;
        items.get(index)
    }

    /// Rewind a seeded or scripted source to its start; reseed an entropy source.
    pub fn reset(&mut self) {
        match &mut self.mode {
            Mode::Seeded { seed, state } => *state = *seed % LCG_MODULUS,
            Mode::Entropy(rng) => *rng = StdRng::from_entropy(),
            Mode::Scripted { cursor, .. } => *cursor = 0,
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        *self = Self::seeded(seed);
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 {
        if let Mode::Entropy(rng) = &mut self.mode {
            return rng.next_u32();
        }
        (self.next_f64() * LCG_MODULUS as f64) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let high = self.next_u32() as u64;
        let low = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
