use crate::error::ChirographError;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

/// Source of uniform values in `[0, 1)` feeding cut-line jitter.
///
/// Each document generation owns its source; nothing in the crate keeps a
/// process-wide generator.
pub trait RandomSource {
    fn next_f64(&mut self) -> Result<f64, ChirographError>;
}

/// Draws one value and rejects anything outside `[0, 1)`.
pub(crate) fn draw_unit(source: &mut dyn RandomSource) -> Result<f64, ChirographError> {
    let value = source.next_f64()?;
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(ChirographError::Randomness(format!(
            "value {value} is outside [0, 1)"
        )));
    }
    Ok(value)
}

/// Deterministic source for reproducible sheets and batch runs.
#[derive(Debug, Clone)]
pub struct SeededSource {
    seed: u64,
    rng: StdRng,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededSource {
    fn next_f64(&mut self) -> Result<f64, ChirographError> {
        Ok(self.rng.gen_range(0.0..1.0))
    }
}

/// Generator seeded from the operating system. Two sheets cut from fresh
/// entropy sources do not share jitter.
#[derive(Debug, Clone)]
pub struct EntropySource {
    rng: StdRng,
}

impl EntropySource {
    pub fn new() -> Result<Self, ChirographError> {
        let rng = StdRng::from_rng(OsRng)
            .map_err(|err| ChirographError::Randomness(format!("os entropy unavailable: {err}")))?;
        Ok(Self { rng })
    }
}

impl RandomSource for EntropySource {
    fn next_f64(&mut self) -> Result<f64, ChirographError> {
        Ok(self.rng.gen_range(0.0..1.0))
    }
}

/// Replays a recorded list of values, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    values: Vec<f64>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of values handed out so far.
    pub fn drawn(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ReplaySource {
    fn next_f64(&mut self) -> Result<f64, ChirographError> {
        if self.values.is_empty() {
            return Err(ChirographError::Randomness(
                "replay source has no values".to_string(),
            ));
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        Ok(value)
    }
}
