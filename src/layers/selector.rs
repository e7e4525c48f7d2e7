use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::layers::source::LayerSource;

/// Strategy for picking one candidate out of a layer source.
///
/// Implementations must return an index in `0..len`; `len` is never zero.
pub trait Selector: Send {
    /// Pick a candidate index for `source`.
    fn choose(&mut self, source: &LayerSource, len: usize) -> usize;
}

/// Uniform picks from one generator seeded once from the OS.
///
/// The generator lives as long as the selector, so rapid successive draws stay independent.
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RandomSelector {
    fn choose(&mut self, _source: &LayerSource, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Replays a fixed script of picks, wrapping around at the end.
///
/// Each call consumes the next scripted index (reduced modulo `len`), so a script covers every
/// source of a unit in order before moving to the next unit.
#[derive(Clone, Debug)]
pub struct CyclingSelector {
    script: Vec<usize>,
    cursor: usize,
}

impl CyclingSelector {
    pub fn new(script: Vec<usize>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl Selector for CyclingSelector {
    fn choose(&mut self, _source: &LayerSource, len: usize) -> usize {
        if self.script.is_empty() {
            return 0;
        }
        let pick = self.script[self.cursor % self.script.len()];
        self.cursor = self.cursor.wrapping_add(1);
        pick % len
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layers/selector.rs"]
mod tests;
