//! Simulation time advanced by registry ticks

use serde::{Deserialize, Serialize};

/// A discrete tick counter
pub type Tick = u64;

/// Registry clock: how many ticks ran and how much time they covered
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Clock {
    /// Number of ticks applied so far
    pub tick: Tick,
    /// Sum of every `dt` passed to a tick
    pub elapsed: f64,
}

impl Clock {
    /// Create a clock at tick zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick of length `dt`
    pub fn advance(&mut self, dt: f64) {
        self.tick += 1;
        self.elapsed += dt;
    }
}
