use std::time::Duration;

use super::DEFAULT_TICK_RATE;

/// Machine and execution loop settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Steps per second executed by the background loop.
    pub tick_rate: u32,
    /// Seed for the Cxnn random source; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Config {
    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Time between two steps. A zero tick rate is treated as 1Hz.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_rate: DEFAULT_TICK_RATE,
            rng_seed: None,
        }
    }
}
