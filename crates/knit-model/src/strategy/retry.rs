use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry with a constant pause between attempts.
///
/// Used where the thing being waited on is paced by the cluster (e.g. log aggregation)
/// and the delay has been checked against real latency; do not swap for exponential
/// growth without re-measuring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedDelay {
    /// Retries after the first attempt.
    pub retries: u32,
    pub delay_ms: u64,
}

impl FixedDelay {
    pub const fn new(retries: u32, delay_ms: u64) -> Self {
        Self { retries, delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total attempts including the first one.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(4, 3_000)
    }
}
