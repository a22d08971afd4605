//! Engine configuration and the commit retry policy.

use geodist_core::{DistanceAlgorithm, DistanceUnit};
use std::time::Duration;

/// Bounded exponential backoff for transient store failures.
///
/// Applied only at the batch-commit boundary; fatal errors are never
/// retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first failure before giving up.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Tunables for pair generation and the batch-processing loop.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Pending pairs pulled and committed per processing batch.
    pub batch_size: usize,
    /// Pairs inserted per generation batch.
    pub gen_batch_size: usize,
    /// Worker threads for distance computation. 0 means all cores.
    pub concurrency: usize,
    pub algorithm: DistanceAlgorithm,
    pub unit: DistanceUnit,
    /// Free-space floor checked before every batch.
    pub min_free_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5_000,
            gen_batch_size: 10_000,
            concurrency: 0,
            algorithm: DistanceAlgorithm::Haversine,
            unit: DistanceUnit::Kilometers,
            min_free_bytes: 512 * 1024 * 1024,
            retry: RetryPolicy::default(),
        }
    }
}
