use backon::{BackoffBuilder, ExponentialBuilder};
use std::time::Duration;

/// Reconnection schedule: exponential delays starting at `base_delay`,
/// doubling per attempt, capped at `max_delay`, abandoned after `max_attempts`
/// consecutive failures. The defaults give 1s, 2s, 4s, 8s, 16s, stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: usize,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(1), max_delay: Duration::from_secs(16), max_attempts: 5 }
    }
}

impl ReconnectPolicy {
    /// A fresh delay iterator. Exhaustion means the connection is abandoned;
    /// a successful open discards the iterator, which is what resets the
    /// attempt counter.
    #[must_use]
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts)
            .build()
    }
}
