//! Configuration for the sync engine.

use std::time::Duration;
use swipetax_protocol::DeviceId;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// This device's identity, stamped onto every mutation it pushes.
    pub device_id: DeviceId,
    /// Maximum records per pull page.
    pub pull_batch_size: u32,
    /// Timeout for a single mutation push. A push that exceeds it is
    /// treated as a failed attempt and retried in a later session.
    pub push_timeout: Duration,
    /// How long a terminal state (synced/error/offline) is reported
    /// before the engine reads as idle again.
    pub settle_delay: Duration,
    /// Retention window for confirmed mutations before pruning.
    pub retention: Duration,
    /// Backoff schedule for automatic retries.
    pub backoff: BackoffConfig,
}

impl SyncConfig {
    /// Creates a configuration with default tuning for the device.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            pull_batch_size: 100,
            push_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
            retention: Duration::from_secs(7 * 24 * 3600),
            backoff: BackoffConfig::default(),
        }
    }

    /// Sets the pull page size.
    pub fn with_pull_batch_size(mut self, size: u32) -> Self {
        self.pull_batch_size = size;
        self
    }

    /// Sets the per-push timeout.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Sets the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the confirmed-mutation retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the backoff schedule.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Capped exponential backoff schedule.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first automatic retry.
    pub initial_delay: Duration,
    /// Multiplier applied per retry.
    pub multiplier: f64,
    /// Delay ceiling.
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// Creates a schedule: `initial`, doubling up to `max`.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier: 2.0,
            max_delay,
        }
    }

    /// Calculates the delay for a given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        // 2s, 4s, 8s, ... capped at five minutes.
        Self::new(Duration::from_secs(2), Duration::from_secs(300))
    }
}

/// Mutable retry schedule driven by a [`BackoffConfig`].
///
/// Advances on each consumed delay and resets to the base on any
/// successful session.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Creates a schedule at its base delay.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Returns the upcoming delay without advancing.
    pub fn peek(&self) -> Duration {
        self.config.delay_for_attempt(self.attempt)
    }

    /// Resets the schedule to its base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
