//! Adaptive delay between airdrop cycles

use std::time::Duration;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min_sleep_seconds: u64,
    pub max_sleep_seconds: u64,
    pub error_step_seconds: u64,
    pub idle_step_seconds: u64,
    pub productive_step_seconds: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_sleep_seconds: 5,
            max_sleep_seconds: 60,
            error_step_seconds: 10,
            idle_step_seconds: 1,
            productive_step_seconds: 10,
        }
    }
}

impl From<&Settings> for BackoffPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            min_sleep_seconds: settings.min_sleep_seconds,
            max_sleep_seconds: settings.max_sleep_seconds,
            error_step_seconds: settings.error_step_seconds,
            idle_step_seconds: settings.idle_step_seconds,
            productive_step_seconds: settings.productive_step_seconds,
        }
    }
}

/// Current wait of one robot; always within `[min_sleep_seconds, max_sleep_seconds]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    policy: BackoffPolicy,
    current_seconds: u64,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current_seconds: policy.min_sleep_seconds,
            policy,
        }
    }

    pub fn current_seconds(&self) -> u64 {
        self.current_seconds
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.current_seconds)
    }

    /// Cycle failed
    pub fn on_error(&mut self) {
        self.current_seconds = self
            .current_seconds
            .saturating_add(self.policy.error_step_seconds)
            .min(self.policy.max_sleep_seconds);
    }

    /// Cycle found nothing to mint
    pub fn on_idle(&mut self) {
        self.current_seconds = self
            .current_seconds
            .saturating_add(self.policy.idle_step_seconds)
            .min(self.policy.max_sleep_seconds);
    }

    /// Cycle minted to at least one address
    pub fn on_productive(&mut self) {
        self.current_seconds = self
            .current_seconds
            .saturating_sub(self.policy.productive_step_seconds)
            .max(self.policy.min_sleep_seconds);
    }

    /// Apply the transition for a cycle outcome: `Some(minted)` on success, `None` on error.
    pub fn record(&mut self, minted: Option<usize>) {
        match minted {
            None => self.on_error(),
            Some(0) => self.on_idle(),
            Some(_) => self.on_productive(),
        }
    }
}
