//! Retry policy and named presets.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration for a retried operation.
///
/// The retry predicate is not part of the policy: the executor uses
/// [`Retryable`](crate::Retryable) by default and accepts an explicit
/// predicate per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
        }
    }

    /// 2 retries, 500ms growing to at most 2s.
    pub fn quick() -> Self {
        Self::new(2, Duration::from_millis(500), Duration::from_secs(2))
    }

    /// 3 retries, 1s growing to at most 10s.
    pub fn standard() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// 5 retries, 2s growing to at most 30s.
    pub fn aggressive() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(30))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Total number of invocations the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after a failure that was preceded by `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier".to_string(),
                value: self.backoff_multiplier.to_string(),
                reason: "backoff_multiplier must be positive".to_string(),
            });
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay".to_string(),
                value: format!("{:?}", self.max_delay),
                reason: "max_delay must not be shorter than initial_delay".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Named retry presets, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryPreset {
    Quick,
    #[default]
    Standard,
    Aggressive,
}

impl RetryPreset {
    pub fn policy(self) -> RetryPolicy {
        match self {
            Self::Quick => RetryPolicy::quick(),
            Self::Standard => RetryPolicy::standard(),
            Self::Aggressive => RetryPolicy::aggressive(),
        }
    }
}

impl From<RetryPreset> for RetryPolicy {
    fn from(preset: RetryPreset) -> Self {
        preset.policy()
    }
}
