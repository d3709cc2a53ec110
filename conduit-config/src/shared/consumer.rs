use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Timing configuration for cancellable consumption.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConsumerConfig {
    /// Time, in milliseconds, a consumer waits for the completion signal before timing out.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Time, in milliseconds, an interval producer waits between two emissions.
    #[serde(default = "default_emission_interval_ms")]
    pub emission_interval_ms: u64,
}

impl ConsumerConfig {
    /// Default consumer deadline in milliseconds.
    pub const DEFAULT_DEADLINE_MS: u64 = 1000;

    /// Default producer emission interval in milliseconds.
    pub const DEFAULT_EMISSION_INTERVAL_MS: u64 = 90;

    /// Returns the deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Returns the emission interval as a [`Duration`].
    pub fn emission_interval(&self) -> Duration {
        Duration::from_millis(self.emission_interval_ms)
    }

    /// Ensures the emission interval is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.emission_interval_ms == 0 {
            return Err(ValidationError::EmissionIntervalZero);
        }

        Ok(())
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            emission_interval_ms: default_emission_interval_ms(),
        }
    }
}

fn default_deadline_ms() -> u64 {
    ConsumerConfig::DEFAULT_DEADLINE_MS
}

fn default_emission_interval_ms() -> u64 {
    ConsumerConfig::DEFAULT_EMISSION_INTERVAL_MS
}
