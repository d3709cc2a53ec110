use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{ChannelConfig, ConsumerConfig, DispatchConfig, ValidationError};

/// Configuration for one coordinated pipeline run.
///
/// Groups the fan-out, fan-in and consumption settings. Every section falls back to its
/// defaults when omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Fan-out settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Consumer deadline and producer pacing.
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Fan-in channel buffering.
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl Config for PipelineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.channel.validate()?;
        self.consumer.validate()?;

        Ok(())
    }
}
