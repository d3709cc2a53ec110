use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Buffer configuration for fan-in channels.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    /// Number of in-flight items a fan-in channel buffers before producers block.
    #[serde(default = "default_channel_capacity")]
    pub capacity: usize,
}

impl ChannelConfig {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Ensures the capacity is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::ChannelCapacityZero);
        }

        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    ChannelConfig::DEFAULT_CAPACITY
}
