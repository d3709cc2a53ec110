use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Channel capacity cannot be zero, a bounded channel needs at least one slot.
    #[error("`channel.capacity` cannot be zero")]
    ChannelCapacityZero,
    /// A producer emission interval of zero would turn the producer into a busy loop.
    #[error("`consumer.emission_interval_ms` cannot be zero")]
    EmissionIntervalZero,
}
