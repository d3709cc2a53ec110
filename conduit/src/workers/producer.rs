//! Paced producer feeding a fan-in channel and firing the completion signal.

use std::time::Duration;

use conduit_config::shared::ConsumerConfig;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bail;
use crate::concurrency::deadline::{Deadline, Expiry};
use crate::concurrency::fan_in::Producer;
use crate::concurrency::signal::CompletionTx;
use crate::error::{CoordResult, ErrorKind};

/// Result of an [`IntervalProducer`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerOutcome {
    /// Number of items accepted by the channel.
    pub emitted: usize,
    /// Set when the deadline fired before the sequence was exhausted. The completion signal is
    /// not fired in that case.
    pub stopped: Option<Expiry>,
}

/// Emits a sequence into a fan-in channel at a fixed pace and then signals completion.
///
/// After each accepted item the producer waits one interval, so a sequence of `n` items
/// signals completion `n * interval` after the first send.
#[derive(Debug, Clone, Copy)]
pub struct IntervalProducer {
    interval: Duration,
}

impl IntervalProducer {
    /// Creates a producer pausing `interval` after every item.
    ///
    /// Fails with [`ErrorKind::ConfigError`] for a zero interval.
    pub fn new(interval: Duration) -> CoordResult<Self> {
        if interval.is_zero() {
            bail!(
                ErrorKind::ConfigError,
                "Emission interval must be greater than zero"
            );
        }

        Ok(Self { interval })
    }

    /// Creates a producer from the consumer configuration.
    pub fn from_config(config: &ConsumerConfig) -> CoordResult<Self> {
        config.validate()?;

        Self::new(config.emission_interval())
    }

    /// Returns the pause between items.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Emits `items` through `producer`, then fires `completion_tx`.
    ///
    /// Stops as soon as `deadline` fires, whether between items or while waiting for channel
    /// capacity. Fails with [`ErrorKind::ConsumerDropped`] when the receiver is gone.
    pub async fn run<T, I>(
        &self,
        items: I,
        producer: Producer<T>,
        completion_tx: CompletionTx,
        deadline: &Deadline,
    ) -> CoordResult<ProducerOutcome>
    where
        I: IntoIterator<Item = T>,
    {
        let producer_id = producer.id();
        let mut emitted = 0;

        for item in items {
            if let Some(expiry) = deadline.check() {
                return Ok(Self::stopped(producer_id, emitted, expiry));
            }

            tokio::select! {
                biased;

                expiry = deadline.expired() => {
                    return Ok(Self::stopped(producer_id, emitted, expiry));
                }
                result = producer.send(item) => result?,
            }
            emitted += 1;

            tokio::select! {
                biased;

                expiry = deadline.expired() => {
                    return Ok(Self::stopped(producer_id, emitted, expiry));
                }
                _ = sleep(self.interval) => {}
            }
        }

        // The sender is released before completion so the consumer never sees completion
        // while an item from this producer could still be in flight.
        producer.finish();
        if !completion_tx.complete() {
            debug!(producer_id, "completion fired after the consumer went away");
        }

        info!(producer_id, emitted, "producer finished its sequence");

        Ok(ProducerOutcome {
            emitted,
            stopped: None,
        })
    }

    fn stopped(producer_id: usize, emitted: usize, expiry: Expiry) -> ProducerOutcome {
        warn!(producer_id, emitted, %expiry, "producer stopped early");

        ProducerOutcome {
            emitted,
            stopped: Some(expiry),
        }
    }
}
