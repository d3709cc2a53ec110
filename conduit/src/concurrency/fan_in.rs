//! Fan-in channel merging many producers into one stream with single-owner close.
//!
//! The coordinator returned by [`fan_in`] is the only entity that hands out [`Producer`]s and
//! the only one that can close the stream. Every producer is registered with the coordinator's
//! [`CompletionBarrier`] when it is created, and reports completion when dropped.
//! [`FanInCoordinator::close_when_done`] consumes the coordinator, waits for the barrier and
//! only then drops the last sender, so:
//! - the stream closes exactly once, after every producer finished,
//! - no producer can be created, or send, after the close.
//!
//! Consumers see closure as `None` from [`FanInReceiver::recv`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use conduit_config::shared::ChannelConfig;
use futures::Stream;
use metrics::counter;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::concurrency::barrier::{CompletionBarrier, CompletionToken};
use crate::concurrency::deadline::Deadline;
use crate::coord_error;
use crate::error::{CoordResult, ErrorKind};
use crate::metrics::CONDUIT_FAN_IN_ITEMS_TOTAL;

/// Creates a fan-in channel buffering up to `config.capacity` items.
///
/// Fails when the configuration is invalid.
pub fn fan_in<T>(config: &ChannelConfig) -> CoordResult<(FanInCoordinator<T>, FanInReceiver<T>)> {
    config.validate()?;

    let (tx, rx) = mpsc::channel(config.capacity);
    let coordinator = FanInCoordinator {
        tx,
        producers: CompletionBarrier::new(),
        next_producer_id: 0,
    };

    Ok((coordinator, FanInReceiver { rx }))
}

/// Owner of a fan-in channel.
///
/// Creates producers and closes the stream once all of them are done.
#[derive(Debug)]
pub struct FanInCoordinator<T> {
    tx: mpsc::Sender<T>,
    producers: CompletionBarrier,
    next_producer_id: usize,
}

impl<T> FanInCoordinator<T> {
    /// Creates and registers a new producer.
    pub fn producer(&mut self) -> Producer<T> {
        let id = self.next_producer_id;
        self.next_producer_id += 1;

        // Registration happens here, before the producer can be handed to a worker, so the
        // barrier already accounts for it when `close_when_done` starts waiting.
        let token = self.producers.token();
        debug!(producer_id = id, "registered fan-in producer");

        Producer {
            id,
            tx: self.tx.clone(),
            _token: token,
        }
    }

    /// Returns the number of producers that have not finished yet.
    pub fn active_producers(&self) -> usize {
        self.producers.pending()
    }

    /// Waits for every producer to finish, then closes the stream.
    pub async fn close_when_done(self) {
        let FanInCoordinator {
            tx,
            producers,
            next_producer_id,
        } = self;

        producers.wait().await;
        drop(tx);

        info!(producers = next_producer_id, "all producers finished, fan-in closed");
    }
}

impl<T> FanInCoordinator<T>
where
    T: Send + 'static,
{
    /// Runs [`FanInCoordinator::close_when_done`] on a background task.
    pub fn spawn_close_when_done(self) -> JoinHandle<()> {
        tokio::spawn(self.close_when_done())
    }
}

/// Sending half held by one producer.
///
/// Dropping it, or calling [`Producer::finish`], reports the producer as done.
#[derive(Debug)]
pub struct Producer<T> {
    id: usize,
    // Declared before the token so the sender is released before completion is reported.
    tx: mpsc::Sender<T>,
    _token: CompletionToken,
}

impl<T> Producer<T> {
    /// Returns the producer's index in creation order.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Sends one item, waiting while the channel is full.
    ///
    /// Fails with [`ErrorKind::ConsumerDropped`] when every receiver is gone; the producer
    /// should stop.
    pub async fn send(&self, item: T) -> CoordResult<()> {
        if self.tx.send(item).await.is_err() {
            return Err(coord_error!(
                ErrorKind::ConsumerDropped,
                "Fan-in receiver was dropped",
                format!("producer {}", self.id)
            ));
        }

        counter!(CONDUIT_FAN_IN_ITEMS_TOTAL).increment(1);

        Ok(())
    }

    /// Sends one item unless `deadline` fires first, including while waiting for capacity.
    pub async fn send_until(&self, item: T, deadline: &Deadline) -> CoordResult<()> {
        if let Some(expiry) = deadline.check() {
            return Err(expiry.into_error());
        }

        tokio::select! {
            biased;

            expiry = deadline.expired() => {
                debug!(producer_id = self.id, %expiry, "producer stopped while sending");
                Err(expiry.into_error())
            }
            result = self.send(item) => result,
        }
    }

    /// Reports the producer as done.
    pub fn finish(self) {}
}

/// Receiving half of a fan-in channel.
#[derive(Debug)]
pub struct FanInReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> FanInReceiver<T> {
    /// Receives the next item, or `None` once the coordinator closed the stream and every
    /// buffered item was delivered.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Converts this receiver into one that several consumers can share.
    pub fn into_shared(self) -> SharedReceiver<T> {
        SharedReceiver {
            rx: Arc::new(Mutex::new(self.rx)),
        }
    }
}

impl<T> Stream for FanInReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Receiver shared by several consumers; each item goes to exactly one of them.
#[derive(Debug)]
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    /// Receives the next item, or `None` once the stream is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}
