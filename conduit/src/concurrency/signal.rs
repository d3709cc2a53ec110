//! Signaling primitives for coordinating producers and consumers.
//!
//! Two kinds of signal are provided:
//! - a one-shot completion signal, fired by a producer once it has emitted everything and
//!   awaited by exactly one consumer. It is distinct from stream closure.
//! - a cancellation channel built on a watch channel, observed by any number of deadlines.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};

/// Sending half of a completion signal.
///
/// Firing consumes the sender, so the signal fires at most once.
#[derive(Debug)]
pub struct CompletionTx(oneshot::Sender<()>);

impl CompletionTx {
    /// Fires the signal.
    ///
    /// Returns `false` when the receiving side is already gone.
    pub fn complete(self) -> bool {
        self.0.send(()).is_ok()
    }
}

/// Receiving half of a completion signal.
///
/// Resolves to `true` when the signal fired and to `false` when the sender was dropped without
/// firing. Awaiting consumes the receiver, so at most one waiter observes the signal.
#[derive(Debug)]
pub struct CompletionRx(oneshot::Receiver<()>);

impl Future for CompletionRx {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0)
            .poll(cx)
            .map(|result| result.is_ok())
    }
}

/// Creates a new completion signal.
pub fn completion_signal() -> (CompletionTx, CompletionRx) {
    let (tx, rx) = oneshot::channel();
    (CompletionTx(tx), CompletionRx(rx))
}

/// Transmitter side of the cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelTx(watch::Sender<bool>);

impl CancelTx {
    /// Wraps a watch sender into a [`CancelTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Requests cancellation of everything observing this channel.
    ///
    /// Idempotent; cancelling twice has no further effect.
    pub fn cancel(&self) {
        // Infallible send so cancellation works before anyone subscribed.
        self.0.send_replace(true);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new cancellation receiver subscription.
    pub fn subscribe(&self) -> CancelRx {
        self.0.subscribe()
    }
}

/// Receiver side of the cancellation channel.
pub type CancelRx = watch::Receiver<bool>;

/// Creates a new cancellation channel in the not-cancelled state.
pub fn create_cancel_channel() -> (CancelTx, CancelRx) {
    let (tx, rx) = watch::channel(false);
    (CancelTx::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_fires_once() {
        let (tx, rx) = completion_signal();

        assert!(tx.complete());
        assert!(rx.await);
    }

    #[tokio::test]
    async fn dropped_sender_is_not_completion() {
        let (tx, rx) = completion_signal();
        drop(tx);

        assert!(!rx.await);
    }

    #[test]
    fn completing_without_receiver_reports_false() {
        let (tx, rx) = completion_signal();
        drop(rx);

        assert!(!tx.complete());
    }

    #[tokio::test]
    async fn cancel_is_observed_by_every_subscriber() {
        let (cancel_tx, mut first) = create_cancel_channel();
        let mut second = cancel_tx.subscribe();

        assert!(!cancel_tx.is_cancelled());
        cancel_tx.cancel();
        cancel_tx.cancel();

        first.wait_for(|cancelled| *cancelled).await.unwrap();
        second.wait_for(|cancelled| *cancelled).await.unwrap();
        assert!(cancel_tx.is_cancelled());
    }
}
