//! Deadlines combining an optional time bound with an optional cancellation channel.
//!
//! A [`Deadline`] is created by whoever starts a bounded operation and handed by reference to
//! every call that can suspend. It is observed either by a cheap synchronous check between
//! units of work or by awaiting [`Deadline::expired`] inside a `tokio::select!`.

use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::concurrency::future::optional_future;
use crate::concurrency::signal::CancelRx;
use crate::error::{CoordError, ErrorKind};

/// The reason a [`Deadline`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The cancellation channel was triggered.
    Cancelled,
    /// The time bound elapsed.
    TimedOut,
}

impl Expiry {
    /// Converts the expiry into the matching [`CoordError`].
    #[track_caller]
    pub fn into_error(self) -> CoordError {
        match self {
            Expiry::Cancelled => {
                crate::coord_error!(ErrorKind::Cancelled, "Operation was cancelled")
            }
            Expiry::TimedOut => {
                crate::coord_error!(ErrorKind::DeadlineExceeded, "Operation deadline elapsed")
            }
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Cancelled => f.write_str("cancelled"),
            Expiry::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Absolute time bound plus cancellation flag.
///
/// Both parts are optional. A deadline with neither never fires.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancel_rx: Option<CancelRx>,
}

impl Deadline {
    /// Creates a deadline that never fires.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates a deadline that fires `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Creates a deadline that fires at `instant`.
    pub fn at(instant: Instant) -> Self {
        Self {
            expires_at: Some(instant),
            cancel_rx: None,
        }
    }

    /// Makes the deadline also fire when `cancel_rx` observes cancellation.
    pub fn with_cancellation(mut self, cancel_rx: CancelRx) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Returns the instant the deadline fires at, if it has a time bound.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Returns the time left before the time bound, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx
            .as_ref()
            .is_some_and(|cancel_rx| *cancel_rx.borrow())
    }

    /// Returns whether the time bound has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Checks the deadline without waiting. Cancellation wins when both apply.
    pub fn check(&self) -> Option<Expiry> {
        if self.is_cancelled() {
            Some(Expiry::Cancelled)
        } else if self.is_expired() {
            Some(Expiry::TimedOut)
        } else {
            None
        }
    }

    /// Waits until the deadline fires.
    ///
    /// Stays pending forever for a deadline with neither a time bound nor a live cancellation
    /// channel. A cancellation sender dropped without cancelling never counts as cancellation.
    pub async fn expired(&self) -> Expiry {
        let cancelled = optional_future(self.cancel_rx.clone().map(|mut cancel_rx| async move {
            if cancel_rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }));
        let timed_out = optional_future(self.expires_at.map(sleep_until));

        tokio::select! {
            biased;

            _ = cancelled => Expiry::Cancelled,
            _ = timed_out => Expiry::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::signal::create_cancel_channel;

    #[tokio::test(start_paused = true)]
    async fn time_bound_fires_as_timed_out() {
        let deadline = Deadline::after(Duration::from_millis(500));

        assert_eq!(deadline.check(), None);
        assert_eq!(deadline.expired().await, Expiry::TimedOut);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fires_before_time_bound() {
        let (cancel_tx, cancel_rx) = create_cancel_channel();
        let deadline = Deadline::after(Duration::from_secs(10)).with_cancellation(cancel_rx);

        let waiter = {
            let deadline = deadline.clone();
            tokio::spawn(async move { deadline.expired().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_tx.cancel();

        assert_eq!(waiter.await.unwrap(), Expiry::Cancelled);
        assert_eq!(deadline.check(), Some(Expiry::Cancelled));
        assert!(!deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_cancel_sender_is_not_cancellation() {
        let (cancel_tx, cancel_rx) = create_cancel_channel();
        let deadline = Deadline::after(Duration::from_millis(200)).with_cancellation(cancel_rx);
        drop(cancel_tx);

        assert_eq!(deadline.expired().await, Expiry::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_deadline_never_fires() {
        let deadline = Deadline::unbounded();

        assert!(
            tokio::time::timeout(Duration::from_secs(3600), deadline.expired())
                .await
                .is_err()
        );
        assert_eq!(deadline.check(), None);
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn expiry_maps_to_error_kinds() {
        assert_eq!(Expiry::Cancelled.into_error().kind(), ErrorKind::Cancelled);
        assert_eq!(
            Expiry::TimedOut.into_error().kind(),
            ErrorKind::DeadlineExceeded
        );
    }
}
