//! Counting completion barrier for waiting on a group of workers.
//!
//! The expected-completions counter lives behind a [`Mutex`] and waiters are woken through a
//! [`Notify`], so waiting never spins. Workers normally hold a [`CompletionToken`] rather than
//! calling [`CompletionBarrier::done`] by hand: the token registers itself when created and
//! reports completion when dropped, which also covers early returns and panics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct BarrierInner {
    /// Number of outstanding completions.
    pending: Mutex<usize>,
    /// Woken whenever `pending` drops to zero.
    zero: Notify,
}

/// Barrier that releases waiters once every expected completion has been reported.
///
/// Cloning is cheap and every clone observes the same counter.
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    inner: Arc<BarrierInner>,
}

impl CompletionBarrier {
    /// Creates a barrier with no outstanding completions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increases the number of expected completions by `n`.
    pub fn add(&self, n: usize) {
        *self.lock() += n;
    }

    /// Reports one completion.
    ///
    /// # Panics
    ///
    /// Panics if there is no outstanding completion to report. A `done` without a matching
    /// `add` means the caller's bookkeeping is broken and waiters could be released early.
    #[track_caller]
    pub fn done(&self) {
        let remaining = {
            let mut pending = self.lock();
            let Some(remaining) = pending.checked_sub(1) else {
                drop(pending);
                panic!("completion barrier underflow: done() called without a matching add()");
            };
            *pending = remaining;
            remaining
        };

        if remaining == 0 {
            self.inner.zero.notify_waiters();
        }
    }

    /// Returns the number of outstanding completions.
    pub fn pending(&self) -> usize {
        *self.lock()
    }

    /// Waits until the counter reaches zero.
    ///
    /// Returns immediately when nothing is outstanding.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.zero.notified();
            tokio::pin!(notified);
            // Register interest before reading the counter so a `done` landing in between
            // still wakes us.
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Registers one expected completion and returns the token that reports it.
    pub fn token(&self) -> CompletionToken {
        self.add(1);
        CompletionToken {
            barrier: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The guarded value is a plain integer updated in one step, so a poisoned lock still
        // holds a consistent count.
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped registration with a [`CompletionBarrier`].
///
/// Reports exactly one completion when dropped.
#[must_use = "dropping the token immediately reports completion"]
#[derive(Debug)]
pub struct CompletionToken {
    barrier: CompletionBarrier,
}

impl CompletionToken {
    /// Reports completion now.
    pub fn complete(self) {}
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.barrier.done();
    }
}
