//! Stream consumption bounded by a completion signal and a [`Deadline`].

use std::fmt;

use futures::{FutureExt, Stream, StreamExt};
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::concurrency::deadline::{Deadline, Expiry};
use crate::concurrency::signal::CompletionRx;
use crate::coord_error;
use crate::error::{CoordResult, ErrorKind};
use crate::metrics::{CONDUIT_CONSUMER_OUTCOMES_TOTAL, STATE_LABEL};

/// Lifecycle of a [`CancellableConsumer`].
///
/// [`ConsumerState::Running`] is the only non-terminal state. The three terminal states are
/// mutually exclusive and exactly one of them is reached per consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerState {
    /// Still draining the stream.
    Running,
    /// The completion signal fired.
    Completed,
    /// The deadline's time bound elapsed first.
    TimedOut,
    /// The deadline's cancellation channel fired first.
    Cancelled,
}

impl ConsumerState {
    /// Returns whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConsumerState::Running)
    }

    /// Returns a stable lowercase name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Running => "running",
            ConsumerState::Completed => "completed",
            ConsumerState::TimedOut => "timed_out",
            ConsumerState::Cancelled => "cancelled",
        }
    }
}

impl From<Expiry> for ConsumerState {
    fn from(expiry: Expiry) -> Self {
        match expiry {
            Expiry::Cancelled => ConsumerState::Cancelled,
            Expiry::TimedOut => ConsumerState::TimedOut,
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a consumer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerOutcome {
    /// The terminal state reached.
    pub state: ConsumerState,
    /// Number of stream items handed to the item callback.
    pub received: usize,
}

/// Drains a stream until it is told it is complete, its deadline elapses, or it is cancelled.
///
/// Completion is a dedicated one-shot signal and is distinct from the stream ending: a stream
/// that ends early only stops the draining, and the consumer keeps waiting for a terminal event.
///
/// Each loop iteration selects with a fixed priority:
/// 1. a value ready on the stream, so buffered values are never skipped,
/// 2. the completion signal,
/// 3. the deadline, where cancellation wins over the time bound.
///
/// The deadline is also checked before every iteration so a stream that is always ready cannot
/// hold the consumer past its deadline. That check looks at the completion signal first without
/// waiting: when completion already fired, the values the stream has ready are drained and the
/// consumer completes. Otherwise values still buffered once the deadline passed are not
/// delivered.
#[derive(Debug)]
pub struct CancellableConsumer<S> {
    stream: S,
    completion_rx: CompletionRx,
}

impl<S> CancellableConsumer<S>
where
    S: Stream + Unpin,
{
    /// Creates a consumer over `stream` that completes when `completion_rx` fires.
    pub fn new(stream: S, completion_rx: CompletionRx) -> Self {
        Self {
            stream,
            completion_rx,
        }
    }

    /// Runs the consumer to a terminal state, calling `on_item` for every received value.
    pub async fn run<F>(self, deadline: &Deadline, mut on_item: F) -> ConsumerOutcome
    where
        F: FnMut(S::Item),
    {
        let CancellableConsumer {
            mut stream,
            mut completion_rx,
        } = self;

        let expired = deadline.expired();
        tokio::pin!(expired);

        let mut state = ConsumerState::Running;
        let mut received = 0;
        let mut stream_open = true;
        let mut completion_armed = true;

        while !state.is_terminal() {
            if let Some(expiry) = deadline.check() {
                // Completion that already fired still wins over an elapsed deadline, together
                // with whatever the stream has ready at this point.
                if completion_armed && (&mut completion_rx).now_or_never() == Some(true) {
                    if stream_open {
                        received += drain_ready(&mut stream, &mut on_item);
                    }
                    state = ConsumerState::Completed;
                } else {
                    state = expiry.into();
                }
                break;
            }

            tokio::select! {
                biased;

                item = stream.next(), if stream_open => match item {
                    Some(item) => {
                        received += 1;
                        on_item(item);
                    }
                    None => {
                        debug!(received, "stream ended, waiting for a terminal event");
                        stream_open = false;
                    }
                },

                completed = &mut completion_rx, if completion_armed => {
                    if completed {
                        state = ConsumerState::Completed;
                    } else {
                        warn!("completion sender dropped without firing");
                        completion_armed = false;
                    }
                }

                expiry = &mut expired => {
                    state = expiry.into();
                }
            }
        }

        counter!(CONDUIT_CONSUMER_OUTCOMES_TOTAL, STATE_LABEL => state.as_str()).increment(1);
        info!(%state, received, "consumer finished");

        ConsumerOutcome { state, received }
    }
}

/// Hands every value the stream can produce without waiting to `on_item`.
fn drain_ready<S, F>(stream: &mut S, on_item: &mut F) -> usize
where
    S: Stream + Unpin,
    F: FnMut(S::Item),
{
    let mut drained = 0;
    while let Some(Some(item)) = stream.next().now_or_never() {
        drained += 1;
        on_item(item);
    }

    drained
}

impl<S> CancellableConsumer<S>
where
    S: Stream + Unpin + Send + 'static,
    S::Item: Send,
{
    /// Runs the consumer on a background task.
    pub fn spawn<F>(self, deadline: Deadline, on_item: F) -> ConsumerHandle
    where
        F: FnMut(S::Item) + Send + 'static,
    {
        let handle = tokio::spawn(async move { self.run(&deadline, on_item).await });

        ConsumerHandle { handle }
    }
}

/// Handle to a spawned consumer.
///
/// Waiting consumes the handle, so the outcome is delivered to exactly one waiter.
#[derive(Debug)]
pub struct ConsumerHandle {
    handle: JoinHandle<ConsumerOutcome>,
}

impl ConsumerHandle {
    /// Waits for the consumer to reach a terminal state.
    ///
    /// Fails with [`ErrorKind::WorkerPanic`] when the item callback panicked.
    pub async fn wait(self) -> CoordResult<ConsumerOutcome> {
        self.handle.await.map_err(|err| {
            coord_error!(ErrorKind::WorkerPanic, "Consumer task failed").with_source(err)
        })
    }
}
