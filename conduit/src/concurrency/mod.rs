//! Concurrency primitives for coordinating producers, workers and consumers.
//!
//! # Coordination Patterns
//!
//! ## Completion Tracking
//!
//! The [`barrier`] module counts outstanding units of work and releases every waiter once the
//! count returns to zero. Workers hold a [`barrier::CompletionToken`], so completion is reported
//! on every exit path, including a panic unwinding the worker.
//!
//! ## Shared Results
//!
//! The [`aggregator`] module collects results from many workers behind a single lock. Readers
//! always see a point-in-time view.
//!
//! ## Fan-In
//!
//! The [`fan_in`] module merges any number of producers into one bounded, ordered stream. Only
//! the coordinator closes the stream, and only after every producer reported completion.
//!
//! ## Signals and Deadlines
//!
//! The [`signal`] module provides the one-shot completion signal and the cancellation channel.
//! The [`deadline`] module combines an optional time bound with an optional cancellation channel
//! and is observed by every operation that can suspend.
//!
//! None of these primitives poll: waiting always parks on a [`tokio::sync::Notify`], a channel
//! or a timer.

pub mod aggregator;
pub mod barrier;
pub mod deadline;
pub mod fan_in;
pub mod future;
pub mod signal;
