//! Worker orchestration built on the [`crate::concurrency`] primitives.

pub mod consumer;
pub mod dispatcher;
pub mod producer;
