pub mod concurrency;
pub mod error;
mod macros;
pub mod metrics;
pub mod workers;
