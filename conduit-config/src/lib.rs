//! Configuration types and loading for conduit pipelines.
//!
//! Every tunable of a coordinated run (worker count, item count, consumer deadline,
//! producer emission interval, channel capacity) is supplied from here or by the caller,
//! never hardcoded inside the library.

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
