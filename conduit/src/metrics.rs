//! Metric names emitted through the [`metrics`] facade.
//!
//! No recorder is installed by this crate. Whatever recorder the embedding process installs
//! receives these.

/// Label for the terminal state of a consumer.
pub const STATE_LABEL: &str = "state";

/// Label for the kind of dispatch (`async` or `blocking`).
pub const DISPATCH_KIND_LABEL: &str = "dispatch_kind";

/// Counter for work items handed to `work_fn`.
pub const CONDUIT_DISPATCHED_ITEMS_TOTAL: &str = "conduit_dispatched_items_total";

/// Counter for workers that panicked.
pub const CONDUIT_WORKER_PANICS_TOTAL: &str = "conduit_worker_panics_total";

/// Histogram of wall-clock dispatch duration in seconds.
pub const CONDUIT_DISPATCH_DURATION_SECONDS: &str = "conduit_dispatch_duration_seconds";

/// Counter for items sent through fan-in channels.
pub const CONDUIT_FAN_IN_ITEMS_TOTAL: &str = "conduit_fan_in_items_total";

/// Counter for consumers reaching a terminal state, labelled by [`STATE_LABEL`].
pub const CONDUIT_CONSUMER_OUTCOMES_TOTAL: &str = "conduit_consumer_outcomes_total";
