//! Metrics seam for application lifecycles.
//!
//! Backends (prometheus, ...) implement [`MetricsBackend`] and are handed to the
//! controller builder; the default records nothing.
mod backend;
pub use backend::{AppOutcome, MetricsBackend, MetricsHandle};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
