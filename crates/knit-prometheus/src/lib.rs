//! Prometheus backend for knit application metrics.
//!
//! [`PrometheusMetrics`] implements [`knit_core::metrics::MetricsBackend`]; hand it to
//! the controller builder and expose [`PrometheusMetrics::gather`] however the host
//! process serves HTTP.
//!
//! ```rust
//! use std::sync::Arc;
//! use knit_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: knit_core::metrics::MetricsHandle = Arc::new(metrics.clone());
//! # let _ = handle;
//! let text = metrics.render()?;
//! assert!(text.is_empty() || text.contains("knit_"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `knit_apps_submitted_total` - Counter
//! - `knit_apps_finished_total{outcome}` - Counter
//! - `knit_app_duration_seconds{outcome}` - Histogram
//! - `knit_fallbacks_total{kind}` - Counter
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
