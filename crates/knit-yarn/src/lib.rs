//! Client for the cluster resource manager.
//!
//! Two channels are used: the REST API (fast, structured, only complete while an
//! application runs) and the cluster CLI (slow, text, the only source of archived
//! logs and a fallback for kills).
mod api;
pub use api::ResourceManager;

mod cli;
pub use cli::{CliOutput, ClusterCli, ShellCli};

mod client;
pub use client::{YarnApi, YarnApiConfig};

mod error;
pub use error::{YarnError, YarnResult};

mod logs;
pub use logs::{extract_log_content, parse_aggregated_logs};
