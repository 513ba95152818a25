pub mod controller;
pub mod error;
pub mod fs;
pub mod metrics;
pub mod preflight;
pub mod registry;
pub mod webhdfs;

pub mod prelude {
    pub use crate::controller::{AppController, ControllerBuilder, ControllerConfig};
    pub use crate::error::CoreError;
    pub use crate::fs::{DistributedFs, FsError, FsUsage, RemoteFile};
    pub use crate::metrics::{AppOutcome, MetricsBackend, MetricsHandle, NoOpMetrics};
    pub use crate::preflight::{Demand, Preflight};
    pub use crate::registry::AppRegistry;
    pub use crate::webhdfs::WebHdfs;
}
