mod domain;
pub use domain::{AppId, ContainerId, Env, KeyValue};
pub use domain::{DEFAULT_APP_NAME, DEFAULT_QUEUE, STAGING_DIR, SUPERVISOR_ORDINAL};

mod error;
pub use error::{ConfigError, ModelError, ModelResult};

mod state;
pub use state::{AppState, FinalStatus, LifecycleState, RuntimeStatus};

mod cluster;
pub use cluster::{
    AppAttempt, AppStatistics, AppSummary, ClusterInfo, ClusterMetrics, ContainerInfo,
    ContainerLogs, LogBundle, NodeInfo,
};

mod spec;
pub use spec::{ContainerRequest, LaunchSpec};

mod config;
pub use config::{AuthMode, ClusterConfig, ConfigSource, HadoopConfDir, Overrides, RawConfig};
pub use config::{host_port, parse_site_xml};

mod strategy;
pub use strategy::FixedDelay;
