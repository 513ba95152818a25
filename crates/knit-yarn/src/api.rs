use async_trait::async_trait;
use knit_model::{AppId, AppState, AppSummary, ClusterMetrics, ContainerInfo, LogBundle, NodeInfo};

use crate::YarnResult;

/// The slice of the resource manager the lifecycle controller and preflight depend on.
///
/// Every call is a fresh query; implementations must not cache.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// All applications known to the cluster.
    async fn list_applications(&self) -> YarnResult<Vec<AppSummary>>;

    async fn application(&self, id: &AppId) -> YarnResult<AppSummary>;

    async fn state(&self, id: &AppId) -> YarnResult<AppState>;

    /// Containers of `id`, including the master's own.
    async fn containers(&self, id: &AppId) -> YarnResult<Vec<ContainerInfo>>;

    /// Per-container stdout/stderr. `archived = false` tries the live channel first
    /// and falls back to the archived one on any failure.
    async fn logs(&self, id: &AppId, archived: bool) -> YarnResult<LogBundle>;

    async fn cluster_metrics(&self) -> YarnResult<ClusterMetrics>;

    async fn nodes(&self) -> YarnResult<Vec<NodeInfo>>;

    /// Ask the cluster to kill `id`. `true` only if termination was confirmed;
    /// never fails, including for applications that are already dead.
    async fn kill(&self, id: &AppId) -> bool;
}
