//! Envelopes the REST API wraps its payloads in.
//!
//! Empty collections come back as `null` (e.g. `{"apps": null}`), hence the options.
use knit_model::{AppAttempt, AppState, AppSummary, ClusterInfo, ClusterMetrics, ContainerInfo, NodeInfo};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub(crate) struct AppsEnvelope {
    pub apps: Option<AppList>,
}

#[derive(Deserialize)]
pub(crate) struct AppList {
    #[serde(default)]
    pub app: Vec<AppSummary>,
}

#[derive(Deserialize)]
pub(crate) struct AppEnvelope {
    pub app: AppSummary,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct StateBody {
    pub state: AppState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricsEnvelope {
    pub cluster_metrics: ClusterMetrics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterInfoEnvelope {
    pub cluster_info: ClusterInfo,
}

#[derive(Deserialize)]
pub(crate) struct NodesEnvelope {
    pub nodes: Option<NodeList>,
}

#[derive(Deserialize)]
pub(crate) struct NodeList {
    #[serde(default)]
    pub node: Vec<NodeInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptsEnvelope {
    pub app_attempts: Option<AttemptList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptList {
    #[serde(default)]
    pub app_attempt: Vec<AppAttempt>,
}

#[derive(Deserialize)]
pub(crate) struct ContainersEnvelope {
    pub containers: Option<ContainerList>,
}

#[derive(Deserialize)]
pub(crate) struct ContainerList {
    #[serde(default)]
    pub container: Vec<ContainerInfo>,
}

#[derive(Deserialize)]
pub(crate) struct ContainerEnvelope {
    pub container: ContainerInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatisticsEnvelope {
    pub app_stat_info: StatisticsList,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatisticsList {
    #[serde(default)]
    pub stat_item: Vec<StatItem>,
}

#[derive(Deserialize)]
pub(crate) struct StatItem {
    pub state: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Deserialize)]
pub(crate) struct RemoteExceptionEnvelope {
    #[serde(rename = "RemoteException")]
    pub remote_exception: RemoteException,
}

#[derive(Deserialize)]
pub(crate) struct RemoteException {
    pub message: String,
}
