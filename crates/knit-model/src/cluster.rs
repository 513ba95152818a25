//! Resource-manager views, deserialized straight from its REST payloads.
//!
//! All of these are query-time snapshots; nothing here is cached as authoritative.
use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{AppId, AppState, ContainerId, FinalStatus};

/// One application as listed by `cluster/apps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub id: AppId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub queue: String,
    pub state: AppState,
    #[serde(default)]
    pub final_status: FinalStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, rename = "allocatedMB")]
    pub allocated_mb: i64,
    #[serde(default, rename = "allocatedVCores")]
    pub allocated_vcores: i64,
    #[serde(default)]
    pub running_containers: i64,
    #[serde(default)]
    pub started_time: i64,
    #[serde(default)]
    pub finished_time: i64,
    #[serde(default)]
    pub elapsed_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub am_host_http_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub diagnostics: String,
}

/// Container as reported by a node manager's `node/containers` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub state: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default)]
    pub diagnostics: String,
    #[serde(default)]
    pub container_logs_link: String,
    #[serde(default, rename = "totalMemoryNeededMB")]
    pub memory_mb: i64,
    #[serde(default, rename = "totalVCoresNeeded")]
    pub vcores: i64,
}

/// Global capacity/allocation counters from `cluster/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterMetrics {
    pub active_nodes: i64,
    pub lost_nodes: i64,
    pub unhealthy_nodes: i64,
    #[serde(rename = "availableMB")]
    pub available_mb: i64,
    #[serde(rename = "allocatedMB")]
    pub allocated_mb: i64,
    #[serde(rename = "totalMB")]
    pub total_mb: i64,
    pub available_virtual_cores: i64,
    pub allocated_virtual_cores: i64,
    pub total_virtual_cores: i64,
    pub apps_running: i64,
    pub apps_pending: i64,
    pub containers_allocated: i64,
}

/// One node manager from `cluster/nodes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeInfo {
    pub id: String,
    pub node_host_name: String,
    #[serde(rename = "nodeHTTPAddress")]
    pub node_http_address: String,
    pub state: String,
    pub rack: String,
    pub num_containers: i64,
    #[serde(rename = "availMemoryMB")]
    pub avail_memory_mb: i64,
    #[serde(rename = "usedMemoryMB")]
    pub used_memory_mb: i64,
    pub available_virtual_cores: i64,
    pub used_virtual_cores: i64,
}

/// Resource-manager identity and version from `cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterInfo {
    pub id: i64,
    pub started_on: i64,
    pub state: String,
    pub ha_state: String,
    pub resource_manager_version: String,
    pub hadoop_version: String,
}

/// One attempt of an application, from `cluster/apps/{id}/appattempts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppAttempt {
    pub id: i64,
    pub start_time: i64,
    pub container_id: String,
    pub node_http_address: String,
    pub node_id: String,
    pub logs_link: String,
}

/// Per-state application counts, from `cluster/appstatistics`.
pub type AppStatistics = BTreeMap<AppState, i64>;

/// Captured output of one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLogs {
    pub node_id: String,
    pub stdout: String,
    pub stderr: String,
}

/// Logs of every container of one application, keyed by container id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogBundle(pub BTreeMap<ContainerId, ContainerLogs>);

impl LogBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &ContainerId) -> Option<&ContainerLogs> {
        self.0.get(id)
    }

    pub fn insert(&mut self, id: ContainerId, logs: ContainerLogs) {
        self.0.insert(id, logs);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContainerId, &ContainerLogs)> {
        self.0.iter()
    }
}

impl fmt::Display for LogBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, logs) in &self.0 {
            writeln!(f, "\n### Container {id}, node {} ###\n", logs.node_id)?;
            writeln!(f, "## stdout ##")?;
            writeln!(f, "{}", logs.stdout)?;
            writeln!(f, "## stderr ##")?;
            writeln!(f, "{}", logs.stderr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_summary_from_rest_payload() {
        let json = r#"{
            "id": "application_1452274436693_0001",
            "name": "knit",
            "user": "root",
            "queue": "default",
            "state": "RUNNING",
            "finalStatus": "UNDEFINED",
            "progress": 0.0,
            "allocatedMB": 2048,
            "allocatedVCores": 2,
            "runningContainers": 2,
            "startedTime": 1452274500000,
            "finishedTime": 0,
            "elapsedTime": 1200,
            "amHostHttpAddress": "node1:8042"
        }"#;
        let app: AppSummary = serde_json::from_str(json).unwrap();
        assert_eq!(app.state, AppState::Running);
        assert_eq!(app.allocated_mb, 2048);
        assert_eq!(app.allocated_vcores, 2);
        assert_eq!(app.am_host_http_address.as_deref(), Some("node1:8042"));
    }

    #[test]
    fn metrics_and_nodes_tolerate_missing_fields() {
        let m: ClusterMetrics =
            serde_json::from_str(r#"{"activeNodes":1,"availableMB":1000}"#).unwrap();
        assert_eq!(m.active_nodes, 1);
        assert_eq!(m.available_mb, 1000);
        assert_eq!(m.available_virtual_cores, 0);

        let n: NodeInfo =
            serde_json::from_str(r#"{"id":"n1:45454","availMemoryMB":512,"availableVirtualCores":4}"#)
                .unwrap();
        assert_eq!(n.avail_memory_mb, 512);
        assert_eq!(n.available_virtual_cores, 4);
    }

    #[test]
    fn log_bundle_renders_each_container() {
        let mut logs = LogBundle::new();
        logs.insert(
            ContainerId::from("container_1_0001_01_000002"),
            ContainerLogs {
                node_id: "node1".into(),
                stdout: "hello".into(),
                stderr: String::new(),
            },
        );
        let text = logs.to_string();
        assert!(text.contains("### Container container_1_0001_01_000002, node node1 ###"));
        assert!(text.contains("## stdout ##\nhello"));
    }
}
