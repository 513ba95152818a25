mod wire;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use knit_model::{
    AppAttempt, AppId, AppState, AppStatistics, AppSummary, AuthMode, ClusterConfig, ClusterInfo,
    ClusterMetrics, ContainerId, ContainerInfo, ContainerLogs, DEFAULT_APP_NAME, FixedDelay,
    LogBundle, NodeInfo,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::{
    ClusterCli, ResourceManager, ShellCli, YarnError, YarnResult, extract_log_content,
    parse_aggregated_logs,
};
use wire::*;

const KILLED_MARKER: &str = "Killed application";

/// Connection settings for [`YarnApi`].
#[derive(Debug, Clone)]
pub struct YarnApiConfig {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
    /// Prefix inserted before `/ws/v1/` when the manager sits behind a gateway.
    pub gateway_path: String,
    pub user: String,
    pub auth: AuthMode,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Pacing of the archived-log fetch.
    pub log_retry: FixedDelay,
    /// Name `kill_all(owned_only = true)` restricts itself to.
    pub owned_name: String,
}

impl YarnApiConfig {
    pub fn new(scheme: &'static str, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
            gateway_path: String::new(),
            user: String::new(),
            auth: AuthMode::Anonymous,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            log_retry: FixedDelay::default(),
            owned_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    /// Endpoint and credentials as resolved from cluster configuration.
    pub fn from_cluster(conf: &ClusterConfig) -> Self {
        let (scheme, host, port) = conf.rm_endpoint();
        Self {
            gateway_path: conf.gateway_path.clone(),
            user: conf.user.clone(),
            auth: conf.auth.clone(),
            ..Self::new(scheme, host, port)
        }
    }

    pub fn with_log_retry(mut self, retry: FixedDelay) -> Self {
        self.log_retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn base_url(&self) -> String {
        let gateway = self.gateway_path.trim_matches('/');
        if gateway.is_empty() {
            format!("{}://{}:{}/ws/v1/", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{gateway}/ws/v1/", self.scheme, self.host, self.port)
        }
    }
}

/// Resource-manager client over REST, with the cluster CLI as second channel.
pub struct YarnApi {
    http: reqwest::Client,
    base: String,
    scheme: &'static str,
    credentials: Option<(String, String)>,
    cli: Arc<dyn ClusterCli>,
    log_retry: FixedDelay,
    owned_name: String,
}

impl YarnApi {
    pub fn new(cfg: YarnApiConfig) -> YarnResult<Self> {
        let base = cfg.base_url();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|e| YarnError::Connection {
                endpoint: base.clone(),
                timeout: false,
                reason: e.to_string(),
            })?;
        let credentials = match &cfg.auth {
            AuthMode::Simple { password } => Some((cfg.user.clone(), password.clone())),
            AuthMode::Anonymous | AuthMode::Kerberos => None,
        };

        Ok(Self {
            http,
            base,
            scheme: cfg.scheme,
            credentials,
            cli: Arc::new(ShellCli::default()),
            log_retry: cfg.log_retry,
            owned_name: cfg.owned_name,
        })
    }

    /// Replace the CLI used for archived logs and kill fallback.
    pub fn with_cli(mut self, cli: Arc<dyn ClusterCli>) -> Self {
        self.cli = cli;
        self
    }

    /// Root of the REST API, ending in `/ws/v1/`.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.credentials {
            Some((user, password)) => req.basic_auth(user, Some(password)),
            None => req,
        }
    }

    fn transport(&self, err: reqwest::Error) -> YarnError {
        if err.is_decode() || err.is_body() {
            return YarnError::Decode(err.to_string());
        }
        YarnError::Connection {
            endpoint: self.base.clone(),
            timeout: err.is_timeout(),
            reason: err.to_string(),
        }
    }

    async fn send(&self, req: RequestBuilder) -> YarnResult<Response> {
        let resp = req.send().await.map_err(|e| self.transport(e))?;
        verify(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> YarnResult<T> {
        debug!(%url, "querying resource manager");
        let resp = self.send(self.request(Method::GET, url)).await?;
        resp.json::<T>().await.map_err(|e| self.transport(e))
    }

    async fn get_text(&self, url: &str) -> YarnResult<String> {
        let resp = self.send(self.request(Method::GET, url)).await?;
        resp.text().await.map_err(|e| self.transport(e))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Ids of every application the cluster knows about.
    pub async fn app_ids(&self) -> YarnResult<Vec<AppId>> {
        Ok(self
            .list_applications()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect())
    }

    pub async fn cluster_info(&self) -> YarnResult<ClusterInfo> {
        let env: ClusterInfoEnvelope = self.get_json(&self.url("cluster")).await?;
        Ok(env.cluster_info)
    }

    /// Scheduler queues and their usage; the shape depends on the scheduler in use.
    pub async fn scheduler(&self) -> YarnResult<serde_json::Value> {
        let mut body: serde_json::Value = self.get_json(&self.url("cluster/scheduler")).await?;
        if let Some(inner) = body.get_mut("scheduler").map(serde_json::Value::take) {
            return Ok(inner);
        }
        Ok(body)
    }

    pub async fn app_statistics(&self) -> YarnResult<AppStatistics> {
        let env: StatisticsEnvelope = self.get_json(&self.url("cluster/appstatistics")).await?;
        let mut stats = AppStatistics::new();
        for item in env.app_stat_info.stat_item {
            match item.state.parse::<AppState>() {
                Ok(state) => *stats.entry(state).or_default() += item.count,
                Err(err) => debug!(state = %item.state, %err, "skipping unknown state"),
            }
        }
        Ok(stats)
    }

    pub async fn app_attempts(&self, id: &AppId) -> YarnResult<Vec<AppAttempt>> {
        let env: AttemptsEnvelope = self
            .get_json(&self.url(&format!("cluster/apps/{id}/appattempts")))
            .await?;
        Ok(env.app_attempts.map(|a| a.app_attempt).unwrap_or_default())
    }

    /// Single container, asked of the node manager hosting the application master.
    pub async fn container_status(
        &self,
        id: &AppId,
        container: &ContainerId,
    ) -> YarnResult<ContainerInfo> {
        let host = self.master_host(id).await?;
        let url = format!("{}://{host}/ws/v1/node/containers/{container}", self.scheme);
        let env: ContainerEnvelope = self.get_json(&url).await?;
        Ok(env.container)
    }

    /// Kill every live application, or only those named like ours when `owned_only`.
    ///
    /// Returns the ids that were asked to die.
    #[instrument(level = "debug", skip(self))]
    pub async fn kill_all(&self, owned_only: bool) -> YarnResult<Vec<AppId>> {
        let mut killed = Vec::new();
        for app in self.list_applications().await? {
            if owned_only && app.name != self.owned_name {
                continue;
            }
            if app.state.is_terminal() {
                continue;
            }
            let confirmed = self.kill(&app.id).await;
            info!(app_id = %app.id, confirmed, "kill requested");
            killed.push(app.id);
        }
        Ok(killed)
    }

    async fn master_host(&self, id: &AppId) -> YarnResult<String> {
        self.application(id)
            .await?
            .am_host_http_address
            .filter(|h| !h.is_empty())
            .ok_or_else(|| YarnError::NoMasterHost(id.clone()))
    }

    async fn live_logs(&self, id: &AppId) -> YarnResult<LogBundle> {
        let mut bundle = LogBundle::new();
        for c in self.containers(id).await? {
            let stdout = self
                .get_text(&format!("{}/stdout/?start=0", c.container_logs_link))
                .await?;
            let stderr = self
                .get_text(&format!("{}/stderr/?start=0", c.container_logs_link))
                .await?;
            bundle.insert(
                c.id,
                ContainerLogs {
                    node_id: c.node_id,
                    stdout: extract_log_content(&stdout),
                    stderr: extract_log_content(&stderr),
                },
            );
        }
        Ok(bundle)
    }

    async fn archived_logs(&self, id: &AppId) -> YarnResult<LogBundle> {
        let args = vec![
            "logs".to_string(),
            "-applicationId".to_string(),
            id.to_string(),
        ];
        let attempts = self.log_retry.attempts();
        for attempt in 1..=attempts {
            match self.cli.run(&args).await {
                Ok(out) if out.success => return Ok(parse_aggregated_logs(&out.combined())),
                Ok(out) => {
                    warn!(app_id = %id, attempt, stderr = %out.stderr.trim(), "archived logs not ready")
                }
                Err(err) => warn!(app_id = %id, attempt, error = %err, "archived logs fetch failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.log_retry.delay()).await;
            }
        }
        Err(YarnError::LogsUnavailable {
            app_id: id.clone(),
            attempts,
        })
    }

    async fn kill_via_rest(&self, id: &AppId) -> YarnResult<bool> {
        let req = self
            .request(Method::PUT, &self.url(&format!("cluster/apps/{id}/state")))
            .json(&StateBody {
                state: AppState::Killed,
            });
        let body: StateBody = self
            .send(req)
            .await?
            .json()
            .await
            .map_err(|e| self.transport(e))?;
        Ok(body.state == AppState::Killed)
    }

    async fn kill_via_cli(&self, id: &AppId) -> YarnResult<bool> {
        let args = vec![
            "application".to_string(),
            "-kill".to_string(),
            id.to_string(),
        ];
        let out = self.cli.run(&args).await?;
        Ok(out.combined().contains(KILLED_MARKER))
    }
}

#[async_trait]
impl ResourceManager for YarnApi {
    async fn list_applications(&self) -> YarnResult<Vec<AppSummary>> {
        let env: AppsEnvelope = self.get_json(&self.url("cluster/apps")).await?;
        Ok(env.apps.map(|a| a.app).unwrap_or_default())
    }

    async fn application(&self, id: &AppId) -> YarnResult<AppSummary> {
        let env: AppEnvelope = self.get_json(&self.url(&format!("cluster/apps/{id}"))).await?;
        Ok(env.app)
    }

    async fn state(&self, id: &AppId) -> YarnResult<AppState> {
        let body: StateBody = self
            .get_json(&self.url(&format!("cluster/apps/{id}/state")))
            .await?;
        Ok(body.state)
    }

    #[instrument(level = "debug", skip(self), fields(app_id = %id))]
    async fn containers(&self, id: &AppId) -> YarnResult<Vec<ContainerInfo>> {
        let host = self.master_host(id).await?;
        let url = format!("{}://{host}/ws/v1/node/containers", self.scheme);
        let env: ContainersEnvelope = self.get_json(&url).await?;
        let mine: Vec<ContainerInfo> = env
            .containers
            .map(|c| c.container)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.id.belongs_to(id))
            .collect();
        if mine.is_empty() {
            return Err(YarnError::NoContainers(id.clone()));
        }
        Ok(mine)
    }

    #[instrument(level = "debug", skip(self), fields(app_id = %id))]
    async fn logs(&self, id: &AppId, archived: bool) -> YarnResult<LogBundle> {
        // Node managers drop live log buffers once the application stops running.
        if !archived {
            match self.state(id).await {
                Ok(AppState::Running) => match self.live_logs(id).await {
                    Ok(bundle) => return Ok(bundle),
                    Err(err) => warn!(error = %err, "live logs unavailable; using archived logs"),
                },
                Ok(state) => debug!(%state, "application not running; using archived logs"),
                Err(err) => warn!(error = %err, "state unknown; using archived logs"),
            }
        }
        self.archived_logs(id).await
    }

    async fn cluster_metrics(&self) -> YarnResult<ClusterMetrics> {
        let env: MetricsEnvelope = self.get_json(&self.url("cluster/metrics")).await?;
        Ok(env.cluster_metrics)
    }

    async fn nodes(&self) -> YarnResult<Vec<NodeInfo>> {
        let env: NodesEnvelope = self.get_json(&self.url("cluster/nodes")).await?;
        Ok(env.nodes.map(|n| n.node).unwrap_or_default())
    }

    #[instrument(level = "debug", skip(self), fields(app_id = %id))]
    async fn kill(&self, id: &AppId) -> bool {
        match self.kill_via_rest(id).await {
            Ok(true) => return true,
            Ok(false) => debug!("kill accepted but not yet confirmed; asking the CLI"),
            Err(err) => debug!(error = %err, "REST kill failed; asking the CLI"),
        }
        match self.kill_via_cli(id).await {
            Ok(confirmed) => confirmed,
            Err(err) => {
                warn!(error = %err, "kill could not be confirmed");
                false
            }
        }
    }
}

/// Turn a non-success status into [`YarnError::Remote`], preferring the server's own message.
async fn verify(resp: Response) -> YarnResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RemoteExceptionEnvelope>(&text)
        .map(|e| e.remote_exception.message)
        .unwrap_or(text);
    Err(YarnError::Remote {
        status: status.as_u16(),
        message,
    })
}
