//! Lifecycle of one application on the cluster.
//!
//! ```text
//! Unstarted -> SubmitFailed
//! Unstarted -> Running -> Finished | Failed | Killed
//! ```
//!
//! The controller never caches cluster state: containers and status are always
//! asked of the resource manager.
mod files;
pub use files::{LocalUpload, is_remote, local_uploads, resource_files, staged_path, triple_slash};

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc, time::Duration};

use knit_exec::{BridgeProcess, LaunchRequest, Launcher, Session, SupervisorRpc};
use knit_model::{
    AppId, AppState, AppSummary, ClusterConfig, ContainerId, ContainerInfo, ContainerRequest, Env,
    LaunchSpec, LifecycleState, LogBundle, RuntimeStatus, STAGING_DIR,
};
use knit_yarn::ResourceManager;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::CoreError,
    fs::{DistributedFs, LocalFile, needs_upload},
    metrics::{AppOutcome, MetricsHandle, noop_metrics},
    preflight::{Demand, Preflight},
    registry::AppRegistry,
};

/// Per-controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// `host:port` of the resource manager, for display.
    pub rm_address: String,
    /// Writable home in the distributed store.
    pub hdfs_home: String,
    /// Value of `KNIT_LANG` when the launch spec carries no environment.
    pub lang: String,
    pub min_allocation_mb: u64,
    /// Upload local files even when an identical copy is already staged.
    pub upload_always: bool,
    /// Local file the bridge uploads with every launch; counted by preflight.
    pub launch_artifact: Option<PathBuf>,
    /// Status polling interval.
    pub poll_interval: Duration,
    /// How long `kill` waits for the cluster to report a terminal state.
    pub kill_wait: Duration,
    /// SIGTERM-to-SIGKILL grace for the bridge process.
    pub shutdown_grace: Duration,
}

impl ControllerConfig {
    pub fn from_cluster(conf: &ClusterConfig) -> Self {
        let (_, host, port) = conf.rm_endpoint();
        Self {
            rm_address: format!("{host}:{port}"),
            hdfs_home: conf.hdfs_home.clone(),
            lang: conf.lang.clone(),
            min_allocation_mb: conf.min_allocation_mb,
            upload_always: false,
            launch_artifact: None,
            poll_interval: Duration::from_millis(200),
            kill_wait: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    pub fn staging_dir(&self) -> String {
        format!("{}/{STAGING_DIR}", self.hdfs_home.trim_end_matches('/'))
    }
}

struct Inner {
    lifecycle: LifecycleState,
    /// A `start` call is between its admission check and its outcome.
    starting: bool,
    app_id: Option<AppId>,
    supervisor: Option<Arc<dyn SupervisorRpc>>,
    process: Option<BridgeProcess>,
    submitted_at: Option<Instant>,
}

/// Why a `start` did not produce a running application.
enum StartFailure {
    /// Nothing reached the cluster; the controller stays `Unstarted`.
    Rejected(CoreError),
    /// The bridge was launched and failed.
    Launch(knit_exec::BridgeError),
}

/// Builder for [`AppController`].
pub struct ControllerBuilder {
    cfg: ControllerConfig,
    rm: Arc<dyn ResourceManager>,
    launcher: Arc<dyn Launcher>,
    fs: Option<Arc<dyn DistributedFs>>,
    metrics: MetricsHandle,
}

impl ControllerBuilder {
    pub fn filesystem(mut self, fs: Arc<dyn DistributedFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the controller and track it in `registry` for shutdown sweeps.
    pub fn build(self, registry: &AppRegistry) -> Arc<AppController> {
        let controller = Arc::new(AppController {
            cfg: self.cfg,
            rm: self.rm,
            launcher: self.launcher,
            fs: self.fs,
            metrics: self.metrics,
            inner: Mutex::new(Inner {
                lifecycle: LifecycleState::Unstarted,
                starting: false,
                app_id: None,
                supervisor: None,
                process: None,
                submitted_at: None,
            }),
        });
        registry.register(&controller);
        controller
    }
}

/// Owns one application from preflight to teardown.
pub struct AppController {
    cfg: ControllerConfig,
    rm: Arc<dyn ResourceManager>,
    launcher: Arc<dyn Launcher>,
    fs: Option<Arc<dyn DistributedFs>>,
    metrics: MetricsHandle,
    inner: Mutex<Inner>,
}

impl AppController {
    pub fn builder(
        cfg: ControllerConfig,
        rm: Arc<dyn ResourceManager>,
        launcher: Arc<dyn Launcher>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            cfg,
            rm,
            launcher,
            fs: None,
            metrics: noop_metrics(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.cfg
    }

    pub async fn app_id(&self) -> Option<AppId> {
        self.inner.lock().await.app_id.clone()
    }

    pub async fn lifecycle(&self) -> LifecycleState {
        self.inner.lock().await.lifecycle
    }

    /// Submit the application and bring up its master.
    ///
    /// Only the first call on a controller can succeed; any later call fails with
    /// [`CoreError::AlreadyStarted`] before touching the network.
    #[instrument(level = "debug", skip(self, spec), fields(app_name = %spec.app_name))]
    pub async fn start(&self, spec: LaunchSpec) -> Result<AppId, CoreError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.starting || inner.lifecycle != LifecycleState::Unstarted {
                return Err(CoreError::AlreadyStarted(inner.app_id.clone()));
            }
            inner.starting = true;
        }

        let outcome = self.submit(&spec).await;

        let mut inner = self.inner.lock().await;
        inner.starting = false;
        match outcome {
            Ok(Session {
                app_id,
                supervisor,
                process,
            }) => {
                inner.lifecycle = inner.lifecycle.advance(LifecycleState::Running);
                inner.app_id = Some(app_id.clone());
                inner.supervisor = Some(supervisor);
                inner.process = process;
                inner.submitted_at = Some(Instant::now());
                self.metrics.record_app_submitted();
                info!(%app_id, "application running");
                Ok(app_id)
            }
            Err(StartFailure::Rejected(err)) => {
                debug!(error = %err, "start rejected");
                Err(err)
            }
            Err(StartFailure::Launch(err)) => {
                inner.lifecycle = inner.lifecycle.advance(LifecycleState::SubmitFailed);
                inner.app_id = err.app_id().cloned();
                self.metrics
                    .record_app_finished(AppOutcome::SubmitFailed, 0);
                warn!(app_id = ?inner.app_id, error = %err, "launch failed");
                Err(err.into())
            }
        }
    }

    async fn submit(&self, spec: &LaunchSpec) -> Result<Session, StartFailure> {
        let request = self.prepare(spec).await.map_err(StartFailure::Rejected)?;
        self.launcher
            .launch(&request)
            .await
            .map_err(StartFailure::Launch)
    }

    /// Validation, preflight and upload selection; nothing here submits anything.
    async fn prepare(&self, spec: &LaunchSpec) -> Result<LaunchRequest, CoreError> {
        spec.validate()
            .map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
        let staging = self.cfg.staging_dir();
        let locals = local_uploads(&spec.files, &staging).await?;

        if spec.checks {
            let mut upload_bytes: u64 = locals.iter().map(|l| l.stat.size).sum();
            if let Some(artifact) = &self.cfg.launch_artifact {
                match LocalFile::stat(artifact).await {
                    Ok(stat) => upload_bytes += stat.size,
                    Err(err) => {
                        warn!(path = %artifact.display(), error = %err, "launch artifact not found")
                    }
                }
            }
            let mut preflight = Preflight::new(self.rm.clone(), self.cfg.min_allocation_mb);
            if let Some(fs) = &self.fs {
                preflight = preflight.with_filesystem(fs.clone());
            }
            preflight
                .check(Demand {
                    containers: spec.containers,
                    upload_bytes,
                })
                .await?;
        }

        let mut upload_files = Vec::new();
        for local in &locals {
            if self.cfg.upload_always || needs_upload(self.fs.as_deref(), local.stat, &local.staged).await {
                upload_files.push(local.path.clone());
            } else {
                debug!(path = %local.path, staged = %local.staged, "already staged; skipping upload");
            }
        }

        let env = spec
            .env
            .clone()
            .unwrap_or_else(|| Env::single("KNIT_LANG", self.cfg.lang.as_str()));

        Ok(LaunchRequest {
            upload_files,
            resource_files: resource_files(&spec.files, &staging),
            env,
            app_name: spec.app_name.clone(),
            queue: spec.queue.clone(),
            command: spec.command.clone(),
            containers: spec.containers,
        })
    }

    async fn started_id(&self) -> Result<AppId, CoreError> {
        self.inner
            .lock()
            .await
            .app_id
            .clone()
            .ok_or(CoreError::NotStarted)
    }

    async fn supervisor(&self) -> Result<Arc<dyn SupervisorRpc>, CoreError> {
        self.inner
            .lock()
            .await
            .supervisor
            .clone()
            .ok_or(CoreError::NotStarted)
    }

    /// Ask the master for more workers; the next status query shows them.
    #[instrument(level = "debug", skip(self))]
    pub async fn add_containers(&self, request: ContainerRequest) -> Result<(), CoreError> {
        request
            .validate()
            .map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
        let supervisor = self.supervisor().await?;
        supervisor.add_containers(request).await?;
        Ok(())
    }

    /// Current containers, master included.
    pub async fn containers(&self) -> Result<Vec<ContainerInfo>, CoreError> {
        let id = self.started_id().await?;
        Ok(self.rm.containers(&id).await?)
    }

    /// Container id to state.
    pub async fn container_statuses(&self) -> Result<BTreeMap<ContainerId, String>, CoreError> {
        Ok(self
            .containers()
            .await?
            .into_iter()
            .map(|c| (c.id, c.state))
            .collect())
    }

    /// Release one worker container.
    ///
    /// Refuses the master's own container (ordinal 1) without any network call, and
    /// any id the resource manager does not list for this application.
    #[instrument(level = "debug", skip(self), fields(container = %id))]
    pub async fn remove_container(&self, id: &ContainerId) -> Result<(), CoreError> {
        if id.is_supervisor() {
            return Err(CoreError::ProtectedContainer {
                id: id.clone(),
                reason: "it hosts the application master".into(),
            });
        }
        let app_id = self.started_id().await?;
        let supervisor = self.supervisor().await?;

        let known = self.rm.containers(&app_id).await?;
        if !known.iter().any(|c| &c.id == id) {
            return Err(CoreError::ProtectedContainer {
                id: id.clone(),
                reason: format!("not a container of {app_id}"),
            });
        }
        supervisor.remove_container(id).await?;
        info!(%app_id, "container removal requested");
        Ok(())
    }

    /// The resource manager's full record of the application.
    pub async fn status(&self) -> Result<AppSummary, CoreError> {
        let id = self.started_id().await?;
        Ok(self.rm.application(&id).await?)
    }

    /// The master's own report of its state.
    pub async fn supervisor_status(&self) -> Result<String, CoreError> {
        Ok(self.supervisor().await?.status().await?)
    }

    /// Cluster state of the application, or [`RuntimeStatus::None`] when it has not
    /// been submitted or the query failed. Never fails.
    pub async fn runtime_status(&self) -> RuntimeStatus {
        let Some(id) = self.inner.lock().await.app_id.clone() else {
            return RuntimeStatus::None;
        };
        match self.rm.state(&id).await {
            Ok(state) => {
                self.observe(state).await;
                RuntimeStatus::Known(state)
            }
            Err(err) => {
                warn!(app_id = %id, error = %err, "state query failed");
                RuntimeStatus::None
            }
        }
    }

    /// Fold an observed cluster state into the local lifecycle.
    async fn observe(&self, state: AppState) {
        let Some(next) = LifecycleState::from_terminal(state) else {
            return;
        };
        let mut inner = self.inner.lock().await;
        let before = inner.lifecycle;
        inner.lifecycle = before.advance(next);
        if before != inner.lifecycle
            && let Some(outcome) = AppOutcome::from_lifecycle(inner.lifecycle)
        {
            let duration_ms = inner
                .submitted_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or_default();
            self.metrics.record_app_finished(outcome, duration_ms);
            info!(app_id = ?inner.app_id, %state, duration_ms, "application reached a terminal state");
        }
    }

    /// Poll until a terminal state or `timeout`; `true` if a terminal state was seen.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.runtime_status().await.is_terminal() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.cfg.poll_interval.min(deadline - now)).await;
        }
    }

    /// Per-container logs; see [`ResourceManager::logs`].
    pub async fn logs(&self, archived: bool) -> Result<LogBundle, CoreError> {
        let id = self.started_id().await?;
        Ok(self.rm.logs(&id, archived).await?)
    }

    /// Environment archives already staged in the distributed store.
    pub async fn list_envs(&self) -> Result<Vec<String>, CoreError> {
        let fs = self.fs.as_ref().ok_or(CoreError::NoFilesystem)?;
        Ok(fs
            .list(&self.cfg.staging_dir())
            .await?
            .into_iter()
            .filter(|p| p.ends_with(".zip"))
            .collect())
    }

    /// Stop the application and tear down the bridge process.
    ///
    /// Tries the master first and falls back to the resource manager. Never fails;
    /// returns whether the cluster then reports the application as `KILLED`.
    #[instrument(level = "debug", skip(self))]
    pub async fn kill(&self) -> bool {
        let (app_id, supervisor, process) = {
            let mut inner = self.inner.lock().await;
            let Some(app_id) = inner.app_id.clone() else {
                debug!("kill on a controller that never started");
                return false;
            };
            (app_id, inner.supervisor.take(), inner.process.take())
        };

        let acknowledged = match supervisor {
            Some(supervisor) => match supervisor.kill().await {
                Ok(ack) => ack,
                Err(err) => {
                    warn!(%app_id, error = %err, "master kill failed; asking the resource manager");
                    self.metrics.record_fallback("kill_rm");
                    self.rm.kill(&app_id).await
                }
            },
            None => self.rm.kill(&app_id).await,
        };

        if let Some(mut process) = process {
            if let Err(err) = process.shutdown(self.cfg.shutdown_grace).await {
                warn!(%app_id, error = %err, "bridge process teardown failed");
            }
        }

        match self.await_terminal(&app_id).await {
            Some(state) => state == AppState::Killed,
            None => acknowledged,
        }
    }

    /// Poll the cluster state for up to `kill_wait`; `None` if it could not be read.
    async fn await_terminal(&self, app_id: &AppId) -> Option<AppState> {
        let deadline = Instant::now() + self.cfg.kill_wait;
        loop {
            let state = match self.rm.state(app_id).await {
                Ok(state) => state,
                Err(err) => {
                    warn!(%app_id, error = %err, "state after kill unknown");
                    return None;
                }
            };
            self.observe(state).await;
            if state.is_terminal() || Instant::now() >= deadline {
                return Some(state);
            }
            tokio::time::sleep(self.cfg.poll_interval).await;
        }
    }

    /// `true` while the application is running as far as this controller knows.
    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.lifecycle == LifecycleState::Running
    }
}

impl fmt::Display for AppController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Knit<RM={}>", self.cfg.rm_address)
    }
}

impl Drop for AppController {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.lifecycle == LifecycleState::Running {
            warn!(app_id = ?inner.app_id, "controller dropped while the application is running");
        }
        // Dropping the process signals its group.
        inner.process.take();
    }
}
