//! Bootstrapping an application through the bridge process.
//!
//! 1. bind a callback listener, spawn the bridge with its address
//! 2. read the bridge's RPC port from the callback (see [`read_port`])
//! 3. `submit`, then poll the bridge until the master reports its RPC endpoint
//! 4. connect to the master and `init`; the bridge channel is dropped
mod handshake;
mod process;

pub use handshake::{await_port, read_port};
pub use process::{BridgeProcess, OutputConfig};

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use knit_model::{AppId, ClusterConfig, ContainerRequest, Env};
use tokio::{net::TcpListener, time::Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    BridgeError, BridgeRpc, SupervisorRpc,
    rpc::{BridgeClient, RpcChannel, SupervisorClient},
};

const BRIDGE_JAR: &str = "knit-1.0-SNAPSHOT.jar";
const BRIDGE_MAIN: &str = "io.continuum.knit.Client";

/// What to submit and how the master should start it.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    /// Local files the bridge must stage before submission.
    pub upload_files: Vec<String>,
    /// Paths, as seen from the cluster, the master localizes into every container.
    pub resource_files: Vec<String>,
    pub env: Env,
    pub app_name: String,
    pub queue: String,
    pub command: String,
    pub containers: ContainerRequest,
}

/// A running application: its id, the master channel, and the bridge process kept for cleanup.
pub struct Session {
    pub app_id: AppId,
    pub supervisor: Arc<dyn SupervisorRpc>,
    pub process: Option<BridgeProcess>,
}

/// Starts applications on the cluster.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, request: &LaunchRequest) -> Result<Session, BridgeError>;
}

/// Settings for [`BootstrapBridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub program: String,
    /// Arguments before `--callbackHost h --callbackPort p`.
    pub args: Vec<String>,
    pub callback_host: String,
    /// Local directory holding the bridge jar.
    pub knit_home: PathBuf,
    pub replication_factor: u32,
    /// Writable home in the distributed store; the bridge stages under `<home>/.knitDeps`.
    pub hdfs_home: String,
    /// First hop: time for the bridge to report its port.
    pub handshake_timeout: Duration,
    /// Second hop: time for the cluster to schedule the master.
    pub supervisor_timeout: Duration,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
    /// SIGTERM-to-SIGKILL grace on teardown.
    pub shutdown_grace: Duration,
    pub output: OutputConfig,
}

impl BridgeConfig {
    pub fn new(knit_home: impl Into<PathBuf>) -> Self {
        let knit_home = knit_home.into();
        Self {
            program: "hadoop".to_string(),
            args: vec![
                "jar".to_string(),
                knit_home.join(BRIDGE_JAR).display().to_string(),
                BRIDGE_MAIN.to_string(),
            ],
            callback_host: "127.0.0.1".to_string(),
            knit_home,
            replication_factor: 3,
            hdfs_home: String::new(),
            handshake_timeout: Duration::from_secs(60),
            supervisor_timeout: Duration::from_secs(100),
            poll_interval: Duration::from_millis(200),
            rpc_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            output: OutputConfig::default(),
        }
    }

    pub fn from_cluster(conf: &ClusterConfig, knit_home: impl Into<PathBuf>) -> Self {
        Self {
            replication_factor: conf.replication_factor,
            hdfs_home: conf.hdfs_home.clone(),
            ..Self::new(knit_home)
        }
    }

    /// Replace the bridge executable and its leading arguments.
    pub fn with_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// The jar the bridge stages with every submission.
    pub fn jar_path(&self) -> PathBuf {
        self.knit_home.join(BRIDGE_JAR)
    }

    fn command_args(&self, callback_port: u16) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--callbackHost".to_string(),
            self.callback_host.clone(),
            "--callbackPort".to_string(),
            callback_port.to_string(),
        ]);
        args
    }

    /// The only channel for settings the bridge and master read at startup.
    fn env(&self) -> Vec<(String, String)> {
        vec![
            ("KNIT_HOME".to_string(), self.knit_home.display().to_string()),
            (
                "REPLICATION_FACTOR".to_string(),
                self.replication_factor.to_string(),
            ),
            ("HDFS_KNIT_DIR".to_string(), self.hdfs_home.clone()),
        ]
    }
}

/// [`Launcher`] that goes through a local bridge process.
pub struct BootstrapBridge {
    cfg: BridgeConfig,
}

impl BootstrapBridge {
    pub fn new(cfg: BridgeConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.cfg
    }

    async fn drive(
        &self,
        listener: &TcpListener,
        process: &mut BridgeProcess,
        request: &LaunchRequest,
    ) -> Result<(AppId, Arc<dyn SupervisorRpc>), BridgeError> {
        let cfg = &self.cfg;
        let bridge_port = await_port(listener, process.wait(), cfg.handshake_timeout).await?;
        debug!(bridge_port, "bridge reported its rpc port");

        let channel = RpcChannel::connect(&cfg.callback_host, bridge_port, cfg.rpc_timeout)
            .await
            .map_err(BridgeError::Submit)?;
        let bridge = BridgeClient::new(channel);
        let (app_id, host, port) =
            locate_supervisor(&bridge, request, cfg.supervisor_timeout, cfg.poll_interval).await?;
        drop(bridge);

        let init_failed = |source| BridgeError::Init {
            app_id: app_id.clone(),
            source,
        };
        let channel = RpcChannel::connect(&host, port, cfg.rpc_timeout)
            .await
            .map_err(init_failed)?;
        let supervisor = SupervisorClient::new(channel);
        supervisor
            .init(
                &request.resource_files,
                &request.env,
                &request.command,
                request.containers,
            )
            .await
            .map_err(init_failed)?;
        info!(%app_id, master = %supervisor.peer(), "application master initialized");
        Ok((app_id, Arc::new(supervisor)))
    }
}

#[async_trait]
impl Launcher for BootstrapBridge {
    #[instrument(level = "debug", skip(self, request), fields(app_name = %request.app_name))]
    async fn launch(&self, request: &LaunchRequest) -> Result<Session, BridgeError> {
        let cfg = &self.cfg;
        let listener = TcpListener::bind((cfg.callback_host.as_str(), 0)).await?;
        let callback_port = listener.local_addr()?.port();

        let mut process = BridgeProcess::spawn(
            &cfg.program,
            &cfg.command_args(callback_port),
            &cfg.env(),
            cfg.output,
        )?;

        match self.drive(&listener, &mut process, request).await {
            Ok((app_id, supervisor)) => Ok(Session {
                app_id,
                supervisor,
                process: Some(process),
            }),
            Err(err) => {
                if let Err(e) = process.shutdown(cfg.shutdown_grace).await {
                    warn!(error = %e, "bridge teardown after failed launch");
                }
                Err(err)
            }
        }
    }
}

/// Submit through the bridge and poll until the master's RPC endpoint is known.
///
/// A port of `-1` (or anything outside 1..=65535) means the master is not up yet.
pub async fn locate_supervisor(
    bridge: &dyn BridgeRpc,
    request: &LaunchRequest,
    deadline: Duration,
    interval: Duration,
) -> Result<(AppId, String, u16), BridgeError> {
    let app_id = bridge
        .submit(
            &request.upload_files,
            &request.env,
            &request.app_name,
            &request.queue,
        )
        .await
        .map_err(BridgeError::Submit)?;
    info!(%app_id, "application submitted");

    let started = Instant::now();
    loop {
        let port = bridge.rpc_port().await.map_err(|source| BridgeError::Poll {
            app_id: app_id.clone(),
            source,
        })?;
        if let Some(port) = u16::try_from(port).ok().filter(|p| *p != 0) {
            let host = bridge.rpc_host().await.map_err(|source| BridgeError::Poll {
                app_id: app_id.clone(),
                source,
            })?;
            debug!(%app_id, %host, port, "application master is listening");
            return Ok((app_id, host, port));
        }
        if started.elapsed() >= deadline {
            return Err(BridgeError::SupervisorUnreachable {
                app_id,
                waited_secs: deadline.as_secs(),
            });
        }
        tokio::time::sleep(interval).await;
    }
}
