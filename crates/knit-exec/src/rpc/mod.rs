//! Typed RPC to the bridge process and to the application master.
//!
//! ## Wire format: NDJSON
//!
//! One request object per line, answered by exactly one reply line:
//!
//! ```text
//! -> {"method":"addContainers","params":{"n":2,"vcores":1,"memoryMb":1024}}
//! <- {"status":"ok","result":null}
//! ```
//!
//! Calls on one channel are serialized.
mod channel;
mod protocol;

pub use channel::{BridgeClient, RpcChannel, SupervisorClient};
pub use protocol::{BridgeCall, RpcReply, SupervisorCall};

use async_trait::async_trait;
use knit_model::{AppId, ContainerId, ContainerRequest, Env};

use crate::RpcError;

/// Short-lived channel to the bridge process, used only during submission.
#[async_trait]
pub trait BridgeRpc: Send + Sync {
    async fn submit(
        &self,
        files: &[String],
        env: &Env,
        app_name: &str,
        queue: &str,
    ) -> Result<AppId, RpcError>;

    /// Master's RPC port; `-1` until the cluster has scheduled it.
    async fn rpc_port(&self) -> Result<i32, RpcError>;

    async fn rpc_host(&self) -> Result<String, RpcError>;
}

/// Long-lived channel to the application master.
#[async_trait]
pub trait SupervisorRpc: Send + Sync {
    async fn init(
        &self,
        resource_files: &[String],
        env: &Env,
        command: &str,
        request: ContainerRequest,
    ) -> Result<(), RpcError>;

    async fn add_containers(&self, request: ContainerRequest) -> Result<(), RpcError>;

    async fn remove_container(&self, id: &ContainerId) -> Result<(), RpcError>;

    /// `true` when the master confirmed shutdown.
    async fn kill(&self) -> Result<bool, RpcError>;

    /// Master's own view of the application state.
    async fn status(&self) -> Result<String, RpcError>;
}
