use std::time::Duration;

use async_trait::async_trait;
use knit_model::{AppId, ContainerId, ContainerRequest, Env};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    time::timeout,
};
use tracing::{debug, trace, warn};

use super::{BridgeCall, BridgeRpc, RpcReply, SupervisorCall, SupervisorRpc};
use crate::RpcError;

struct Wire {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// One NDJSON connection; calls are serialized by an internal lock.
///
/// A call that times out or fails mid-exchange leaves the stream out of step
/// with its replies, so the wire is dropped and every later call fails with
/// [`RpcError::Closed`].
pub struct RpcChannel {
    peer: String,
    call_timeout: Duration,
    wire: Mutex<Option<Wire>>,
}

impl RpcChannel {
    pub async fn connect(host: &str, port: u16, call_timeout: Duration) -> Result<Self, RpcError> {
        let stream = timeout(call_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| RpcError::Timeout(call_timeout))??;
        stream.set_nodelay(true)?;
        debug!(peer = %format!("{host}:{port}"), "rpc channel connected");
        Ok(Self::from_stream(stream, format!("{host}:{port}"), call_timeout))
    }

    pub fn from_stream(stream: TcpStream, peer: String, call_timeout: Duration) -> Self {
        let (read, writer) = stream.into_split();
        Self {
            peer,
            call_timeout,
            wire: Mutex::new(Some(Wire {
                reader: BufReader::new(read),
                writer,
            })),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one call and decode the `result` of its reply.
    pub async fn call<C, T>(&self, call: &C) -> Result<T, RpcError>
    where
        C: Serialize + std::fmt::Debug + Sync,
        T: DeserializeOwned,
    {
        let mut line = serde_json::to_vec(call)?;
        line.push(b'\n');

        let mut guard = self.wire.lock().await;
        let Some(wire) = guard.as_mut() else {
            return Err(RpcError::Closed);
        };
        trace!(peer = %self.peer, ?call, "rpc call");
        let exchange = async {
            wire.writer.write_all(&line).await?;
            wire.writer.flush().await?;
            let mut reply = String::new();
            if wire.reader.read_line(&mut reply).await? == 0 {
                return Err(RpcError::Closed);
            }
            Ok::<_, RpcError>(reply)
        };
        let outcome = timeout(self.call_timeout, exchange)
            .await
            .map_err(|_| RpcError::Timeout(self.call_timeout))
            .and_then(|res| res);
        let reply = match outcome {
            Ok(reply) => reply,
            Err(err) => {
                warn!(peer = %self.peer, error = %err, "rpc channel broken");
                *guard = None;
                return Err(err);
            }
        };

        match serde_json::from_str::<RpcReply>(&reply)? {
            RpcReply::Ok { result } => Ok(serde_json::from_value(result)?),
            RpcReply::Error { message } => Err(RpcError::Remote(message)),
        }
    }
}

/// [`BridgeRpc`] over an [`RpcChannel`].
pub struct BridgeClient {
    channel: RpcChannel,
}

impl BridgeClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl BridgeRpc for BridgeClient {
    async fn submit(
        &self,
        files: &[String],
        env: &Env,
        app_name: &str,
        queue: &str,
    ) -> Result<AppId, RpcError> {
        let id: String = self
            .channel
            .call(&BridgeCall::Submit {
                files: files.to_vec(),
                env: env.to_map(),
                app_name: app_name.to_string(),
                queue: queue.to_string(),
            })
            .await?;
        Ok(AppId::new(id))
    }

    async fn rpc_port(&self) -> Result<i32, RpcError> {
        self.channel.call(&BridgeCall::GetRpcPort).await
    }

    async fn rpc_host(&self) -> Result<String, RpcError> {
        self.channel.call(&BridgeCall::GetRpcHost).await
    }
}

/// [`SupervisorRpc`] over an [`RpcChannel`].
pub struct SupervisorClient {
    channel: RpcChannel,
}

impl SupervisorClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn peer(&self) -> &str {
        self.channel.peer()
    }
}

#[async_trait]
impl SupervisorRpc for SupervisorClient {
    async fn init(
        &self,
        resource_files: &[String],
        env: &Env,
        command: &str,
        request: ContainerRequest,
    ) -> Result<(), RpcError> {
        self.channel
            .call(&SupervisorCall::Init {
                resource_files: resource_files.to_vec(),
                env: env.to_map(),
                command: command.to_string(),
                num_containers: request.count,
                vcores: request.vcores,
                memory_mb: request.memory_mb,
            })
            .await
    }

    async fn add_containers(&self, request: ContainerRequest) -> Result<(), RpcError> {
        self.channel
            .call(&SupervisorCall::AddContainers {
                n: request.count,
                vcores: request.vcores,
                memory_mb: request.memory_mb,
            })
            .await
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), RpcError> {
        self.channel
            .call(&SupervisorCall::RemoveContainer {
                container_id: id.to_string(),
            })
            .await
    }

    async fn kill(&self) -> Result<bool, RpcError> {
        self.channel.call(&SupervisorCall::Kill).await
    }

    async fn status(&self) -> Result<String, RpcError> {
        self.channel.call(&SupervisorCall::Status).await
    }
}
