//! Launching an application through the bootstrap bridge, and the typed RPC
//! channels to the bridge and to the application master.
mod error;
pub use error::{BridgeError, RpcError};

pub mod rpc;
pub use rpc::{BridgeRpc, SupervisorRpc};

mod bridge;
pub use bridge::{
    BootstrapBridge, BridgeConfig, BridgeProcess, LaunchRequest, Launcher, OutputConfig, Session,
    await_port, locate_supervisor, read_port,
};
