use knit_exec::{BridgeError, RpcError};
use knit_model::{AppId, ContainerId};
use knit_yarn::YarnError;
use thiserror::Error;

use crate::fs::FsError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Preflight rejected the request.
    #[error("insufficient cluster capacity: {0}")]
    Capacity(String),

    #[error("refusing to remove container {id}: {reason}")]
    ProtectedContainer { id: ContainerId, reason: String },

    #[error("application already started{}", .0.as_ref().map(|id| format!(" ({id})")).unwrap_or_default())]
    AlreadyStarted(Option<AppId>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("application not started")]
    NotStarted,

    #[error("no distributed filesystem attached")]
    NoFilesystem,

    #[error(transparent)]
    Yarn(#[from] YarnError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("application master call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Fs(#[from] FsError),
}
