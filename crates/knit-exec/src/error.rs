use std::time::Duration;

use knit_model::AppId;
use thiserror::Error;

/// Failure of one call on an RPC channel.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rpc codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("rpc peer closed the connection")]
    Closed,

    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with an error reply.
    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Failure while bootstrapping an application through the bridge process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Spawn failed, the process exited early, or it never reported a port in time.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// Peer closed the callback connection without writing anything.
    #[error("bootstrap failed: no data received on callback connection")]
    NoData,

    #[error("bridge submit call failed: {0}")]
    Submit(#[source] RpcError),

    #[error("bridge stopped answering while waiting for the master of {app_id}: {source}")]
    Poll {
        app_id: AppId,
        #[source]
        source: RpcError,
    },

    #[error(
        "Could not connect to the application master of {app_id} within {waited_secs}s.\n\
         Possible causes:\n  \
         - the cluster lacks the resources to start it: check cluster metrics and queue capacity\n  \
         - the application master crashed: check its logs (yarn logs -applicationId {app_id})\n  \
         - the cluster is unhealthy: check the ResourceManager and NameNode logs"
    )]
    SupervisorUnreachable { app_id: AppId, waited_secs: u64 },

    #[error("application master of {app_id} rejected init: {source}")]
    Init {
        app_id: AppId,
        #[source]
        source: RpcError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Application id if the failure happened after the cluster accepted the submission.
    pub fn app_id(&self) -> Option<&AppId> {
        match self {
            BridgeError::Poll { app_id, .. }
            | BridgeError::SupervisorUnreachable { app_id, .. }
            | BridgeError::Init { app_id, .. } => Some(app_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_message_lists_diagnostics() {
        let err = BridgeError::SupervisorUnreachable {
            app_id: AppId::from("application_1_0001"),
            waited_secs: 100,
        };
        let msg = err.to_string();
        assert!(msg.lines().count() >= 4);
        assert!(msg.contains("within 100s"));
        assert!(msg.contains("resources"));
        assert!(msg.contains("yarn logs -applicationId application_1_0001"));
        assert!(msg.contains("NameNode"));
        assert_eq!(err.app_id(), Some(&AppId::from("application_1_0001")));
    }

    #[test]
    fn early_failures_carry_no_app_id() {
        assert!(BridgeError::NoData.app_id().is_none());
        assert!(BridgeError::Bootstrap("x".into()).app_id().is_none());
    }
}
