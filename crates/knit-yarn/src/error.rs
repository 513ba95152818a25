use knit_model::AppId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum YarnError {
    /// The transport never produced a response.
    #[error(
        "{} when talking to the YARN REST server at {endpoint}. This can mean that the \
         server/port values are wrong, that you are using the wrong protocol (http/https) \
         or that you need to route through a proxy. ({reason})",
        if *.timeout { "Connection timeout" } else { "Connection error" }
    )]
    Connection {
        endpoint: String,
        timeout: bool,
        reason: String,
    },

    /// The resource manager answered with a non-success status.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("unexpected response payload: {0}")]
    Decode(String),

    #[error("no containers available for {0}")]
    NoContainers(AppId),

    #[error("application {0} has no master host (not running?)")]
    NoMasterHost(AppId),

    #[error("retries exceeded when fetching logs for {app_id} ({attempts} attempts)")]
    LogsUnavailable { app_id: AppId, attempts: u32 },

    #[error("cluster CLI failed: {0}")]
    Cli(String),
}

impl YarnError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, YarnError::Connection { timeout: true, .. })
    }
}

pub type YarnResult<T> = Result<T, YarnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_message_names_endpoint_and_hints() {
        let err = YarnError::Connection {
            endpoint: "http://rm:8088/ws/v1/".into(),
            timeout: true,
            reason: "deadline".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Connection timeout"));
        assert!(msg.contains("http://rm:8088/ws/v1/"));
        assert!(msg.contains("proxy"));
        assert!(err.is_timeout());
    }

    #[test]
    fn remote_message_is_verbatim() {
        let err = YarnError::Remote {
            status: 404,
            message: "app with id: application_1_0001 not found".into(),
        };
        assert_eq!(err.to_string(), "app with id: application_1_0001 not found");
    }
}
