use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum BridgeCall {
    #[serde(rename_all = "camelCase")]
    Submit {
        files: Vec<String>,
        env: BTreeMap<String, String>,
        app_name: String,
        queue: String,
    },
    GetRpcPort,
    GetRpcHost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum SupervisorCall {
    #[serde(rename_all = "camelCase")]
    Init {
        resource_files: Vec<String>,
        env: BTreeMap<String, String>,
        command: String,
        num_containers: u32,
        vcores: u32,
        memory_mb: u64,
    },
    #[serde(rename_all = "camelCase")]
    AddContainers { n: u32, vcores: u32, memory_mb: u64 },
    #[serde(rename_all = "camelCase")]
    RemoveContainer { container_id: String },
    Kill,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RpcReply {
    Ok {
        #[serde(default)]
        result: serde_json::Value,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_use_method_and_params() {
        let line = serde_json::to_string(&SupervisorCall::AddContainers {
            n: 2,
            vcores: 1,
            memory_mb: 1024,
        })
        .unwrap();
        assert_eq!(
            line,
            r#"{"method":"addContainers","params":{"n":2,"vcores":1,"memoryMb":1024}}"#
        );

        let line = serde_json::to_string(&BridgeCall::GetRpcPort).unwrap();
        assert_eq!(line, r#"{"method":"getRpcPort"}"#);
    }

    #[test]
    fn replies_decode() {
        let ok: RpcReply = serde_json::from_str(r#"{"status":"ok","result":8765}"#).unwrap();
        assert_eq!(
            ok,
            RpcReply::Ok {
                result: serde_json::json!(8765)
            }
        );
        let unit: RpcReply = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(
            unit,
            RpcReply::Ok {
                result: serde_json::Value::Null
            }
        );
        let err: RpcReply =
            serde_json::from_str(r#"{"status":"error","message":"no such container"}"#).unwrap();
        assert!(matches!(err, RpcReply::Error { message } if message == "no such container"));
    }
}
