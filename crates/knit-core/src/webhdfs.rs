//! [`DistributedFs`] over the NameNode's WebHDFS REST interface.
use std::time::Duration;

use async_trait::async_trait;
use knit_model::ClusterConfig;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::fs::{DistributedFs, FsError, FsUsage, RemoteFile};

const DEFAULT_HTTP_PORT: u16 = 9870;
const DEFAULT_HTTPS_PORT: u16 = 9871;

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(rename = "FileStatus")]
    file: FileStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    modification_time: i64,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    #[serde(rename = "FileStatuses")]
    statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    entries: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
struct FsStatusBody {
    #[serde(rename = "FsStatus")]
    status: FsStatus,
}

#[derive(Debug, Deserialize)]
struct FsStatus {
    capacity: u64,
    used: u64,
}

/// WebHDFS client for the queries the controller issues.
pub struct WebHdfs {
    http: reqwest::Client,
    base: String,
    user: String,
}

impl WebHdfs {
    /// `base` is the NameNode web address, e.g. `http://nn:9870`.
    pub fn new(base: impl Into<String>, user: impl Into<String>) -> Result<Self, FsError> {
        let base = base.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FsError {
                path: base.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base,
            user: user.into(),
        })
    }

    /// NameNode web address from `dfs.namenode.http(s)-address`, falling back to
    /// the configured NameNode host on the default web port.
    pub fn from_cluster(conf: &ClusterConfig) -> Result<Self, FsError> {
        let https = conf.get("dfs.http.policy") == Some("HTTPS_ONLY");
        let (scheme, key, port) = if https {
            ("https", "dfs.namenode.https-address", DEFAULT_HTTPS_PORT)
        } else {
            ("http", "dfs.namenode.http-address", DEFAULT_HTTP_PORT)
        };
        let configured = conf.get(key).and_then(|addr| addr.rsplit_once(':'));
        let port = configured
            .and_then(|(_, p)| p.parse::<u16>().ok())
            .unwrap_or(port);
        // The stock value binds every interface; clients reach the NameNode host.
        let addr = match configured {
            Some((host, _)) if !host.is_empty() && host != "0.0.0.0" => format!("{host}:{port}"),
            _ => format!("{}:{port}", conf.nn),
        };
        Self::new(format!("{scheme}://{addr}"), conf.user.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str, op: &str) -> String {
        format!(
            "{}/webhdfs/v1{}?op={op}&user.name={}",
            self.base,
            fs_path(path),
            self.user
        )
    }

    /// `Ok(None)` on 404.
    async fn get<T: DeserializeOwned>(&self, path: &str, op: &str) -> Result<Option<T>, FsError> {
        let url = self.url(path, op);
        let err = |reason: String| FsError {
            path: path.to_string(),
            reason,
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| err(format!("{op}: {e}")))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => resp
                .json()
                .await
                .map(Some)
                .map_err(|e| err(format!("{op}: malformed reply: {e}"))),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(err(format!("{op}: HTTP {status}: {}", body.trim())))
            }
        }
    }
}

/// Path component of `hdfs://authority/path` or a bare path, with a leading slash.
fn fs_path(path: &str) -> String {
    let bare = match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => path,
    };
    if bare.starts_with('/') {
        bare.to_string()
    } else {
        format!("/{bare}")
    }
}

#[async_trait]
impl DistributedFs for WebHdfs {
    #[instrument(level = "debug", skip(self))]
    async fn stat(&self, path: &str) -> Result<Option<RemoteFile>, FsError> {
        let body: Option<StatusBody> = self.get(path, "GETFILESTATUS").await?;
        Ok(body.map(|b| RemoteFile {
            size: b.file.length,
            modified_ms: b.file.modification_time,
        }))
    }

    async fn usage(&self) -> Result<FsUsage, FsError> {
        let body: FsStatusBody = self.get("/", "GETSTATUS").await?.ok_or_else(|| FsError {
            path: "/".into(),
            reason: "GETSTATUS not supported by this NameNode".into(),
        })?;
        Ok(FsUsage {
            capacity: body.status.capacity,
            used: body.status.used,
        })
    }

    /// A missing directory lists as empty.
    async fn list(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let dir = dir.trim_end_matches('/');
        let Some(body) = self.get::<ListBody>(dir, "LISTSTATUS").await? else {
            debug!(%dir, "directory absent");
            return Ok(Vec::new());
        };
        Ok(body
            .statuses
            .entries
            .into_iter()
            .map(|e| format!("{dir}/{}", e.path_suffix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_lose_scheme_and_authority() {
        assert_eq!(fs_path("hdfs://nn:8020/user/a/.knitDeps"), "/user/a/.knitDeps");
        assert_eq!(fs_path("hdfs://nn:8020"), "/");
        assert_eq!(fs_path("/user/a"), "/user/a");
        assert_eq!(fs_path("user/a"), "/user/a");
    }

    #[test]
    fn wildcard_bind_address_resolves_to_namenode_host() {
        let conf = ClusterConfig::from_overrides(knit_model::Overrides {
            nn: Some("nn.example".into()),
            user: Some("alice".into()),
            raw: [(
                "dfs.namenode.http-address".to_string(),
                "0.0.0.0:50070".to_string(),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        })
        .unwrap();
        let fs = WebHdfs::from_cluster(&conf).unwrap();
        assert_eq!(fs.base_url(), "http://nn.example:50070");
        assert_eq!(
            fs.url("/user/alice", "LISTSTATUS"),
            "http://nn.example:50070/webhdfs/v1/user/alice?op=LISTSTATUS&user.name=alice"
        );
    }
}
