//! The distributed store files are staged into before launch.
//!
//! Only the few queries the controller needs are modelled; uploading itself is
//! done by the bridge during submission.
use std::{path::Path, time::UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("distributed filesystem error on {path}: {reason}")]
pub struct FsError {
    pub path: String,
    pub reason: String,
}

/// Metadata of a file already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFile {
    pub size: u64,
    /// Last modification, milliseconds since the epoch.
    pub modified_ms: i64,
}

/// Raw capacity figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsUsage {
    pub capacity: u64,
    pub used: u64,
}

impl FsUsage {
    pub fn free(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }
}

#[async_trait]
pub trait DistributedFs: Send + Sync {
    /// `None` when nothing exists at `path`.
    async fn stat(&self, path: &str) -> Result<Option<RemoteFile>, FsError>;

    async fn usage(&self) -> Result<FsUsage, FsError>;

    /// Full paths of the entries directly under `dir`.
    async fn list(&self, dir: &str) -> Result<Vec<String>, FsError>;
}

/// Size and modification time of a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFile {
    pub size: u64,
    pub modified_ms: i64,
}

impl LocalFile {
    pub async fn stat(path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Ok(Self {
            size: meta.len(),
            modified_ms,
        })
    }
}

/// A local file can be skipped when the staged copy has the same size and was
/// written after the local file last changed.
pub fn is_current(local: LocalFile, remote: Option<RemoteFile>) -> bool {
    match remote {
        Some(remote) => remote.size == local.size && local.modified_ms < remote.modified_ms,
        None => false,
    }
}

/// Decide whether `local_path` must be uploaded to `staged_path`.
///
/// Store errors are treated as "not present".
pub async fn needs_upload(
    fs: Option<&dyn DistributedFs>,
    local: LocalFile,
    staged_path: &str,
) -> bool {
    let Some(fs) = fs else {
        return true;
    };
    match fs.stat(staged_path).await {
        Ok(remote) => !is_current(local, remote),
        Err(err) => {
            debug!(path = %staged_path, error = %err, "stat failed; uploading");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: LocalFile = LocalFile {
        size: 100,
        modified_ms: 1_000,
    };

    #[test]
    fn same_size_and_newer_copy_is_current() {
        assert!(is_current(
            LOCAL,
            Some(RemoteFile {
                size: 100,
                modified_ms: 2_000
            })
        ));
    }

    #[test]
    fn changed_or_missing_copy_is_stale() {
        assert!(!is_current(LOCAL, None));
        assert!(!is_current(
            LOCAL,
            Some(RemoteFile {
                size: 101,
                modified_ms: 2_000
            })
        ));
        assert!(!is_current(
            LOCAL,
            Some(RemoteFile {
                size: 100,
                modified_ms: 500
            })
        ));
    }

    #[test]
    fn free_space_saturates() {
        let usage = FsUsage {
            capacity: 10,
            used: 20,
        };
        assert_eq!(usage.free(), 0);
    }

    #[tokio::test]
    async fn directories_are_not_local_files() {
        let err = LocalFile::stat(&std::env::temp_dir()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
