//! Naming of staged files as the master and containers see them.
use std::path::Path;

use crate::{error::CoreError, fs::LocalFile};

const DFS_SCHEME: &str = "hdfs://";

/// Already in the distributed store; never uploaded.
pub fn is_remote(path: &str) -> bool {
    path.starts_with(DFS_SCHEME)
}

/// `hdfs://host/p` becomes `hdfs:///host/p`; anything else is unchanged.
pub fn triple_slash(path: &str) -> String {
    match path.strip_prefix(DFS_SCHEME) {
        Some(rest) if !rest.starts_with('/') => format!("hdfs:///{rest}"),
        _ => path.to_string(),
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Where a local file lands in the staging directory.
pub fn staged_path(staging_dir: &str, local: &str) -> String {
    format!("{}/{}", staging_dir.trim_end_matches('/'), basename(local))
}

/// Paths the master localizes into each container, in the caller's order.
pub fn resource_files(files: &[String], staging_dir: &str) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            if is_remote(f) {
                triple_slash(f)
            } else {
                staged_path(staging_dir, f)
            }
        })
        .collect()
}

/// A local file named in the launch spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUpload {
    pub path: String,
    pub staged: String,
    pub stat: LocalFile,
}

/// Stat every local (non-remote) file; a missing one is an argument error.
pub async fn local_uploads(
    files: &[String],
    staging_dir: &str,
) -> Result<Vec<LocalUpload>, CoreError> {
    let mut out = Vec::new();
    for path in files.iter().filter(|f| !is_remote(f)) {
        let stat = LocalFile::stat(Path::new(path))
            .await
            .map_err(|e| CoreError::InvalidArgument(format!("file {path}: {e}")))?;
        out.push(LocalUpload {
            path: path.clone(),
            staged: staged_path(staging_dir, path),
            stat,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_paths_get_triple_slash_once() {
        assert_eq!(triple_slash("hdfs://nn/data/x.zip"), "hdfs:///nn/data/x.zip");
        assert_eq!(triple_slash("hdfs:///data/x.zip"), "hdfs:///data/x.zip");
        assert_eq!(triple_slash("/local/x.zip"), "/local/x.zip");
    }

    #[test]
    fn local_files_map_into_staging() {
        let files = vec![
            "/home/a/env.zip".to_string(),
            "hdfs://nn/shared/data.csv".to_string(),
            "script.py".to_string(),
        ];
        assert_eq!(
            resource_files(&files, "/user/a/.knitDeps/"),
            [
                "/user/a/.knitDeps/env.zip",
                "hdfs:///nn/shared/data.csv",
                "/user/a/.knitDeps/script.py"
            ]
        );
    }

    #[tokio::test]
    async fn missing_local_file_is_invalid_argument() {
        let files = vec!["/definitely/not/here.zip".to_string()];
        let err = local_uploads(&files, "/stage").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(msg) if msg.contains("here.zip")));
    }

    #[tokio::test]
    async fn remote_files_are_not_statted() {
        let files = vec!["hdfs:///x.zip".to_string()];
        assert!(local_uploads(&files, "/stage").await.unwrap().is_empty());
    }
}
