use std::{collections::HashMap, net::SocketAddr};

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use knit_core::prelude::*;
use serde_json::json;

type Params = Query<HashMap<String, String>>;

async fn file_op(Path(path): Path<String>, Query(q): Params) -> impl IntoResponse {
    assert_eq!(q.get("user.name").map(String::as_str), Some("alice"));
    match (q.get("op").map(String::as_str), path.as_str()) {
        (Some("GETFILESTATUS"), "user/alice/.knitDeps/env.zip") => Json(json!({"FileStatus": {
            "pathSuffix": "",
            "type": "FILE",
            "length": 2048,
            "modificationTime": 1_700_000_000_000i64,
        }}))
        .into_response(),
        (Some("LISTSTATUS"), "user/alice/.knitDeps") => Json(json!({"FileStatuses": {"FileStatus": [
            {"pathSuffix": "env.zip", "type": "FILE", "length": 2048, "modificationTime": 1},
            {"pathSuffix": "job.py", "type": "FILE", "length": 10, "modificationTime": 1},
        ]}}))
        .into_response(),
        (Some("GETFILESTATUS" | "LISTSTATUS"), _) => (
            StatusCode::NOT_FOUND,
            Json(json!({"RemoteException": {
                "exception": "FileNotFoundException",
                "message": format!("File does not exist: /{path}"),
            }})),
        )
            .into_response(),
        _ => (StatusCode::BAD_REQUEST, "unsupported op").into_response(),
    }
}

async fn root_op(Query(q): Params) -> impl IntoResponse {
    match q.get("op").map(String::as_str) {
        Some("GETSTATUS") => Json(json!({"FsStatus": {
            "capacity": 1000,
            "used": 400,
            "remaining": 600,
        }}))
        .into_response(),
        _ => (StatusCode::BAD_REQUEST, "unsupported op").into_response(),
    }
}

async fn namenode() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/webhdfs/v1/", get(root_op))
        .route("/webhdfs/v1/{*path}", get(file_op));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> WebHdfs {
    WebHdfs::new(format!("http://{addr}"), "alice").unwrap()
}

#[tokio::test]
async fn stat_reads_size_and_mtime() {
    let fs = client(namenode().await);

    let file = fs
        .stat("hdfs://nn.example:8020/user/alice/.knitDeps/env.zip")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        file,
        RemoteFile {
            size: 2048,
            modified_ms: 1_700_000_000_000
        }
    );
}

#[tokio::test]
async fn missing_file_stats_as_none() {
    let fs = client(namenode().await);
    assert_eq!(fs.stat("/user/alice/.knitDeps/gone.zip").await.unwrap(), None);
}

#[tokio::test]
async fn listing_joins_entries_to_directory() {
    let fs = client(namenode().await);

    let entries = fs.list("/user/alice/.knitDeps/").await.unwrap();
    assert_eq!(
        entries,
        ["/user/alice/.knitDeps/env.zip", "/user/alice/.knitDeps/job.py"]
    );
    assert!(fs.list("/user/alice/nothing").await.unwrap().is_empty());
}

#[tokio::test]
async fn usage_comes_from_filesystem_status() {
    let fs = client(namenode().await);

    let usage = fs.usage().await.unwrap();
    assert_eq!(usage.capacity, 1000);
    assert_eq!(usage.free(), 600);
}

#[tokio::test]
async fn unreachable_namenode_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).stat("/user/alice").await.unwrap_err();
    assert_eq!(err.path, "/user/alice");
    assert!(err.reason.starts_with("GETFILESTATUS"));
}
