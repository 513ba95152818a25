use std::{future::pending, io, process::ExitStatus, time::Duration};

use knit_exec::{BridgeError, await_port, read_port};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

async fn listener() -> (TcpListener, u16) {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = l.local_addr().unwrap().port();
    (l, port)
}

fn never_exits() -> impl std::future::Future<Output = io::Result<ExitStatus>> {
    pending()
}

#[tokio::test]
async fn port_is_big_endian_u32() {
    let (l, port) = listener().await;
    tokio::spawn(async move {
        let mut s = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        s.write_all(&8080u32.to_be_bytes()).await.unwrap();
    });
    let got = await_port(&l, never_exits(), Duration::from_secs(5)).await.unwrap();
    assert_eq!(got, 8080);
}

#[tokio::test]
async fn closed_without_bytes_is_no_data() {
    let (l, port) = listener().await;
    tokio::spawn(async move {
        let s = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        drop(s);
    });
    let err = await_port(&l, never_exits(), Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, BridgeError::NoData), "got {err:?}");
}

#[tokio::test]
async fn truncated_report_is_bootstrap_error() {
    let mut short: &[u8] = &[0x1f, 0x90];
    let err = read_port(&mut short).await.unwrap_err();
    assert!(matches!(err, BridgeError::Bootstrap(msg) if msg.contains("2 of 4")));

    let mut zero: &[u8] = &[0, 0, 0, 0];
    assert!(matches!(
        read_port(&mut zero).await.unwrap_err(),
        BridgeError::Bootstrap(_)
    ));
}

#[tokio::test]
async fn silence_times_out() {
    let (l, _port) = listener().await;
    let err = await_port(&l, never_exits(), Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, BridgeError::Bootstrap(msg) if msg.contains("did not report")));
}

#[cfg(unix)]
#[tokio::test]
async fn early_exit_is_bootstrap_error() {
    use std::os::unix::process::ExitStatusExt;

    let (l, _port) = listener().await;
    let exited = async { Ok(ExitStatus::from_raw(1 << 8)) };
    let err = await_port(&l, exited, Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, BridgeError::Bootstrap(msg) if msg.contains("exited")));
}
