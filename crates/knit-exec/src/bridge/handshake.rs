//! First hop: the bridge process calls back and reports the port of its RPC server.
use std::{future::Future, io, process::ExitStatus, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    net::TcpListener,
    time::timeout,
};
use tracing::debug;

use crate::BridgeError;

/// Read the 4-byte big-endian port the bridge writes on its callback connection.
///
/// A connection closed before any byte arrives is [`BridgeError::NoData`], never port 0.
pub async fn read_port<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u16, BridgeError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => Err(BridgeError::NoData),
        4 => {
            let raw = u32::from_be_bytes(buf);
            u16::try_from(raw)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| BridgeError::Bootstrap(format!("bridge reported invalid port {raw}")))
        }
        n => Err(BridgeError::Bootstrap(format!(
            "bridge handshake truncated after {n} of 4 bytes"
        ))),
    }
}

/// Accept one callback on `listener` and read the reported port.
///
/// Fails if `exited` resolves first (the bridge died) or `deadline` passes.
pub async fn await_port<F>(
    listener: &TcpListener,
    exited: F,
    deadline: Duration,
) -> Result<u16, BridgeError>
where
    F: Future<Output = io::Result<ExitStatus>>,
{
    let callback = async {
        let (mut stream, peer) = listener.accept().await?;
        debug!(%peer, "bridge called back");
        read_port(&mut stream).await
    };

    tokio::select! {
        res = timeout(deadline, callback) => match res {
            Ok(port) => port,
            Err(_) => Err(BridgeError::Bootstrap(format!(
                "bridge did not report its port within {}s",
                deadline.as_secs()
            ))),
        },
        status = exited => Err(BridgeError::Bootstrap(match status {
            Ok(status) => format!("bridge process exited before reporting its port ({status})"),
            Err(err) => format!("bridge process could not be waited on: {err}"),
        })),
    }
}
