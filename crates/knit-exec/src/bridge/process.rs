use std::{io, process::ExitStatus, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, ChildStdin, Command},
    time::timeout,
};
use tracing::{debug, info, trace, warn};

use crate::BridgeError;

/// Forwarding of the bridge's stdout/stderr into the log.
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// Longer lines are truncated.
    pub max_line_length: usize,
    /// Log stdout at INFO (false = DEBUG).
    pub stdout_info: bool,
    /// Log stderr at WARN (false = DEBUG).
    pub stderr_warn: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: false,
            stderr_warn: false,
        }
    }
}

/// The bridge OS process.
///
/// Spawned in its own process group on unix so a terminal interrupt aimed at
/// this program does not reach it; teardown signals the whole group.
pub struct BridgeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl BridgeProcess {
    pub fn spawn(
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        output: OutputConfig,
    ) -> Result<Self, BridgeError> {
        trace!(%program, ?args, "spawning bridge process");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::Bootstrap(format!("failed to spawn {program}: {e}")))?;
        let pid = child.id().unwrap_or_default();
        debug!(pid, %program, "bridge process started");

        if let Some(out) = child.stdout.take() {
            tokio::spawn(forward_lines(out, pid, "stdout", output));
        }
        if let Some(err) = child.stderr.take() {
            tokio::spawn(forward_lines(err, pid, "stderr", output));
        }
        let stdin = child.stdin.take();
        Ok(Self { child, stdin })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// `true` while the process has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Close stdin, SIGTERM the group, wait up to `grace`, then SIGKILL.
    pub async fn shutdown(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        drop(self.stdin.take());
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }
        self.signal_group(Signal::Term);
        match timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(pid = ?self.child.id(), "bridge ignored SIGTERM; killing");
                self.signal_group(Signal::Kill);
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) {
        let Some(pid) = self.child.id() else {
            return;
        };
        let sig = match signal {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: killpg only sends a signal; the group id is our own child's pid.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, sig) };
        if rc != 0 {
            debug!(pid, sig, err = %io::Error::last_os_error(), "killpg failed");
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&mut self, _signal: Signal) {
        let _ = self.child.start_kill();
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        if self.is_running() {
            self.signal_group(Signal::Kill);
        }
    }
}

#[derive(Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

async fn forward_lines<R>(reader: R, pid: u32, stream: &'static str, cfg: OutputConfig)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = truncate(&line, cfg.max_line_length);
        match stream {
            "stdout" if cfg.stdout_info => info!(pid, stream, "{line}"),
            "stderr" if cfg.stderr_warn => warn!(pid, stream, "{line}"),
            _ => debug!(pid, stream, "{line}"),
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[tokio::test]
    async fn spawn_failure_is_bootstrap_error() {
        let err = BridgeProcess::spawn("knit-no-such-program", &[], &[], OutputConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Bootstrap(msg) if msg.contains("knit-no-such-program")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_terminates_a_sleeping_process() {
        let mut proc = BridgeProcess::spawn(
            "sh",
            &["-c".into(), "sleep 30".into()],
            &[],
            OutputConfig::default(),
        )
        .unwrap();
        assert!(proc.is_running());
        let status = proc.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
        assert!(!proc.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn environment_reaches_the_process() {
        let mut proc = BridgeProcess::spawn(
            "sh",
            &["-c".into(), "test \"$REPLICATION_FACTOR\" = 3".into()],
            &[("REPLICATION_FACTOR".into(), "3".into())],
            OutputConfig::default(),
        )
        .unwrap();
        assert!(proc.wait().await.unwrap().success());
    }
}
