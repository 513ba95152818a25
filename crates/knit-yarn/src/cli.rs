use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{YarnError, YarnResult};

/// Captured result of one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Runs the cluster command-line tool.
///
/// Only a transport failure (the program could not be started) is an `Err`;
/// a non-zero exit comes back as `success = false`.
#[async_trait]
pub trait ClusterCli: Send + Sync {
    async fn run(&self, args: &[String]) -> YarnResult<CliOutput>;
}

/// [`ClusterCli`] backed by a real executable on `PATH`.
#[derive(Debug, Clone)]
pub struct ShellCli {
    program: String,
}

impl ShellCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ShellCli {
    fn default() -> Self {
        Self::new("yarn")
    }
}

#[async_trait]
impl ClusterCli for ShellCli {
    async fn run(&self, args: &[String]) -> YarnResult<CliOutput> {
        debug!(program = %self.program, ?args, "running cluster cli");
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| YarnError::Cli(format!("{}: {e}", self.program)))?;

        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_cli_error() {
        let cli = ShellCli::new("knit-definitely-not-installed");
        let err = cli.run(&["version".to_string()]).await.unwrap_err();
        assert!(matches!(err, YarnError::Cli(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let cli = ShellCli::new("sh");
        let out = cli
            .run(&["-c".into(), "echo out; echo err >&2; exit 3".into()])
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.combined(), "out\nerr\n");
    }
}
