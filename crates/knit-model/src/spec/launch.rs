use serde::{Deserialize, Serialize};

use crate::{DEFAULT_APP_NAME, DEFAULT_QUEUE, Env, ModelError, ModelResult};

/// Shape of a batch of worker containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRequest {
    /// Number of containers to request.
    pub count: u32,
    /// Virtual cores per container.
    pub vcores: u32,
    /// Memory per container, in megabytes.
    pub memory_mb: u64,
}

impl ContainerRequest {
    pub fn new(count: u32, vcores: u32, memory_mb: u64) -> Self {
        Self {
            count,
            vcores,
            memory_mb,
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.vcores == 0 {
            return Err(ModelError::Invalid("vcores must be at least 1".into()));
        }
        if self.memory_mb == 0 {
            return Err(ModelError::Invalid("memory must be at least 1 MB".into()));
        }
        Ok(())
    }
}

impl Default for ContainerRequest {
    fn default() -> Self {
        Self::new(1, 1, 128)
    }
}

/// Everything needed to submit one application.
///
/// `files` entries starting with `hdfs://` are taken to already live in the distributed
/// store; anything else is a local path that may need uploading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSpec {
    /// Shell command run in every worker container.
    pub command: String,
    pub containers: ContainerRequest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Environment for the master and workers. `None` means "use the controller default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Env>,
    pub app_name: String,
    pub queue: String,
    /// Run the capacity preflight before submitting.
    pub checks: bool,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            containers: ContainerRequest::default(),
            files: Vec::new(),
            env: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            checks: true,
        }
    }

    pub fn with_containers(mut self, count: u32, vcores: u32, memory_mb: u64) -> Self {
        self.containers = ContainerRequest::new(count, vcores, memory_mb);
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn without_checks(mut self) -> Self {
        self.checks = false;
        self
    }

    /// Cheap local validation; runs before anything touches the network.
    pub fn validate(&self) -> ModelResult<()> {
        if self.command.trim().is_empty() {
            return Err(ModelError::Invalid("command is empty".into()));
        }
        if self.app_name.trim().is_empty() {
            return Err(ModelError::Invalid("application name is empty".into()));
        }
        if self.files.iter().any(|f| f.trim().is_empty()) {
            return Err(ModelError::Invalid("file list contains an empty path".into()));
        }
        self.containers.validate()?;
        if let Some(env) = &self.env {
            env.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cluster_conventions() {
        let spec = LaunchSpec::new("sleep 100");
        assert_eq!(spec.containers, ContainerRequest::new(1, 1, 128));
        assert_eq!(spec.app_name, "knit");
        assert_eq!(spec.queue, "default");
        assert!(spec.checks);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validate_catches_cheap_mistakes() {
        assert!(LaunchSpec::new("  ").validate().is_err());
        assert!(LaunchSpec::new("ls").with_containers(1, 0, 128).validate().is_err());
        assert!(LaunchSpec::new("ls").with_containers(1, 1, 0).validate().is_err());
        assert!(LaunchSpec::new("ls").with_file("").validate().is_err());
        assert!(
            LaunchSpec::new("ls")
                .with_env(Env::single("A=B", "c"))
                .validate()
                .is_err()
        );
    }
}
