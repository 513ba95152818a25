//! Advisory capacity check run before submission.
//!
//! Cluster capacity can change between the check and the launch; passing here
//! does not guarantee admission.
use std::sync::Arc;

use knit_model::ContainerRequest;
use knit_yarn::ResourceManager;
use tracing::{debug, instrument};

use crate::{error::CoreError, fs::DistributedFs};

/// Memory the master is assumed to need before clamping to the minimum allocation.
const MASTER_MEMORY_FLOOR_MB: u64 = 300;

const MIB: u64 = 1 << 20;

/// What a launch is about to ask of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    pub containers: ContainerRequest,
    /// Bytes to be staged into the distributed store, launch artifact included.
    pub upload_bytes: u64,
}

/// Total memory for master plus workers, each clamped up to the minimum allocation.
pub fn memory_needed_mb(req: ContainerRequest, min_allocation_mb: u64) -> u64 {
    MASTER_MEMORY_FLOOR_MB.max(min_allocation_mb)
        + u64::from(req.count) * req.memory_mb.max(min_allocation_mb)
}

/// One core for the master plus the workers'.
pub fn vcores_needed(req: ContainerRequest) -> u64 {
    1 + u64::from(req.count) * u64::from(req.vcores)
}

pub struct Preflight {
    rm: Arc<dyn ResourceManager>,
    fs: Option<Arc<dyn DistributedFs>>,
    min_allocation_mb: u64,
}

impl Preflight {
    pub fn new(rm: Arc<dyn ResourceManager>, min_allocation_mb: u64) -> Self {
        Self {
            rm,
            fs: None,
            min_allocation_mb,
        }
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn DistributedFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    #[instrument(level = "debug", skip(self), fields(containers = demand.containers.count))]
    pub async fn check(&self, demand: Demand) -> Result<(), CoreError> {
        let req = demand.containers;
        let metrics = self.rm.cluster_metrics().await?;
        if metrics.active_nodes <= 0 {
            return Err(CoreError::Capacity(
                "the resource manager reports no active node managers".into(),
            ));
        }

        let mem = memory_needed_mb(req, self.min_allocation_mb);
        if metrics.available_mb < 0 || mem > metrics.available_mb as u64 {
            return Err(CoreError::Capacity(format!(
                "memory estimate for app ({mem}MB) exceeds cluster capacity ({}MB)",
                metrics.available_mb
            )));
        }

        let cores = vcores_needed(req);
        if metrics.available_virtual_cores < 0 || cores > metrics.available_virtual_cores as u64 {
            return Err(CoreError::Capacity(format!(
                "vCPU request for app ({cores}) exceeds cluster capacity ({})",
                metrics.available_virtual_cores
            )));
        }

        let per_container_mb = req.memory_mb.max(self.min_allocation_mb);
        let nodes = self.rm.nodes().await?;
        let fits = nodes.iter().any(|n| {
            n.avail_memory_mb >= 0
                && n.available_virtual_cores >= 0
                && n.avail_memory_mb as u64 >= per_container_mb
                && n.available_virtual_cores as u64 >= u64::from(req.vcores)
        });
        if !fits {
            return Err(CoreError::Capacity(format!(
                "no node manager can fit a single container ({per_container_mb}MB, {} vcores)",
                req.vcores
            )));
        }

        if let Some(fs) = &self.fs {
            let budget = fs.usage().await?.free() / 2;
            if demand.upload_bytes > budget {
                return Err(CoreError::Capacity(format!(
                    "distributed store space requirement ({}MB) exceeds half of free capacity ({}MB)",
                    demand.upload_bytes / MIB,
                    budget / MIB
                )));
            }
        }

        debug!(mem_mb = mem, vcores = cores, "preflight passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_is_clamped_to_minimum_allocation() {
        assert_eq!(
            memory_needed_mb(ContainerRequest::new(2, 1, 128), 1024),
            1024 + 2 * 1024
        );
        assert_eq!(memory_needed_mb(ContainerRequest::new(1, 1, 500), 128), 300 + 500);
    }

    #[test]
    fn vcores_include_the_master() {
        assert_eq!(vcores_needed(ContainerRequest::new(3, 2, 128)), 7);
    }
}
