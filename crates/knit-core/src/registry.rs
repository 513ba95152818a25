//! Process-wide record of live controllers, swept on shutdown.
//!
//! Entries are weak: the registry never keeps a controller alive, and a controller
//! dropped by its owner simply disappears from the next sweep.
use std::sync::{Arc, Mutex, Weak};

use knit_model::LifecycleState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::controller::AppController;

#[derive(Default)]
pub struct AppRegistry {
    entries: Mutex<Vec<Weak<AppController>>>,
}

impl AppRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, controller: &Arc<AppController>) {
        let mut entries = self.lock();
        entries.retain(|w| w.strong_count() > 0);
        entries.push(Arc::downgrade(controller));
    }

    /// Controllers still alive.
    pub fn live(&self) -> Vec<Arc<AppController>> {
        self.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kill every application that may still be running on the cluster.
    /// Returns how many were confirmed killed.
    pub async fn shutdown_all(&self) -> usize {
        let mut killed = 0;
        for controller in self.live() {
            let pending = matches!(
                controller.lifecycle().await,
                LifecycleState::Running | LifecycleState::SubmitFailed
            );
            if !pending || controller.app_id().await.is_none() {
                continue;
            }
            if controller.kill().await {
                killed += 1;
            } else {
                warn!(controller = %controller, "application not confirmed killed at shutdown");
            }
        }
        killed
    }

    /// On Ctrl-C, sweep all controllers, then cancel `token`.
    ///
    /// Also returns once `token` is cancelled by someone else, without sweeping.
    pub fn install_signal_hook(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "signal listener failed");
                        return;
                    }
                    info!("interrupt received; killing applications");
                    let killed = registry.shutdown_all().await;
                    info!(killed, "shutdown sweep done");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Weak<AppController>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
