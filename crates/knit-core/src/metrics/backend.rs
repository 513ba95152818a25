use std::sync::Arc;

use knit_model::LifecycleState;

/// How an application's lifecycle ended, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOutcome {
    Finished,
    Failed,
    Killed,
    /// The bridge never produced a running master.
    SubmitFailed,
}

impl AppOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            AppOutcome::Finished => "finished",
            AppOutcome::Failed => "failed",
            AppOutcome::Killed => "killed",
            AppOutcome::SubmitFailed => "submit_failed",
        }
    }

    /// Outcome for a terminal lifecycle state.
    pub fn from_lifecycle(state: LifecycleState) -> Option<Self> {
        match state {
            LifecycleState::Finished => Some(AppOutcome::Finished),
            LifecycleState::Failed => Some(AppOutcome::Failed),
            LifecycleState::Killed => Some(AppOutcome::Killed),
            LifecycleState::SubmitFailed => Some(AppOutcome::SubmitFailed),
            LifecycleState::Unstarted | LifecycleState::Running => None,
        }
    }
}

/// Backend metrics collection interface.
pub trait MetricsBackend: Send + Sync + 'static {
    /// A master came up and accepted `init`.
    fn record_app_submitted(&self);

    /// The controller observed a terminal state.
    ///
    /// `duration_ms` is measured from submission; zero for `SubmitFailed`.
    fn record_app_finished(&self, outcome: AppOutcome, duration_ms: u64);

    /// A recovery path was taken (e.g. `kill_rm` when the master kill RPC failed).
    fn record_fallback(&self, kind: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
