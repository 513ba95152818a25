use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Application state as reported by the resource manager.
///
/// Names are cluster-native and surfaced unchanged: a completed application is
/// `FINISHED`, never renamed. Whether it succeeded is carried by [`FinalStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    New,
    NewSaving,
    Submitted,
    Accepted,
    Running,
    Finished,
    Failed,
    Killed,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::New => "NEW",
            AppState::NewSaving => "NEW_SAVING",
            AppState::Submitted => "SUBMITTED",
            AppState::Accepted => "ACCEPTED",
            AppState::Running => "RUNNING",
            AppState::Finished => "FINISHED",
            AppState::Failed => "FAILED",
            AppState::Killed => "KILLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Finished | AppState::Failed | AppState::Killed)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppState {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(AppState::New),
            "NEW_SAVING" => Ok(AppState::NewSaving),
            "SUBMITTED" => Ok(AppState::Submitted),
            "ACCEPTED" => Ok(AppState::Accepted),
            "RUNNING" => Ok(AppState::Running),
            "FINISHED" => Ok(AppState::Finished),
            "FAILED" => Ok(AppState::Failed),
            "KILLED" => Ok(AppState::Killed),
            other => Err(ModelError::UnknownState(other.to_string())),
        }
    }
}

/// Outcome the application master reported when it unregistered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    #[default]
    Undefined,
    Succeeded,
    Failed,
    Killed,
}

/// Simplified status for polling loops.
///
/// `None` is the sentinel for "no application to ask about" (not started yet, or the
/// resource manager could not be queried).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    None,
    Known(AppState),
}

impl RuntimeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuntimeStatus::Known(s) if s.is_terminal())
    }

    pub fn state(&self) -> Option<AppState> {
        match self {
            RuntimeStatus::None => None,
            RuntimeStatus::Known(s) => Some(*s),
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::None => f.write_str("NONE"),
            RuntimeStatus::Known(s) => s.fmt(f),
        }
    }
}

/// Local lifecycle of one controller.
///
/// ```text
/// Unstarted -> SubmitFailed
/// Unstarted -> Running -> Finished | Failed | Killed
/// ```
/// Moves only forward; see [`LifecycleState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    SubmitFailed,
    Running,
    Finished,
    Failed,
    Killed,
}

impl LifecycleState {
    fn rank(&self) -> u8 {
        match self {
            LifecycleState::Unstarted => 0,
            LifecycleState::Running => 1,
            LifecycleState::SubmitFailed
            | LifecycleState::Finished
            | LifecycleState::Failed
            | LifecycleState::Killed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Apply an observed transition, ignoring anything that would move backwards
    /// or sideways out of a terminal state.
    pub fn advance(self, next: LifecycleState) -> LifecycleState {
        let allowed = match (self, next) {
            (LifecycleState::Unstarted, LifecycleState::SubmitFailed) => true,
            (LifecycleState::Unstarted, LifecycleState::Running) => true,
            (LifecycleState::Running, n) => n.rank() == 2 && n != LifecycleState::SubmitFailed,
            _ => false,
        };
        if allowed { next } else { self }
    }

    /// Lifecycle implied by a cluster state, if it is terminal.
    pub fn from_terminal(state: AppState) -> Option<LifecycleState> {
        match state {
            AppState::Finished => Some(LifecycleState::Finished),
            AppState::Failed => Some(LifecycleState::Failed),
            AppState::Killed => Some(LifecycleState::Killed),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Unstarted => "unstarted",
            LifecycleState::SubmitFailed => "submit-failed",
            LifecycleState::Running => "running",
            LifecycleState::Finished => "finished",
            LifecycleState::Failed => "failed",
            LifecycleState::Killed => "killed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_is_not_renamed() {
        let s: AppState = serde_json::from_str(r#""FINISHED""#).unwrap();
        assert_eq!(s, AppState::Finished);
        assert_eq!(RuntimeStatus::Known(s).to_string(), "FINISHED");
        assert_eq!(RuntimeStatus::None.to_string(), "NONE");
    }

    #[test]
    fn parses_new_saving() {
        assert_eq!("new_saving".parse::<AppState>().unwrap(), AppState::NewSaving);
        assert!("SUCCEEDED".parse::<AppState>().is_err());
    }

    #[test]
    fn lifecycle_never_moves_backwards() {
        let s = LifecycleState::Unstarted.advance(LifecycleState::Running);
        assert_eq!(s, LifecycleState::Running);

        let s = s.advance(LifecycleState::Unstarted);
        assert_eq!(s, LifecycleState::Running);

        let s = s.advance(LifecycleState::Killed);
        assert_eq!(s, LifecycleState::Killed);

        assert_eq!(s.advance(LifecycleState::Finished), LifecycleState::Killed);
        assert_eq!(s.advance(LifecycleState::Running), LifecycleState::Killed);
    }

    #[test]
    fn submit_failed_only_from_unstarted() {
        assert_eq!(
            LifecycleState::Running.advance(LifecycleState::SubmitFailed),
            LifecycleState::Running
        );
        assert!(
            LifecycleState::Unstarted
                .advance(LifecycleState::SubmitFailed)
                .is_terminal()
        );
    }
}
