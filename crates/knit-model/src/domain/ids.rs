use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SUPERVISOR_ORDINAL;

/// Cluster-assigned application id, e.g. `application_1452274436693_0001`.
///
/// Opaque to everything except [`AppId::numeric_segment`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<cluster-timestamp>_<sequence>` part shared with every container of this app.
    pub fn numeric_segment(&self) -> Option<String> {
        let mut parts = self.0.split('_');
        let _prefix = parts.next()?;
        let ts = parts.next()?;
        let seq = parts.next()?;
        Some(format!("{ts}_{seq}"))
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Container id, e.g. `container_1452274436693_0001_01_000001`.
///
/// Newer clusters insert an epoch: `container_e17_1452274436693_0001_01_000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments after the `container_` prefix and optional `eNN` epoch.
    fn body(&self) -> Option<Vec<&str>> {
        let mut parts: Vec<&str> = self.0.split('_').collect();
        if parts.first() != Some(&"container") {
            return None;
        }
        parts.remove(0);
        if parts
            .first()
            .is_some_and(|p| p.starts_with('e') && p[1..].chars().all(|c| c.is_ascii_digit()))
        {
            parts.remove(0);
        }
        (parts.len() == 4).then_some(parts)
    }

    /// Same shape as [`AppId::numeric_segment`]; used to filter node-wide container lists.
    pub fn app_segment(&self) -> Option<String> {
        self.body().map(|p| format!("{}_{}", p[0], p[1]))
    }

    pub fn ordinal(&self) -> Option<u64> {
        self.body().and_then(|p| p[3].parse().ok())
    }

    /// `true` for the first container of an attempt, which hosts the application master.
    pub fn is_supervisor(&self) -> bool {
        self.ordinal() == Some(SUPERVISOR_ORDINAL)
    }

    pub fn belongs_to(&self, app: &AppId) -> bool {
        match (self.app_segment(), app.numeric_segment()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_numeric_segment() {
        let app = AppId::from("application_1452274436693_0001");
        assert_eq!(app.numeric_segment().as_deref(), Some("1452274436693_0001"));
        assert!(AppId::from("garbage").numeric_segment().is_none());
    }

    #[test]
    fn container_segments_with_and_without_epoch() {
        let plain = ContainerId::from("container_1452274436693_0001_01_000003");
        assert_eq!(plain.app_segment().as_deref(), Some("1452274436693_0001"));
        assert_eq!(plain.ordinal(), Some(3));
        assert!(!plain.is_supervisor());

        let epoch = ContainerId::from("container_e17_1452274436693_0001_01_000001");
        assert_eq!(epoch.app_segment().as_deref(), Some("1452274436693_0001"));
        assert!(epoch.is_supervisor());
    }

    #[test]
    fn belongs_to_filters_foreign_apps() {
        let app = AppId::from("application_1452274436693_0001");
        assert!(ContainerId::from("container_1452274436693_0001_01_000002").belongs_to(&app));
        assert!(!ContainerId::from("container_1452274436693_0002_01_000002").belongs_to(&app));
        assert!(!ContainerId::from("not-a-container").belongs_to(&app));
    }
}
