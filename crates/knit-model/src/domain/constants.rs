/// Application name used when the caller does not pick one.
///
/// Also the name `kill_all(owned_only = true)` treats as "ours".
pub const DEFAULT_APP_NAME: &str = "knit";

/// Scheduler queue used when the caller does not pick one.
pub const DEFAULT_QUEUE: &str = "default";

/// Directory (relative to the distributed home) where uploaded files are staged.
pub const STAGING_DIR: &str = ".knitDeps";

/// Ordinal of the container hosting the application master.
pub const SUPERVISOR_ORDINAL: u64 = 1;
