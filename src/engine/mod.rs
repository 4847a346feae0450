pub mod backup;
pub mod restore;

pub use backup::BackupEngine;
pub use restore::{ConflictPolicy, RestoreEngine};

/// Per-run log files live under this subfolder of the device target.
pub const LOG_DIR_NAME: &str = "_backup_logs";
