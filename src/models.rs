//! Value types shared by the scan, diff, backup and restore stages.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Actions that can be applied to files during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Copied,
    Updated,
    Skipped,
    Deleted,
    Error,
}

impl FileAction {
    /// Fixed-width label used in the run log.
    pub fn label(&self) -> &'static str {
        match self {
            FileAction::Copied => "[COPIED]  ",
            FileAction::Updated => "[UPDATED] ",
            FileAction::Skipped => "[SKIPPED] ",
            FileAction::Deleted => "[DELETED] ",
            FileAction::Error => "[ERROR]   ",
        }
    }
}

/// Metadata for a single source file, produced by the scanner.
///
/// `relative_path` is the identity key across source, backup and manifest;
/// it always uses forward slashes regardless of platform.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
    pub mtime: f64,
    pub hash: Option<String>,
}

impl FileMeta {
    /// Asymmetric change rule against another file's metadata.
    ///
    /// A file counts as changed when its size differs, when its mtime is
    /// strictly newer, or when both sides carry a digest and they differ.
    /// An older mtime alone is never a change, which prevents spurious
    /// re-copies from clock skew or copied timestamps.
    pub fn needs_update(&self, other: &FileMeta, use_hash: bool) -> bool {
        if self.size != other.size {
            return true;
        }
        if self.mtime > other.mtime {
            return true;
        }
        if use_hash {
            if let (Some(a), Some(b)) = (&self.hash, &other.hash) {
                return a != b;
            }
        }
        false
    }

    /// Source mtime as a `SystemTime`, for restoring it onto copies.
    pub fn mtime_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs_f64(self.mtime.max(0.0))
    }
}

/// Modification time as fractional seconds since the epoch.
pub fn mtime_seconds(metadata: &Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Current time as fractional seconds since the epoch.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Result of one backup run. Duration and throughput are derived, not stored.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub total_files: u64,
    pub copied_files: u64,
    pub updated_files: u64,
    pub skipped_files: u64,
    pub deleted_files: u64,
    pub errors: u64,
    pub total_size: u64,
    pub copied_size: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub file_actions: Vec<(String, FileAction, String)>,
}

impl BackupReport {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            copied_files: 0,
            updated_files: 0,
            skipped_files: 0,
            deleted_files: 0,
            errors: 0,
            total_size: 0,
            copied_size: 0,
            start_time: Utc::now(),
            end_time: None,
            file_actions: Vec::new(),
        }
    }

    /// Duration of the run in seconds.
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Throughput in MB/s over the copied bytes.
    pub fn speed_mbps(&self) -> f64 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            (self.copied_size as f64 / (1024.0 * 1024.0)) / duration
        } else {
            0.0
        }
    }
}

impl Default for BackupReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one restore run.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub total_files: u64,
    pub restored_files: u64,
    pub overwritten_files: u64,
    pub skipped_files: u64,
    pub errors: u64,
    pub total_size: u64,
    pub restored_size: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub file_actions: Vec<(String, FileAction, String)>,
}

impl RestoreReport {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            restored_files: 0,
            overwritten_files: 0,
            skipped_files: 0,
            errors: 0,
            total_size: 0,
            restored_size: 0,
            start_time: Utc::now(),
            end_time: None,
            file_actions: Vec::new(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn speed_mbps(&self) -> f64 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            (self.restored_size as f64 / (1024.0 * 1024.0)) / duration
        } else {
            0.0
        }
    }
}

impl Default for RestoreReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size: u64, mtime: f64, hash: Option<&str>) -> FileMeta {
        FileMeta {
            path: PathBuf::from("/src/a.txt"),
            relative_path: "a.txt".to_string(),
            size,
            mtime,
            hash: hash.map(|h| h.to_string()),
        }
    }

    #[test]
    fn test_needs_update_size_differs() {
        let source = meta(10, 100.0, None);
        let stored = meta(20, 200.0, None);
        // Size change wins regardless of mtime direction.
        assert!(source.needs_update(&stored, false));
    }

    #[test]
    fn test_needs_update_newer_mtime() {
        let source = meta(10, 300.0, None);
        let stored = meta(10, 200.0, None);
        assert!(source.needs_update(&stored, false));
    }

    #[test]
    fn test_needs_update_older_mtime_is_not_a_change() {
        let source = meta(10, 100.0, None);
        let stored = meta(10, 200.0, None);
        assert!(!source.needs_update(&stored, false));
    }

    #[test]
    fn test_needs_update_hash_requires_both_sides() {
        let source = meta(10, 100.0, Some("abc"));
        let stored = meta(10, 100.0, None);
        // Hash on one side only must not trigger a modified verdict.
        assert!(!source.needs_update(&stored, true));

        let stored_with_hash = meta(10, 100.0, Some("def"));
        assert!(source.needs_update(&stored_with_hash, true));

        let stored_same_hash = meta(10, 100.0, Some("abc"));
        assert!(!source.needs_update(&stored_same_hash, true));
    }

    #[test]
    fn test_report_speed_zero_duration() {
        let mut report = BackupReport::new();
        report.end_time = Some(report.start_time);
        assert_eq!(report.speed_mbps(), 0.0);
    }
}
