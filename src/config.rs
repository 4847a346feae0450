//! Backup configuration and the default exclusion tables.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::thread;

/// Name of the folder created under the backup medium root.
pub const DEFAULT_BACKUP_FOLDER: &str = "Documents-Backup";

/// Upper bound on the copy worker pool, regardless of CPU count.
pub const MAX_WORKER_CAP: usize = 8;

/// Only hash files at least this large (1 MiB).
pub const DEFAULT_MIN_HASH_SIZE: u64 = 1024 * 1024;

/// Directory and file names excluded by default: dependency caches, virtual
/// environments, build outputs, VCS metadata and OS litter.
pub fn default_exclusions() -> BTreeSet<String> {
    [
        // Node.js / JavaScript
        "node_modules",
        ".npm",
        ".yarn",
        "bower_components",
        ".next",
        ".nuxt",
        "dist",
        "build",
        ".parcel-cache",
        // Python
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".tox",
        ".nox",
        "venv",
        ".venv",
        "env",
        ".env",
        "ENV",
        ".eggs",
        "*.egg-info",
        ".Python",
        "pip-wheel-metadata",
        ".pytype",
        // Virtual environments (generic)
        "virtualenv",
        ".virtualenv",
        "pipenv",
        ".pipenv",
        "conda-env",
        ".conda",
        // Java / Kotlin / Scala / Rust
        "target",
        ".gradle",
        ".m2",
        // .NET / C#
        "bin",
        "obj",
        "packages",
        // Go
        "vendor",
        // IDE and editor
        ".idea",
        ".vscode",
        "*.swp",
        "*.swo",
        ".project",
        ".settings",
        ".classpath",
        // Version control
        ".git",
        ".svn",
        ".hg",
        // OS-specific
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        // Temporary files
        "*.tmp",
        "*.temp",
        "*.log",
        "*.bak",
        "~*",
        // Caches
        ".cache",
        "cache",
        ".sass-cache",
        // Docker
        ".docker",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// File extensions that are always skipped (compiled and temporary output).
pub fn default_excluded_extensions() -> BTreeSet<String> {
    [
        ".pyc", ".pyo", ".pyd", ".class", ".o", ".obj", ".exe", ".dll", ".so", ".dylib", ".log",
        ".tmp", ".temp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default worker count: available parallelism capped at [`MAX_WORKER_CAP`].
pub fn default_workers() -> usize {
    let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    cpus.min(MAX_WORKER_CAP)
}

/// Configuration for one backup run.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub source_path: PathBuf,
    pub backup_path: PathBuf,
    pub backup_folder_name: String,
    /// Device identifier for the per-device subfolder; empty means flat layout.
    pub device_name: String,
    pub exclusions: BTreeSet<String>,
    pub excluded_extensions: BTreeSet<String>,
    pub max_workers: usize,
    /// Compute content digests during the scan (slower, more accurate).
    pub use_hash: bool,
    pub min_hash_size: u64,
    pub log_to_file: bool,
    /// Track backups with a manifest for fast incremental diffs.
    pub use_manifest: bool,
    /// Rehearse the run without copying files or saving the manifest.
    pub dry_run: bool,
    /// Remove destination files whose source no longer exists. Off unless
    /// explicitly requested.
    pub prune_deleted: bool,
}

impl BackupConfig {
    pub fn new(source_path: PathBuf, backup_path: PathBuf) -> Self {
        Self {
            source_path,
            backup_path,
            backup_folder_name: DEFAULT_BACKUP_FOLDER.to_string(),
            device_name: String::new(),
            exclusions: default_exclusions(),
            excluded_extensions: default_excluded_extensions(),
            max_workers: default_workers(),
            use_hash: false,
            min_hash_size: DEFAULT_MIN_HASH_SIZE,
            log_to_file: true,
            use_manifest: true,
            dry_run: false,
            prune_deleted: false,
        }
    }

    /// Backup folder under the medium root (`<target>/<BackupFolder>`).
    pub fn backup_root(&self) -> PathBuf {
        self.backup_path.join(&self.backup_folder_name)
    }

    /// Resolved device target: `<backup_root>/<device>` when a device name is
    /// configured, otherwise the backup root itself.
    pub fn device_target(&self) -> PathBuf {
        if self.device_name.is_empty() {
            self.backup_root()
        } else {
            self.backup_root().join(&self.device_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_capped() {
        assert!(default_workers() >= 1);
        assert!(default_workers() <= MAX_WORKER_CAP);
    }

    #[test]
    fn test_device_target_layouts() {
        let mut config = BackupConfig::new(PathBuf::from("/src"), PathBuf::from("/mnt/usb"));
        assert_eq!(
            config.device_target(),
            PathBuf::from("/mnt/usb/Documents-Backup")
        );

        config.device_name = "my-laptop".to_string();
        assert_eq!(
            config.device_target(),
            PathBuf::from("/mnt/usb/Documents-Backup/my-laptop")
        );
    }

    #[test]
    fn test_default_exclusions_contain_common_artifacts() {
        let exclusions = default_exclusions();
        assert!(exclusions.contains("node_modules"));
        assert!(exclusions.contains(".git"));
        assert!(exclusions.contains("target"));
        assert!(default_excluded_extensions().contains(".pyc"));
    }
}
