//! The restore engine: walks a device backup folder and copies files back,
//! applying a conflict policy against whatever already exists at the target.

use crate::config::default_workers;
use crate::engine::LOG_DIR_NAME;
use crate::error::{BackupError, Result};
use crate::manifest::{JsonManifestStore, Manifest, ManifestStore, MANIFEST_FILENAME};
use crate::models::{mtime_seconds, FileAction, RestoreReport};
use crate::scanner::relative_key;
use chrono::Utc;
use glob::{MatchOptions, Pattern};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// How to treat a file that already exists at the restore target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave existing files alone.
    Skip,
    /// Always replace existing files.
    Overwrite,
    /// Replace only when the backup copy has a strictly newer mtime.
    Newer,
}

/// One file selected for restore.
#[derive(Debug, Clone)]
struct RestoreItem {
    backup_path: PathBuf,
    relative_path: String,
    size: u64,
    mtime: f64,
}

/// Drives one restore run from a resolved device backup folder.
pub struct RestoreEngine {
    backup_target: PathBuf,
    target_path: Option<PathBuf>,
    max_workers: usize,
}

impl RestoreEngine {
    /// `backup_target` is the device-scoped backup folder, already resolved.
    pub fn new(backup_target: PathBuf) -> Self {
        Self {
            backup_target,
            target_path: None,
            max_workers: default_workers(),
        }
    }

    /// Restore into this directory instead of the manifest's recorded source.
    pub fn with_target(mut self, target: Option<PathBuf>) -> Self {
        self.target_path = target;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// The manifest of the backup folder, when one exists.
    pub fn manifest(&self) -> Option<Manifest> {
        JsonManifestStore::new(self.backup_target.clone()).load()
    }

    /// Files available for restore, filtered by `patterns`, as
    /// `(relative_path, size)` pairs sorted by path. Read from the manifest
    /// when one exists, falling back to a directory walk.
    pub fn list_files(&self, patterns: &[String]) -> Result<Vec<(String, u64)>> {
        let compiled = compile_patterns(patterns)?;

        if let Some(manifest) = self.manifest() {
            return Ok(manifest
                .entries
                .iter()
                .filter(|(path, _)| compiled.is_empty() || matches_any(path, &compiled))
                .map(|(path, entry)| (path.clone(), entry.size))
                .collect());
        }

        let items = self.collect_items(&compiled)?;
        Ok(items
            .into_iter()
            .map(|item| (item.relative_path, item.size))
            .collect())
    }

    /// Run the restore end to end and return the report.
    pub fn restore(
        &self,
        patterns: &[String],
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> RestoreReport {
        let mut report = RestoreReport::new();

        if let Err(e) = self.execute(patterns, policy, dry_run, &mut report) {
            error!("Restore failed: {e}");
            report.errors += 1;
        }

        report.end_time = Some(Utc::now());
        report
    }

    fn execute(
        &self,
        patterns: &[String],
        policy: ConflictPolicy,
        dry_run: bool,
        report: &mut RestoreReport,
    ) -> Result<()> {
        if !self.backup_target.is_dir() {
            return Err(BackupError::BackupDirNotFound(self.backup_target.clone()));
        }

        let target_dir = self.resolve_target()?;
        info!(
            "Restoring from {} to {}",
            self.backup_target.display(),
            target_dir.display()
        );
        if dry_run {
            info!("Dry run: no files will be written");
        }

        let compiled = compile_patterns(patterns)?;
        let items = self.collect_items(&compiled)?;

        report.total_files = items.len() as u64;
        report.total_size = items.iter().map(|i| i.size).sum();

        if items.is_empty() {
            warn!("No files matched for restore");
            return Ok(());
        }

        if !dry_run {
            fs::create_dir_all(&target_dir)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()?;
        let shared = Mutex::new(report);

        pool.install(|| {
            items.par_iter().for_each(|item| {
                let outcome = restore_single_file(item, &target_dir, policy, dry_run);

                let mut report = match shared.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match outcome {
                    Ok((action, message)) => {
                        match action {
                            FileAction::Copied => {
                                report.restored_files += 1;
                                report.restored_size += item.size;
                            }
                            FileAction::Updated => {
                                report.overwritten_files += 1;
                                report.restored_size += item.size;
                            }
                            _ => report.skipped_files += 1,
                        }
                        debug!("{}{}", action.label(), item.relative_path);
                        report
                            .file_actions
                            .push((item.relative_path.clone(), action, message));
                    }
                    Err(message) => {
                        report.errors += 1;
                        warn!("Restore failed for {}: {message}", item.relative_path);
                        report.file_actions.push((
                            item.relative_path.clone(),
                            FileAction::Error,
                            message,
                        ));
                    }
                }
            });
        });

        Ok(())
    }

    /// Explicit target wins; otherwise fall back to the source path recorded
    /// in the manifest. Neither available is a hard error.
    fn resolve_target(&self) -> Result<PathBuf> {
        if let Some(target) = &self.target_path {
            return Ok(target.clone());
        }
        match self.manifest() {
            Some(manifest) if !manifest.source.is_empty() => {
                info!("Using manifest source as restore target: {}", manifest.source);
                Ok(PathBuf::from(manifest.source))
            }
            _ => Err(BackupError::NoRestoreTarget),
        }
    }

    fn collect_items(&self, patterns: &[Pattern]) -> Result<Vec<RestoreItem>> {
        let mut items = Vec::new();

        for entry in WalkDir::new(&self.backup_target).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative_path) = relative_key(entry.path(), &self.backup_target) else {
                continue;
            };
            if is_bookkeeping(&relative_path) {
                continue;
            }
            if !patterns.is_empty() && !matches_any(&relative_path, patterns) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping {relative_path}: {e}");
                    continue;
                }
            };

            items.push(RestoreItem {
                backup_path: entry.path().to_path_buf(),
                relative_path,
                size: metadata.len(),
                mtime: mtime_seconds(&metadata),
            });
        }

        items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(items)
    }
}

/// Manifest and run logs never restore; leftover temp files are skipped too.
fn is_bookkeeping(relative_path: &str) -> bool {
    relative_path == MANIFEST_FILENAME
        || relative_path.starts_with(&format!("{LOG_DIR_NAME}/"))
        || relative_path.ends_with(".tmp")
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| BackupError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// A pattern matches against the full relative path or the bare file name,
/// so `*.txt` selects text files in any subdirectory.
fn matches_any(relative_path: &str, patterns: &[Pattern]) -> bool {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    patterns.iter().any(|pattern| {
        pattern.matches_with(relative_path, options) || pattern.matches_with(file_name, options)
    })
}

fn restore_single_file(
    item: &RestoreItem,
    target_dir: &Path,
    policy: ConflictPolicy,
    dry_run: bool,
) -> std::result::Result<(FileAction, String), String> {
    let dest = target_dir.join(&item.relative_path);
    let exists = dest.exists();

    if exists {
        match policy {
            ConflictPolicy::Skip => {
                return Ok((FileAction::Skipped, "File exists".to_string()));
            }
            ConflictPolicy::Newer => {
                let dest_mtime = fs::metadata(&dest)
                    .map(|m| mtime_seconds(&m))
                    .map_err(|e| format!("OS error: {e}"))?;
                if item.mtime <= dest_mtime {
                    return Ok((FileAction::Skipped, "Target is newer".to_string()));
                }
            }
            ConflictPolicy::Overwrite => {}
        }
    }

    let action = if exists {
        FileAction::Updated
    } else {
        FileAction::Copied
    };

    if dry_run {
        return Ok((action, "DRY-RUN".to_string()));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Create directory failed: {e}"))?;
    }

    let temp = temp_sibling(&dest);
    let result = (|| -> io::Result<()> {
        fs::copy(&item.backup_path, &temp)?;
        let handle = fs::File::options().write(true).open(&temp)?;
        handle.set_modified(
            std::time::UNIX_EPOCH + std::time::Duration::from_secs_f64(item.mtime.max(0.0)),
        )?;
        fs::rename(&temp, &dest)
    })();

    match result {
        Ok(()) => Ok((action, "OK".to_string())),
        Err(e) => {
            let _ = fs::remove_file(&temp);
            Err(match e.kind() {
                io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
                _ => format!("OS error: {e}"),
            })
        }
    }
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}
