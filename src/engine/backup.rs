//! The backup engine: validation, legacy-layout migration, scan, diff and
//! the parallel copy phases.

use crate::config::BackupConfig;
use crate::detector::ChangeDetector;
use crate::engine::LOG_DIR_NAME;
use crate::error::{BackupError, Result};
use crate::filter::ExclusionFilter;
use crate::manifest::{JsonManifestStore, Manifest, ManifestStore, MANIFEST_FILENAME};
use crate::models::{BackupReport, FileAction, FileMeta};
use crate::scanner::FileScanner;
use chrono::{Local, Utc};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Scratch file used to probe write access on the backup medium.
const WRITE_PROBE: &str = ".devsave_write_test";

/// Progress is logged every this many processed files.
const PROGRESS_INTERVAL: u64 = 50;

/// Mutable state shared by the copy workers, guarded by one mutex.
struct RunState {
    report: BackupReport,
    files_processed: u64,
    /// Files that landed on the destination; these feed the manifest update.
    backed_up_files: Vec<FileMeta>,
}

/// Drives one backup run from a [`BackupConfig`].
pub struct BackupEngine {
    config: BackupConfig,
}

impl BackupEngine {
    pub fn new(config: BackupConfig) -> Self {
        Self { config }
    }

    /// Run the backup end to end and return the report.
    ///
    /// Failures never panic the caller: a hard error (bad source, missing
    /// medium) yields a report with `errors >= 1` and zero work done.
    pub fn run(&self) -> BackupReport {
        let mut state = RunState {
            report: BackupReport::new(),
            files_processed: 0,
            backed_up_files: Vec::new(),
        };

        if let Err(e) = self.execute(&mut state) {
            error!("Backup failed: {e}");
            state.report.errors += 1;
        }

        state.report.end_time = Some(Utc::now());

        // Never create the medium path just to drop a log on it.
        if self.config.log_to_file && self.config.backup_path.exists() {
            match self.write_run_log(&state.report) {
                Ok(path) => info!("Run log written to {}", path.display()),
                Err(e) => warn!("Could not write run log: {e}"),
            }
        }

        state.report
    }

    fn execute(&self, state: &mut RunState) -> Result<()> {
        self.validate_paths()?;

        if self.config.dry_run {
            info!("Dry run: no files will be copied");
        }

        let backup_root = self.config.backup_root();
        if !self.config.device_name.is_empty() {
            self.migrate_legacy_layout(&backup_root)?;
        }

        let target = self.config.device_target();
        fs::create_dir_all(&target)?;

        let mut manifest_ctx: Option<(JsonManifestStore, Manifest)> = None;
        if self.config.use_manifest {
            let store = JsonManifestStore::new(target.clone());
            let mut manifest = store.load_or_create(&self.config.source_path);
            if !self.config.device_name.is_empty() {
                manifest.hostname = self.config.device_name.clone();
            }
            info!(
                "Manifest loaded: {} tracked files, {} prior runs",
                manifest.total_files(),
                manifest.backup_count
            );
            manifest_ctx = Some((store, manifest));
        }

        let filter = ExclusionFilter::new(&self.config.exclusions, &self.config.excluded_extensions);
        let scanner = FileScanner::new(filter, self.config.use_hash, self.config.min_hash_size);
        let scan = scanner.scan(&self.config.source_path);

        state.report.total_files = scan.files.len() as u64;
        state.report.total_size = scan.files.values().map(|f| f.size).sum();

        if scan.files.is_empty() {
            warn!("No files to back up after exclusions");
            return Ok(());
        }

        let (new_files, modified_files, deleted_paths) = match &manifest_ctx {
            Some((store, manifest)) => {
                let diff = store.diff(&scan.files, Some(manifest));
                info!("Change analysis: {}", diff.summary());
                (diff.new_files, diff.modified_files, diff.deleted_paths)
            }
            None => {
                let detector = ChangeDetector::new(self.config.use_hash);
                detector.detect_changes(&scan.files, &target)
            }
        };

        let to_copy = (new_files.len() + modified_files.len()) as u64;
        state.report.skipped_files = state.report.total_files.saturating_sub(to_copy);

        if to_copy == 0 {
            info!("Everything up to date, nothing to copy");
        } else {
            info!(
                "Copying {} files ({} new, {} modified) with {} workers",
                to_copy,
                new_files.len(),
                modified_files.len(),
                self.config.max_workers.max(1)
            );
            self.copy_batch(&new_files, &target, FileAction::Copied, to_copy, state)?;
            self.copy_batch(&modified_files, &target, FileAction::Updated, to_copy, state)?;
        }

        if self.config.prune_deleted && !deleted_paths.is_empty() {
            self.delete_stale_files(&deleted_paths, &target, &mut state.report);
        }

        if let Some((store, mut manifest)) = manifest_ctx {
            if self.config.dry_run {
                info!("Dry run: manifest left untouched");
            } else {
                let deleted = if self.config.prune_deleted {
                    Some(deleted_paths.as_slice())
                } else {
                    None
                };
                store.update_from_backup(&mut manifest, &state.backed_up_files, deleted);
                // A failed save is a warning, not a run error: the copied
                // files are already on disk, the manifest is just stale.
                if store.save(&manifest) {
                    info!("Manifest saved ({} entries)", manifest.total_files());
                } else {
                    warn!("Manifest save failed; next run will fall back to a full diff");
                }
            }
        }

        Ok(())
    }

    fn validate_paths(&self) -> Result<()> {
        let source = &self.config.source_path;
        if !source.exists() {
            return Err(BackupError::SourceNotFound(source.clone()));
        }
        if !source.is_dir() {
            return Err(BackupError::SourceNotDirectory(source.clone()));
        }

        let medium = &self.config.backup_path;
        if !medium.exists() {
            return Err(BackupError::TargetNotFound(medium.clone()));
        }

        let probe = medium.join(WRITE_PROBE);
        let outcome = fs::write(&probe, b"").and_then(|_| fs::remove_file(&probe));
        outcome.map_err(|source| BackupError::TargetNotWritable {
            path: medium.clone(),
            source,
        })
    }

    /// Move a pre-device flat layout into the per-device subfolder.
    ///
    /// Legacy indicators are a manifest or a log directory directly under the
    /// backup root, or loose files at its top level. Everything is staged
    /// into a temp directory first so an interrupted migration never mixes
    /// old and new layouts. A no-op when the device folder already exists.
    fn migrate_legacy_layout(&self, backup_root: &Path) -> Result<()> {
        if !backup_root.exists() {
            return Ok(());
        }

        let device_folder = backup_root.join(&self.config.device_name);
        if device_folder.exists() {
            return Ok(());
        }

        let has_legacy_manifest = backup_root.join(MANIFEST_FILENAME).exists();
        let has_legacy_logs = backup_root.join(LOG_DIR_NAME).exists();
        let has_loose_files = fs::read_dir(backup_root)?
            .filter_map(|e| e.ok())
            .any(|e| e.path().is_file());

        if !(has_legacy_manifest || has_legacy_logs || has_loose_files) {
            return Ok(());
        }

        info!(
            "Migrating legacy flat layout into {}",
            device_folder.display()
        );

        let staging_name = format!(".migration_temp_{}", Utc::now().timestamp());
        let staging = backup_root.join(&staging_name);
        fs::create_dir(&staging)?;

        for entry in fs::read_dir(backup_root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy() == staging_name {
                continue;
            }
            fs::rename(entry.path(), staging.join(entry.file_name()))?;
        }

        fs::rename(&staging, &device_folder)?;
        info!("Legacy layout migration complete");
        Ok(())
    }

    fn copy_batch(
        &self,
        files: &[FileMeta],
        target: &Path,
        action: FileAction,
        to_copy: u64,
        state: &mut RunState,
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.max(1))
            .build()?;
        let shared = Mutex::new(state);

        pool.install(|| {
            files.par_iter().for_each(|file| {
                let outcome = self.copy_single_file(file, target);

                let mut state = match shared.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                state.files_processed += 1;

                match outcome {
                    Ok(()) => {
                        match action {
                            FileAction::Updated => state.report.updated_files += 1,
                            _ => state.report.copied_files += 1,
                        }
                        state.report.copied_size += file.size;
                        state.backed_up_files.push(file.clone());
                        let message = if self.config.dry_run { "DRY-RUN" } else { "OK" };
                        state.report.file_actions.push((
                            file.relative_path.clone(),
                            action,
                            message.to_string(),
                        ));
                        debug!("{}{}", action.label(), file.relative_path);
                    }
                    Err(message) => {
                        state.report.errors += 1;
                        warn!("Copy failed for {}: {message}", file.relative_path);
                        state.report.file_actions.push((
                            file.relative_path.clone(),
                            FileAction::Error,
                            message,
                        ));
                    }
                }

                if state.files_processed % PROGRESS_INTERVAL == 0 {
                    info!("Progress: {}/{} files", state.files_processed, to_copy);
                }
            });
        });

        Ok(())
    }

    /// Copy one file onto the destination, preserving its mtime.
    ///
    /// Writes to a temp sibling and renames, so a crashed worker never
    /// leaves a half-written file under the final name.
    fn copy_single_file(&self, file: &FileMeta, target: &Path) -> std::result::Result<(), String> {
        if self.config.dry_run {
            return Ok(());
        }

        let dest = target.join(&file.relative_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Create directory failed: {e}"))?;
        }

        let temp = temp_sibling(&dest);
        let result = (|| -> io::Result<()> {
            fs::copy(&file.path, &temp)?;
            let handle = fs::File::options().write(true).open(&temp)?;
            handle.set_modified(file.mtime_system_time())?;
            fs::rename(&temp, &dest)
        })();

        result.map_err(|e| {
            let _ = fs::remove_file(&temp);
            match e.kind() {
                io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
                io::ErrorKind::NotFound => "File vanished before copy".to_string(),
                _ => format!("OS error: {e}"),
            }
        })
    }

    /// Remove destination files whose source path disappeared. Only invoked
    /// when the run explicitly opted into pruning.
    fn delete_stale_files(&self, deleted_paths: &[String], target: &Path, report: &mut BackupReport) {
        for relative_path in deleted_paths {
            if self.config.dry_run {
                report.deleted_files += 1;
                report.file_actions.push((
                    relative_path.clone(),
                    FileAction::Deleted,
                    "DRY-RUN".to_string(),
                ));
                continue;
            }

            let path = target.join(relative_path);
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.deleted_files += 1;
                    report.file_actions.push((
                        relative_path.clone(),
                        FileAction::Deleted,
                        "OK".to_string(),
                    ));
                    debug!("{}{relative_path}", FileAction::Deleted.label());
                }
                Err(e) => {
                    warn!("Could not delete {relative_path}: {e}");
                }
            }
        }
    }

    fn write_run_log(&self, report: &BackupReport) -> io::Result<PathBuf> {
        let log_dir = self.config.device_target().join(LOG_DIR_NAME);
        fs::create_dir_all(&log_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("backup_{stamp}.log"));

        let mut out = String::new();
        out.push_str(&format!("Backup run {stamp}\n"));
        out.push_str(&format!("Source: {}\n", self.config.source_path.display()));
        out.push_str(&format!("Target: {}\n", self.config.device_target().display()));
        if !self.config.device_name.is_empty() {
            out.push_str(&format!("Device: {}\n", self.config.device_name));
        }
        if self.config.dry_run {
            out.push_str("Mode: DRY-RUN\n");
        }
        out.push('\n');
        out.push_str(&format!("Total files:   {}\n", report.total_files));
        out.push_str(&format!("Copied:        {}\n", report.copied_files));
        out.push_str(&format!("Updated:       {}\n", report.updated_files));
        out.push_str(&format!("Skipped:       {}\n", report.skipped_files));
        out.push_str(&format!("Deleted:       {}\n", report.deleted_files));
        out.push_str(&format!("Errors:        {}\n", report.errors));
        out.push_str(&format!("Copied bytes:  {}\n", report.copied_size));
        out.push_str(&format!(
            "Duration:      {:.2}s ({:.2} MB/s)\n",
            report.duration_secs(),
            report.speed_mbps()
        ));

        if !report.file_actions.is_empty() {
            out.push('\n');
            for (relative_path, action, message) in &report.file_actions {
                if message == "OK" {
                    out.push_str(&format!("{}{relative_path}\n", action.label()));
                } else {
                    out.push_str(&format!("{}{relative_path} ({message})\n", action.label()));
                }
            }
        }

        fs::write(&log_path, out)?;
        Ok(log_path)
    }
}

/// Temp path next to `dest` so the final rename stays on one filesystem.
fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}
