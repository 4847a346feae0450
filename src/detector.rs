//! Fallback change detection against the physical destination.
//!
//! Used when manifest tracking is disabled or no manifest exists. Strictly
//! less efficient than a manifest diff (requires a full destination walk)
//! but needs no persistent state.

use crate::engine::LOG_DIR_NAME;
use crate::manifest::MANIFEST_FILENAME;
use crate::models::{mtime_seconds, FileMeta};
use crate::scanner::relative_key;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub struct ChangeDetector {
    use_hash: bool,
}

impl ChangeDetector {
    pub fn new(use_hash: bool) -> Self {
        Self { use_hash }
    }

    /// Compare source files against the files physically present under
    /// `backup_path`.
    ///
    /// Returns `(new, modified, deleted_paths)` using the same asymmetric
    /// size/mtime rule as the manifest diff, applied against the destination
    /// stat. Bookkeeping entries (run logs, the manifest itself) never appear
    /// in the deleted list.
    pub fn detect_changes(
        &self,
        source_files: &BTreeMap<String, FileMeta>,
        backup_path: &Path,
    ) -> (Vec<FileMeta>, Vec<FileMeta>, Vec<String>) {
        info!("Analyzing changes against destination...");

        let mut new_files = Vec::new();
        let mut modified_files = Vec::new();

        let mut existing: BTreeSet<String> = BTreeSet::new();
        if backup_path.exists() {
            for entry in WalkDir::new(backup_path).follow_links(false) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!("Walk error in backup directory: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(rel) = relative_key(entry.path(), backup_path) {
                    if is_bookkeeping(&rel) {
                        continue;
                    }
                    existing.insert(rel);
                }
            }
        }

        for (relative_path, source_meta) in source_files {
            let backup_file = backup_path.join(relative_path);

            if !backup_file.exists() {
                new_files.push(source_meta.clone());
            } else {
                match fs::metadata(&backup_file) {
                    Ok(metadata) => {
                        let backup_meta = FileMeta {
                            path: backup_file,
                            relative_path: relative_path.clone(),
                            size: metadata.len(),
                            mtime: mtime_seconds(&metadata),
                            hash: None,
                        };
                        if source_meta.needs_update(&backup_meta, self.use_hash) {
                            modified_files.push(source_meta.clone());
                        }
                    }
                    Err(e) => {
                        // Unreadable destination file: safe re-copy.
                        warn!("Stat failed for {}: {e}", relative_path);
                        modified_files.push(source_meta.clone());
                    }
                }
            }

            existing.remove(relative_path);
        }

        let deleted_paths: Vec<String> = existing.into_iter().collect();

        info!(
            "Analysis completed: {} new, {} modified, {} deleted",
            new_files.len(),
            modified_files.len(),
            deleted_paths.len()
        );

        (new_files, modified_files, deleted_paths)
    }
}

fn is_bookkeeping(relative_path: &str) -> bool {
    relative_path == MANIFEST_FILENAME
        || relative_path.starts_with(&format!("{LOG_DIR_NAME}/"))
}
