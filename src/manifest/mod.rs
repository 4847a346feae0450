//! Manifest tracking: the persistent record of a prior backup's file
//! metadata, and the diff engine that decides what changed without
//! rescanning the destination.

pub mod json_store;

pub use json_store::JsonManifestStore;

use crate::models::{now_seconds, FileMeta};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed, hidden manifest file name inside a device target directory.
pub const MANIFEST_FILENAME: &str = ".devsave_manifest.json";

pub const MANIFEST_VERSION: u32 = 1;

/// The only live manifest format.
pub const FORMAT_JSON: &str = "json";

/// Per-file record in the manifest, keyed by relative path in
/// [`Manifest::entries`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Content digest, empty when never computed.
    pub hash: String,
    pub size: u64,
    pub mtime: f64,
    /// Unix permission bits of the source file at backup time.
    pub permissions: u32,
    /// When this file was last backed up (epoch seconds).
    pub backed_up_at: f64,
}

impl ManifestEntry {
    /// Build an entry for a file that was just backed up.
    pub fn from_file_meta(meta: &FileMeta, backed_up_at: f64) -> Self {
        Self {
            hash: meta.hash.clone().unwrap_or_default(),
            size: meta.size,
            mtime: meta.mtime,
            permissions: source_permissions(&meta.path),
            backed_up_at,
        }
    }

    /// Asymmetric change rule against a freshly scanned file.
    ///
    /// Size difference or a strictly newer mtime means modified; a hash
    /// comparison only applies when both sides carry a non-empty digest.
    pub fn has_changed(&self, meta: &FileMeta) -> bool {
        if meta.size != self.size {
            return true;
        }
        if meta.mtime > self.mtime {
            return true;
        }
        if let Some(hash) = &meta.hash {
            if !hash.is_empty() && !self.hash.is_empty() {
                return *hash != self.hash;
            }
        }
        false
    }
}

#[cfg(unix)]
fn source_permissions(path: &Path) -> u32 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).map(|m| m.mode()).unwrap_or(0o644)
}

#[cfg(not(unix))]
fn source_permissions(_path: &Path) -> u32 {
    0o644
}

/// Complete backup manifest for one device target directory.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub version: u32,
    pub format: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Absolute source tree path, used to auto-resolve restore targets.
    pub source: String,
    /// Sanitized hostname of the owning device, may be empty.
    pub hostname: String,
    /// Monotonically incrementing backup-run counter.
    pub backup_count: u64,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(source: &Path) -> Self {
        let now = Utc::now();
        Self {
            version: MANIFEST_VERSION,
            format: FORMAT_JSON.to_string(),
            created: now,
            updated: now,
            source: source.to_string_lossy().into_owned(),
            hostname: String::new(),
            backup_count: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn total_files(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    pub fn add_entry(&mut self, relative_path: String, entry: ManifestEntry) {
        self.entries.insert(relative_path, entry);
        self.updated = Utc::now();
    }

    pub fn remove_entry(&mut self, relative_path: &str) -> Option<ManifestEntry> {
        let removed = self.entries.remove(relative_path);
        if removed.is_some() {
            self.updated = Utc::now();
        }
        removed
    }

    pub fn get_entry(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(relative_path)
    }
}

/// Result of comparing a fresh scan against a manifest.
///
/// Every scanned relative path lands in exactly one of new / modified /
/// unchanged; every manifest path not seen in the scan lands in deleted.
#[derive(Debug, Default)]
pub struct ManifestDiff {
    pub new_files: Vec<FileMeta>,
    pub modified_files: Vec<FileMeta>,
    pub deleted_paths: Vec<String>,
    pub unchanged_files: Vec<FileMeta>,
}

impl ManifestDiff {
    pub fn has_changes(&self) -> bool {
        !self.new_files.is_empty()
            || !self.modified_files.is_empty()
            || !self.deleted_paths.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "New: {}, Modified: {}, Deleted: {}, Unchanged: {}",
            self.new_files.len(),
            self.modified_files.len(),
            self.deleted_paths.len(),
            self.unchanged_files.len()
        )
    }
}

/// Storage backend for manifests.
///
/// JSON is the sole implementation; the seam anticipates an embedded
/// database for very large trees. Load treats a corrupt manifest as absent
/// and save either replaces the file atomically or leaves the previous
/// manifest untouched.
pub trait ManifestStore {
    /// Path of the manifest file inside the backup target.
    fn manifest_path(&self) -> PathBuf;

    /// Load the manifest, or `None` when missing or unreadable.
    fn load(&self) -> Option<Manifest>;

    /// Persist the manifest atomically. Returns false on failure, in which
    /// case any previously saved manifest is left intact.
    fn save(&self, manifest: &Manifest) -> bool;

    fn exists(&self) -> bool {
        self.manifest_path().exists()
    }

    fn create(&self, source_path: &Path) -> Manifest {
        Manifest::new(source_path)
    }

    fn load_or_create(&self, source_path: &Path) -> Manifest {
        self.load()
            .unwrap_or_else(|| self.create(source_path))
    }

    /// Compare scanned source files against the manifest.
    ///
    /// With no manifest available every file is new. Otherwise the change
    /// rule of [`ManifestEntry::has_changed`] applies per file, and manifest
    /// paths absent from the scan are emitted as deleted.
    fn diff(
        &self,
        source_files: &BTreeMap<String, FileMeta>,
        manifest: Option<&Manifest>,
    ) -> ManifestDiff {
        let loaded;
        let manifest = match manifest {
            Some(m) => Some(m),
            None => {
                loaded = self.load();
                loaded.as_ref()
            }
        };

        let mut diff = ManifestDiff::default();

        let Some(manifest) = manifest else {
            diff.new_files = source_files.values().cloned().collect();
            return diff;
        };

        for meta in source_files.values() {
            match manifest.get_entry(&meta.relative_path) {
                None => diff.new_files.push(meta.clone()),
                Some(entry) if entry.has_changed(meta) => diff.modified_files.push(meta.clone()),
                Some(_) => diff.unchanged_files.push(meta.clone()),
            }
        }

        for relative_path in manifest.entries.keys() {
            if !source_files.contains_key(relative_path) {
                diff.deleted_paths.push(relative_path.clone());
            }
        }

        diff
    }

    /// Update the manifest after a backup run.
    ///
    /// Only files that were actually copied or updated belong in
    /// `backed_up_files`; an entry is never recorded for a failed copy, so
    /// the manifest always reflects what is truly present on the destination.
    fn update_from_backup(
        &self,
        manifest: &mut Manifest,
        backed_up_files: &[FileMeta],
        deleted_paths: Option<&[String]>,
    ) {
        let backup_time = now_seconds();

        for meta in backed_up_files {
            let entry = ManifestEntry::from_file_meta(meta, backup_time);
            manifest.add_entry(meta.relative_path.clone(), entry);
        }

        if let Some(paths) = deleted_paths {
            for path in paths {
                manifest.remove_entry(path);
            }
        }

        manifest.backup_count += 1;
        manifest.updated = Utc::now();
    }

    /// Cheap integrity spot check: physical presence and exact size for every
    /// entry. Does not re-hash or compare mtimes.
    fn verify(&self, manifest: &Manifest, backup_target: &Path) -> Vec<String> {
        let mut errors = Vec::new();

        for (relative_path, entry) in &manifest.entries {
            let file_path = backup_target.join(relative_path);

            match fs::metadata(&file_path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    errors.push(format!("Missing: {relative_path}"));
                }
                Err(e) => {
                    errors.push(format!("Error reading {relative_path}: {e}"));
                }
                Ok(metadata) => {
                    if metadata.len() != entry.size {
                        errors.push(format!(
                            "Size mismatch: {relative_path} (expected {}, got {})",
                            entry.size,
                            metadata.len()
                        ));
                    }
                }
            }
        }

        errors
    }
}
