//! JSON manifest storage.
//!
//! Stores the manifest as a human-readable JSON file. The document shape
//! lives entirely in this module so no other code hardcodes format
//! assumptions.

use crate::manifest::{Manifest, ManifestEntry, ManifestStore, MANIFEST_FILENAME};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// On-disk document. `total_files` and `total_size` are derived values,
/// written for human inspection and recomputed from `files` on load.
#[derive(Serialize, Deserialize)]
struct ManifestDoc {
    version: u32,
    format: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    source: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    backup_count: u64,
    total_files: u64,
    total_size: u64,
    files: BTreeMap<String, EntryDoc>,
}

#[derive(Serialize, Deserialize)]
struct EntryDoc {
    hash: String,
    size: u64,
    mtime: f64,
    permissions: u32,
    backed_up_at: f64,
}

impl ManifestDoc {
    fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            version: manifest.version,
            format: manifest.format.clone(),
            created: manifest.created,
            updated: manifest.updated,
            source: manifest.source.clone(),
            hostname: manifest.hostname.clone(),
            backup_count: manifest.backup_count,
            total_files: manifest.total_files(),
            total_size: manifest.total_size(),
            files: manifest
                .entries
                .iter()
                .map(|(path, e)| {
                    (
                        path.clone(),
                        EntryDoc {
                            hash: e.hash.clone(),
                            size: e.size,
                            mtime: e.mtime,
                            permissions: e.permissions,
                            backed_up_at: e.backed_up_at,
                        },
                    )
                })
                .collect(),
        }
    }

    fn into_manifest(self) -> Manifest {
        Manifest {
            version: self.version,
            format: self.format,
            created: self.created,
            updated: self.updated,
            source: self.source,
            hostname: self.hostname,
            backup_count: self.backup_count,
            entries: self
                .files
                .into_iter()
                .map(|(path, e)| {
                    (
                        path,
                        ManifestEntry {
                            hash: e.hash,
                            size: e.size,
                            mtime: e.mtime,
                            permissions: e.permissions,
                            backed_up_at: e.backed_up_at,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// JSON-backed manifest store for one backup target directory.
pub struct JsonManifestStore {
    backup_path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(backup_path: PathBuf) -> Self {
        Self { backup_path }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = MANIFEST_FILENAME.to_string();
        name.push_str(".tmp");
        self.backup_path.join(name)
    }
}

impl ManifestStore for JsonManifestStore {
    fn manifest_path(&self) -> PathBuf {
        self.backup_path.join(MANIFEST_FILENAME)
    }

    /// A missing, unreadable or malformed manifest is treated as absent so
    /// the caller can fall back to a full diff and recover automatically.
    fn load(&self) -> Option<Manifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return None;
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read manifest {}: {e}", path.display());
                return None;
            }
        };

        match serde_json::from_str::<ManifestDoc>(&raw) {
            Ok(doc) => {
                let manifest = doc.into_manifest();
                debug!(
                    "Loaded manifest: {} files, backup #{}",
                    manifest.total_files(),
                    manifest.backup_count
                );
                Some(manifest)
            }
            Err(e) => {
                warn!("Failed to parse manifest {}: {e}", path.display());
                None
            }
        }
    }

    /// Atomic save: write the full document to a temp file in the same
    /// directory, then rename over the final path. A failure leaves any
    /// previously saved manifest untouched and removes the temp file.
    fn save(&self, manifest: &Manifest) -> bool {
        let path = self.manifest_path();
        let temp = self.temp_path();

        let result = (|| -> std::io::Result<()> {
            fs::create_dir_all(&self.backup_path)?;
            let doc = ManifestDoc::from_manifest(manifest);
            let json = serde_json::to_string_pretty(&doc)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            fs::write(&temp, json)?;
            fs::rename(&temp, &path)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                debug!("Saved manifest: {} files", manifest.total_files());
                true
            }
            Err(e) => {
                warn!("Failed to save manifest {}: {e}", path.display());
                if temp.exists() {
                    let _ = fs::remove_file(&temp);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::path::Path;

    fn sample_manifest(dir: &Path) -> Manifest {
        let store = JsonManifestStore::new(dir.to_path_buf());
        let mut manifest = store.create(Path::new("/home/user/Documents"));
        manifest.hostname = "test-device".to_string();
        manifest.backup_count = 3;
        manifest.add_entry(
            "notes/todo.txt".to_string(),
            ManifestEntry {
                hash: "abcd".to_string(),
                size: 128,
                mtime: 1700000000.25,
                permissions: 0o100644,
                backed_up_at: 1700000100.5,
            },
        );
        manifest
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = JsonManifestStore::new(temp.path().to_path_buf());
        let manifest = sample_manifest(temp.path());

        assert!(store.save(&manifest));
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.source, manifest.source);
        assert_eq!(loaded.hostname, "test-device");
        assert_eq!(loaded.backup_count, 3);
        assert_eq!(loaded.entries.len(), 1);

        let entry = loaded.get_entry("notes/todo.txt").unwrap();
        assert_eq!(entry.hash, "abcd");
        assert_eq!(entry.size, 128);
        assert_eq!(entry.mtime, 1700000000.25);
        assert_eq!(entry.permissions, 0o100644);
        assert_eq!(entry.backed_up_at, 1700000100.5);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = JsonManifestStore::new(temp.path().to_path_buf());
        assert!(store.load().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_load_corrupt_returns_none() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(MANIFEST_FILENAME)
            .write_str("{ not valid json")
            .unwrap();

        let store = JsonManifestStore::new(temp.path().to_path_buf());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_does_not_leave_temp_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = JsonManifestStore::new(temp.path().to_path_buf());
        assert!(store.save(&sample_manifest(temp.path())));
        assert!(!store.temp_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_save_leaves_previous_manifest_intact() {
        use std::os::unix::fs::PermissionsExt;

        let temp = assert_fs::TempDir::new().unwrap();
        let store = JsonManifestStore::new(temp.path().to_path_buf());

        let mut manifest = sample_manifest(temp.path());
        assert!(store.save(&manifest));

        // Make the directory read-only so the temp-file write fails.
        let mut perms = fs::metadata(temp.path()).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(temp.path(), perms).unwrap();

        manifest.backup_count = 99;
        assert!(!store.save(&manifest));

        let mut restore = fs::metadata(temp.path()).unwrap().permissions();
        restore.set_mode(0o755);
        fs::set_permissions(temp.path(), restore).unwrap();

        // Old content survives, never truncated or partial.
        let loaded = store.load().unwrap();
        assert_eq!(loaded.backup_count, 3);
        assert!(!store.temp_path().exists());
    }
}
