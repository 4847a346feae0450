//! Source tree scanning with exclusion filtering.

use crate::filter::ExclusionFilter;
use crate::models::{mtime_seconds, FileMeta};
use blake3::Hasher;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

const HASH_BUF_SIZE: usize = 64 * 1024;

/// Result of one scan: relative path -> metadata, plus aggregate counts.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: BTreeMap<String, FileMeta>,
    pub files_found: u64,
    pub excluded_count: u64,
}

/// Recursively walks a source tree, applying the exclusion filter and
/// collecting cheap per-file metadata (size, mtime, optional digest).
pub struct FileScanner {
    filter: ExclusionFilter,
    use_hash: bool,
    min_hash_size: u64,
}

impl FileScanner {
    pub fn new(filter: ExclusionFilter, use_hash: bool, min_hash_size: u64) -> Self {
        Self {
            filter,
            use_hash,
            min_hash_size,
        }
    }

    /// Scan `base_path` depth-first. Excluded directories are pruned with
    /// their whole subtree; a denied directory is counted and skipped, never
    /// aborting the rest of the scan.
    pub fn scan(&self, base_path: &Path) -> ScanResult {
        info!("Scanning source directory: {}", base_path.display());

        let mut result = ScanResult::default();
        let mut walker = WalkDir::new(base_path).follow_links(false).into_iter();

        loop {
            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    warn!("Permission or walk error: {e}");
                    result.excluded_count += 1;
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();

            if let Some(reason) = self.filter.should_exclude(path) {
                debug!("Excluding {}: {reason}", path.display());
                result.excluded_count += 1;
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!("Skipping symlink: {}", path.display());
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Metadata error for {}: {e}", path.display());
                    result.excluded_count += 1;
                    continue;
                }
            };

            let relative_path = match relative_key(path, base_path) {
                Some(rel) => rel,
                None => {
                    warn!("Failed to compute relative path for {}", path.display());
                    continue;
                }
            };

            let size = metadata.len();
            let hash = if self.use_hash && size >= self.min_hash_size {
                match compute_file_hash(path) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        warn!("Hash error for {}: {e}", path.display());
                        None
                    }
                }
            } else {
                None
            };

            result.files_found += 1;
            if result.files_found % 100 == 0 {
                debug!("Scanned {} files...", result.files_found);
            }

            result.files.insert(
                relative_path.clone(),
                FileMeta {
                    path: path.to_path_buf(),
                    relative_path,
                    size,
                    mtime: mtime_seconds(&metadata),
                    hash,
                },
            );
        }

        info!(
            "Scan completed: {} files found, {} excluded",
            result.files_found, result.excluded_count
        );

        result
    }
}

/// Relative path key with forward slashes, stable across platforms.
pub fn relative_key(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Streaming content digest, used purely as a change-detection aid.
pub fn compute_file_hash(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_excluded_extensions, default_exclusions};
    use assert_fs::prelude::*;

    fn scanner(use_hash: bool, min_hash_size: u64) -> FileScanner {
        let filter = ExclusionFilter::new(&default_exclusions(), &default_excluded_extensions());
        FileScanner::new(filter, use_hash, min_hash_size)
    }

    #[test]
    fn test_scan_collects_metadata() {
        let source = assert_fs::TempDir::new().unwrap();
        source.child("file1.txt").write_str("hello world").unwrap();
        source.child("subdir/file3.txt").write_str("nested").unwrap();

        let result = scanner(false, 0).scan(source.path());

        assert_eq!(result.files_found, 2);
        assert_eq!(result.files.len(), 2);

        let meta = &result.files["file1.txt"];
        assert_eq!(meta.size, 11);
        assert!(meta.mtime > 0.0);
        assert!(meta.hash.is_none());
        assert!(result.files.contains_key("subdir/file3.txt"));
    }

    #[test]
    fn test_scan_prunes_excluded_subtrees() {
        let source = assert_fs::TempDir::new().unwrap();
        source.child("keep.txt").write_str("keep").unwrap();
        source
            .child("node_modules/pkg/index.js")
            .write_str("ignored")
            .unwrap();
        source.child(".git/config").write_str("ignored").unwrap();

        let result = scanner(false, 0).scan(source.path());

        assert_eq!(result.files.len(), 1);
        assert!(result.files.contains_key("keep.txt"));
        assert!(result.excluded_count >= 2);
    }

    #[test]
    fn test_scan_skips_excluded_extensions() {
        let source = assert_fs::TempDir::new().unwrap();
        source.child("module.pyc").write_str("bytecode").unwrap();
        source.child("module.py").write_str("source").unwrap();

        let result = scanner(false, 0).scan(source.path());

        assert_eq!(result.files.len(), 1);
        assert!(result.files.contains_key("module.py"));
    }

    #[test]
    fn test_scan_hashes_only_large_files() {
        let source = assert_fs::TempDir::new().unwrap();
        source.child("small.txt").write_str("tiny").unwrap();
        source
            .child("large.txt")
            .write_str(&"x".repeat(128))
            .unwrap();

        let result = scanner(true, 64).scan(source.path());

        assert!(result.files["small.txt"].hash.is_none());
        let hash = result.files["large.txt"].hash.as_ref().unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let source = assert_fs::TempDir::new().unwrap();
        let file = source.child("data.bin");
        file.write_str("same content").unwrap();

        let a = compute_file_hash(file.path()).unwrap();
        let b = compute_file_hash(file.path()).unwrap();
        assert_eq!(a, b);
    }
}
