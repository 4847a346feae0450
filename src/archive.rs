//! Zip archiving of a device backup folder, for cold storage on the same
//! medium.

use crate::error::{BackupError, Result};
use crate::scanner::relative_key;
use chrono::Local;
use log::{debug, info};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive file name for a device: `<device>_<timestamp>.zip`.
pub fn archive_name(device: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{device}_{stamp}.zip")
}

/// Existing archives for a device under `root`, sorted by name. The
/// timestamped naming makes lexical order chronological.
pub fn find_archives(root: &Path, device: &str) -> Vec<PathBuf> {
    let prefix = format!("{device}_");
    let mut archives: Vec<PathBuf> = fs::read_dir(root)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".zip"))
                    .unwrap_or(false)
        })
        .collect();
    archives.sort();
    archives
}

/// Compress `device_dir` into a timestamped zip next to it under `root`.
///
/// The archive is written to a temp sibling and renamed into place, so an
/// interrupted run never leaves a truncated zip under the final name.
/// Returns the archive path and the number of files stored.
pub fn compress_device_folder(root: &Path, device_dir: &Path) -> Result<(PathBuf, u64)> {
    if !device_dir.is_dir() {
        return Err(BackupError::BackupDirNotFound(device_dir.to_path_buf()));
    }

    let device = device_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BackupError::Other("Device folder has no valid name".to_string()))?;

    let archive_path = root.join(archive_name(device));
    let temp_path = archive_path.with_extension("zip.tmp");

    info!(
        "Compressing {} into {}",
        device_dir.display(),
        archive_path.display()
    );

    let result = write_zip(device_dir, &temp_path);
    match result {
        Ok(file_count) => {
            fs::rename(&temp_path, &archive_path)?;
            info!("Archive complete: {file_count} files");
            Ok((archive_path, file_count))
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn write_zip(device_dir: &Path, dest: &Path) -> Result<u64> {
    let file = fs::File::create(dest)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<PathBuf> = WalkDir::new(device_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() > 0)
        .map(|e| e.path().to_path_buf())
        .collect();
    entries.sort();

    let mut file_count = 0u64;
    for path in entries {
        let Some(name) = relative_key(&path, device_dir) else {
            continue;
        };

        if path.is_dir() {
            // Directory entries keep empty folders alive in the archive.
            writer.add_directory(name.as_str(), options)?;
        } else {
            writer.start_file(name.as_str(), options)?;
            let mut reader = BufReader::new(fs::File::open(&path)?);
            io::copy(&mut reader, &mut writer)?;
            file_count += 1;
            debug!("Archived {name}");
        }
    }

    writer.finish()?;
    Ok(file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Read;

    #[test]
    fn test_compress_and_list_archives() {
        let temp = assert_fs::TempDir::new().unwrap();
        let device_dir = temp.child("laptop");
        device_dir.child("notes.txt").write_str("hello").unwrap();
        device_dir.child("docs/report.md").write_str("# report").unwrap();
        device_dir.child("empty").create_dir_all().unwrap();

        let (archive_path, file_count) =
            compress_device_folder(temp.path(), device_dir.path()).unwrap();

        assert_eq!(file_count, 2);
        assert!(archive_path.exists());
        assert_eq!(find_archives(temp.path(), "laptop"), vec![archive_path.clone()]);
        assert!(find_archives(temp.path(), "desktop").is_empty());

        let mut zip = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("notes.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
        assert!(zip.by_name("empty/").is_ok());

        // No leftover temp archive.
        assert!(!archive_path.with_extension("zip.tmp").exists());
    }

    #[test]
    fn test_compress_missing_folder_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(compress_device_folder(temp.path(), &missing).is_err());
    }
}
