use crate::archive;
use crate::commands::{format_size, resolve_device_dir};
use crate::config::DEFAULT_BACKUP_FOLDER;
use crate::error::{BackupError, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

pub fn compress(
    target: PathBuf,
    device_name: Option<String>,
    format: String,
    remove_source: bool,
) -> Result<()> {
    if format != "zip" {
        return Err(BackupError::UnsupportedArchiveFormat(format));
    }

    let backup_root = target.join(DEFAULT_BACKUP_FOLDER);
    let device_dir = resolve_device_dir(&backup_root, device_name.as_deref())?;

    // A legacy flat layout resolves to the root itself; zipping that would
    // put the archive inside its own input.
    if device_dir == backup_root {
        return Err(BackupError::Other(
            "No device backup folder to compress; run a backup first".to_string(),
        ));
    }

    if let Some(device) = device_dir.file_name().and_then(|n| n.to_str()) {
        let existing = archive::find_archives(&backup_root, device);
        if !existing.is_empty() {
            warn!(
                "Device already has {} archive(s); creating another",
                existing.len()
            );
        }
    }

    let (archive_path, file_count) = archive::compress_device_folder(&backup_root, &device_dir)?;
    let archive_size = fs::metadata(&archive_path).map(|m| m.len()).unwrap_or(0);

    println!("✓ Compression complete");
    println!("  Archive:  {}", archive_path.display());
    println!("  Files:    {file_count}");
    println!("  Size:     {}", format_size(archive_size));

    if remove_source {
        info!("Removing source folder {}", device_dir.display());
        fs::remove_dir_all(&device_dir)?;
        println!("  Removed:  {}", device_dir.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    fn seed_device(medium: &assert_fs::fixture::ChildPath) {
        medium
            .child("Documents-Backup/laptop/a.txt")
            .write_str("alpha")
            .unwrap();
    }

    #[test]
    fn test_compress_creates_archive() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        seed_device(&medium);

        compress(
            medium.path().to_path_buf(),
            Some("laptop".to_string()),
            "zip".to_string(),
            false,
        )
        .unwrap();

        let archives =
            archive::find_archives(&medium.path().join("Documents-Backup"), "laptop");
        assert_eq!(archives.len(), 1);
        medium
            .child("Documents-Backup/laptop")
            .assert(predicate::path::is_dir());
    }

    #[test]
    fn test_compress_remove_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        seed_device(&medium);

        compress(
            medium.path().to_path_buf(),
            Some("laptop".to_string()),
            "zip".to_string(),
            true,
        )
        .unwrap();

        medium
            .child("Documents-Backup/laptop")
            .assert(predicate::path::missing());
    }

    #[test]
    fn test_compress_rejects_unknown_format() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        seed_device(&medium);

        let result = compress(
            medium.path().to_path_buf(),
            Some("laptop".to_string()),
            "tar.gz".to_string(),
            false,
        );
        assert!(matches!(
            result,
            Err(BackupError::UnsupportedArchiveFormat(_))
        ));
    }
}
