use crate::archive;
use crate::commands::format_size;
use crate::config::DEFAULT_BACKUP_FOLDER;
use crate::error::{BackupError, Result};
use crate::manifest::{JsonManifestStore, Manifest, ManifestStore};
use std::fs;
use std::path::PathBuf;

pub fn devices(target: PathBuf) -> Result<()> {
    let backup_root = target.join(DEFAULT_BACKUP_FOLDER);
    if !backup_root.is_dir() {
        return Err(BackupError::BackupDirNotFound(backup_root));
    }

    let mut found: Vec<(String, Manifest)> = Vec::new();

    // A manifest at the root is a pre-device layout.
    if let Some(manifest) = JsonManifestStore::new(backup_root.clone()).load() {
        found.push(("(legacy flat layout)".to_string(), manifest));
    }

    let mut subdirs: Vec<PathBuf> = fs::read_dir(&backup_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for dir in subdirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(manifest) = JsonManifestStore::new(dir.clone()).load() {
            found.push((name.to_string(), manifest));
        }
    }

    if found.is_empty() {
        println!("No device backups found in {}", backup_root.display());
        return Ok(());
    }

    println!("Device backups in {}:", backup_root.display());
    print_table(&found);

    for (name, _) in &found {
        let archives = archive::find_archives(&backup_root, name);
        for path in archives {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!(
                "  archive: {} ({})",
                path.file_name().and_then(|n| n.to_str()).unwrap_or("?"),
                format_size(size)
            );
        }
    }

    Ok(())
}

fn print_table(found: &[(String, Manifest)]) {
    println!(
        "{:<24} {:<8} {:<12} {:<6} {}",
        "Device", "Files", "Size", "Runs", "Last backup"
    );
    println!("{}", "-".repeat(76));
    for (name, manifest) in found {
        println!(
            "{:<24} {:<8} {:<12} {:<6} {}",
            name,
            manifest.total_files(),
            format_size(manifest.total_size()),
            manifest.backup_count,
            manifest.updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::backup;
    use assert_fs::prelude::*;

    #[test]
    fn test_devices_lists_backed_up_devices() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("source");
        let medium = temp.child("usb");
        source.child("a.txt").write_str("alpha").unwrap();
        medium.create_dir_all().unwrap();

        for device in ["laptop", "desktop"] {
            backup::backup(
                source.path().to_path_buf(),
                medium.path().to_path_buf(),
                Some(device.to_string()),
                vec![],
                false,
                false,
                Some(2),
                false,
                false,
                false,
            )
            .unwrap();
        }

        devices(medium.path().to_path_buf()).unwrap();
    }

    #[test]
    fn test_devices_without_backup_root_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = devices(temp.path().to_path_buf());
        assert!(matches!(result, Err(BackupError::BackupDirNotFound(_))));
    }
}
