use crate::commands::{format_size, resolve_device_dir};
use crate::config::DEFAULT_BACKUP_FOLDER;
use crate::error::{BackupError, Result};
use crate::manifest::{JsonManifestStore, ManifestStore};
use std::path::PathBuf;

pub fn info(target: PathBuf, device_name: Option<String>) -> Result<()> {
    let backup_root = target.join(DEFAULT_BACKUP_FOLDER);
    let device_dir = resolve_device_dir(&backup_root, device_name.as_deref())?;

    let store = JsonManifestStore::new(device_dir.clone());
    let manifest = store
        .load()
        .ok_or_else(|| BackupError::ManifestNotFound(device_dir.clone()))?;

    println!("Backup info for {}", device_dir.display());
    println!("  Source:       {}", manifest.source);
    if !manifest.hostname.is_empty() {
        println!("  Device:       {}", manifest.hostname);
    }
    println!("  Created:      {}", manifest.created.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Last backup:  {}", manifest.updated.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Backup runs:  {}", manifest.backup_count);
    println!("  Files:        {}", manifest.total_files());
    println!("  Total size:   {}", format_size(manifest.total_size()));
    println!("  Manifest:     {}", store.manifest_path().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::backup;
    use assert_fs::prelude::*;

    #[test]
    fn test_info_after_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("source");
        let medium = temp.child("usb");
        source.child("a.txt").write_str("alpha").unwrap();
        medium.create_dir_all().unwrap();

        backup::backup(
            source.path().to_path_buf(),
            medium.path().to_path_buf(),
            Some("laptop".to_string()),
            vec![],
            false,
            false,
            Some(2),
            false,
            false,
            false,
        )
        .unwrap();

        info(medium.path().to_path_buf(), Some("laptop".to_string())).unwrap();
    }

    #[test]
    fn test_info_without_manifest_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        medium.child("Documents-Backup/laptop").create_dir_all().unwrap();

        let result = info(medium.path().to_path_buf(), Some("laptop".to_string()));
        assert!(matches!(result, Err(BackupError::ManifestNotFound(_))));
    }
}
