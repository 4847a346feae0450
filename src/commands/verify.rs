use crate::commands::resolve_device_dir;
use crate::config::DEFAULT_BACKUP_FOLDER;
use crate::error::{BackupError, Result};
use crate::manifest::{JsonManifestStore, ManifestStore};
use log::info;
use std::path::PathBuf;

pub fn verify(target: PathBuf, device_name: Option<String>) -> Result<()> {
    let backup_root = target.join(DEFAULT_BACKUP_FOLDER);
    let device_dir = resolve_device_dir(&backup_root, device_name.as_deref())?;

    let store = JsonManifestStore::new(device_dir.clone());
    let manifest = store
        .load()
        .ok_or_else(|| BackupError::ManifestNotFound(device_dir.clone()))?;

    info!(
        "Verifying {} entries against {}",
        manifest.total_files(),
        device_dir.display()
    );
    let issues = store.verify(&manifest, &device_dir);

    if issues.is_empty() {
        println!(
            "✓ Verified {} files, no issues found",
            manifest.total_files()
        );
        return Ok(());
    }

    println!("✗ Verification found {} issue(s):", issues.len());
    for issue in &issues {
        println!("  {issue}");
    }
    Err(BackupError::Other(format!(
        "Verification failed with {} issue(s)",
        issues.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::backup;
    use assert_fs::prelude::*;
    use std::fs;

    fn run_backup(source: &assert_fs::fixture::ChildPath, medium: &assert_fs::fixture::ChildPath) {
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
    }

    #[test]
    fn test_verify_clean_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("source");
        let medium = temp.child("usb");
        source.child("a.txt").write_str("alpha").unwrap();
        medium.create_dir_all().unwrap();
        run_backup(&source, &medium);

        verify(medium.path().to_path_buf(), Some("laptop".to_string())).unwrap();
    }

    #[test]
    fn test_verify_detects_tampering() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = temp.child("source");
        let medium = temp.child("usb");
        source.child("a.txt").write_str("alpha").unwrap();
        medium.create_dir_all().unwrap();
        run_backup(&source, &medium);

        fs::remove_file(medium.child("Documents-Backup/laptop/a.txt").path()).unwrap();

        let result = verify(medium.path().to_path_buf(), Some("laptop".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_without_manifest_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        medium.child("Documents-Backup/laptop").create_dir_all().unwrap();

        let result = verify(medium.path().to_path_buf(), Some("laptop".to_string()));
        assert!(matches!(result, Err(BackupError::ManifestNotFound(_))));
    }
}
