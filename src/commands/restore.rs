use crate::commands::{format_size, resolve_device_dir};
use crate::config::DEFAULT_BACKUP_FOLDER;
use crate::engine::{ConflictPolicy, RestoreEngine};
use crate::error::{BackupError, Result};
use log::info;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub fn restore(
    source: PathBuf,
    target: Option<PathBuf>,
    patterns: Vec<String>,
    overwrite: bool,
    newer: bool,
    device_name: Option<String>,
    dry_run: bool,
    list: bool,
    workers: Option<usize>,
) -> Result<()> {
    let backup_root = source.join(DEFAULT_BACKUP_FOLDER);
    let device_dir = resolve_device_dir(&backup_root, device_name.as_deref())?;
    info!("Restoring from device folder {}", device_dir.display());

    let mut engine = RestoreEngine::new(device_dir).with_target(target);
    if let Some(workers) = workers {
        engine = engine.with_workers(workers);
    }

    if list {
        let files = engine.list_files(&patterns)?;
        if files.is_empty() {
            println!("No restorable files found.");
            return Ok(());
        }
        println!("{:<12} File", "Size");
        for (relative_path, size) in &files {
            println!("{:<12} {relative_path}", format_size(*size));
        }
        println!("\n{} file(s) available for restore", files.len());
        return Ok(());
    }

    let policy = if overwrite {
        ConflictPolicy::Overwrite
    } else if newer {
        ConflictPolicy::Newer
    } else {
        ConflictPolicy::Skip
    };

    let report = engine.restore(&patterns, policy, dry_run);

    let heading = if dry_run {
        "✓ Dry run complete (nothing written)"
    } else {
        "✓ Restore complete"
    };
    println!("{heading}");
    println!(
        "  Files:     {} matched, {} restored, {} overwritten, {} skipped",
        report.total_files, report.restored_files, report.overwritten_files, report.skipped_files
    );
    println!("  Restored:  {}", format_size(report.restored_size));
    println!(
        "  Duration:  {:.1}s ({:.1} MB/s)",
        report.duration_secs(),
        report.speed_mbps()
    );
    if report.errors > 0 {
        println!("  Errors:    {}", report.errors);
        return Err(BackupError::Other(format!(
            "Restore finished with {} error(s), see log output",
            report.errors
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    #[test]
    fn test_restore_command_end_to_end() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        let restored = temp.child("restored");
        medium
            .child("Documents-Backup/laptop/a.txt")
            .write_str("alpha")
            .unwrap();

        restore(
            medium.path().to_path_buf(),
            Some(restored.path().to_path_buf()),
            vec![],
            false,
            false,
            Some("laptop".to_string()),
            false,
            false,
            Some(2),
        )
        .unwrap();

        restored.child("a.txt").assert(predicate::str::contains("alpha"));
    }

    #[test]
    fn test_restore_command_missing_device_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        medium.child("Documents-Backup").create_dir_all().unwrap();

        let result = restore(
            medium.path().to_path_buf(),
            Some(temp.path().join("restored")),
            vec![],
            false,
            false,
            Some("ghost".to_string()),
            false,
            false,
            None,
        );
        assert!(matches!(result, Err(BackupError::BackupDirNotFound(_))));
    }

    #[test]
    fn test_restore_command_list_mode() {
        let temp = assert_fs::TempDir::new().unwrap();
        let medium = temp.child("usb");
        medium
            .child("Documents-Backup/laptop/a.txt")
            .write_str("alpha")
            .unwrap();

        // List mode never writes to the target.
        let restored = temp.child("restored");
        restore(
            medium.path().to_path_buf(),
            Some(restored.path().to_path_buf()),
            vec![],
            false,
            false,
            Some("laptop".to_string()),
            false,
            true,
            None,
        )
        .unwrap();
        restored.assert(predicate::path::missing());
    }
}
