use crate::archive;
use crate::commands::format_size;
use crate::config::BackupConfig;
use crate::engine::BackupEngine;
use crate::error::{BackupError, Result};
use crate::identity;
use log::info;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub fn backup(
    source: PathBuf,
    target: PathBuf,
    device_name: Option<String>,
    exclude: Vec<String>,
    no_manifest: bool,
    hash: bool,
    workers: Option<usize>,
    dry_run: bool,
    prune_deleted: bool,
    compress: bool,
) -> Result<()> {
    let mut config = BackupConfig::new(source, target);
    config.device_name = device_name
        .map(|name| identity::sanitize_device_name(&name))
        .unwrap_or_else(identity::device_name);
    config.exclusions.extend(exclude);
    config.use_manifest = !no_manifest;
    config.use_hash = hash;
    config.dry_run = dry_run;
    config.prune_deleted = prune_deleted;
    if let Some(workers) = workers {
        config.max_workers = workers.max(1);
    }

    info!(
        "Backing up {} to {} (device: {})",
        config.source_path.display(),
        config.device_target().display(),
        config.device_name
    );

    let report = BackupEngine::new(config.clone()).run();

    let heading = if dry_run {
        "✓ Dry run complete (nothing written)"
    } else {
        "✓ Backup complete"
    };
    println!("{heading}");
    println!(
        "  Files:     {} total, {} copied, {} updated, {} skipped",
        report.total_files, report.copied_files, report.updated_files, report.skipped_files
    );
    if report.deleted_files > 0 {
        println!("  Deleted:   {}", report.deleted_files);
    }
    println!("  Copied:    {}", format_size(report.copied_size));
    println!(
        "  Duration:  {:.1}s ({:.1} MB/s)",
        report.duration_secs(),
        report.speed_mbps()
    );
    if report.errors > 0 {
        println!("  Errors:    {}", report.errors);
        return Err(BackupError::Other(format!(
            "Backup finished with {} error(s), see log output",
            report.errors
        )));
    }

    if compress && !dry_run {
        let device_target = config.device_target();
        let (archive_path, file_count) =
            archive::compress_device_folder(&config.backup_root(), &device_target)?;
        println!("✓ Archived {} files to {}", file_count, archive_path.display());
    }

    Ok(())
}
