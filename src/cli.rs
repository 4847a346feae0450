use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devsave")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Back up a source directory onto a backup medium
    Backup {
        /// Source directory to back up
        #[arg(short, long)]
        source: PathBuf,
        /// Backup medium root (e.g. a mounted USB drive)
        #[arg(short, long)]
        target: PathBuf,
        /// Device name for the per-device subfolder (defaults to hostname)
        #[arg(long)]
        device_name: Option<String>,
        /// Extra exclusion patterns, in addition to the defaults
        #[arg(short, long)]
        exclude: Vec<String>,
        /// Disable manifest tracking and diff against the destination instead
        #[arg(long)]
        no_manifest: bool,
        /// Compare content digests in addition to size and mtime
        #[arg(long)]
        hash: bool,
        /// Number of parallel copy workers
        #[arg(short, long)]
        workers: Option<usize>,
        /// Show what would be copied without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Remove destination files whose source no longer exists
        #[arg(long)]
        prune_deleted: bool,
        /// Zip the device backup folder after a successful run
        #[arg(long)]
        compress: bool,
    },
    /// Restore files from a backup medium
    Restore {
        /// Backup medium root to restore from
        #[arg(short, long)]
        source: PathBuf,
        /// Directory to restore into (defaults to the recorded source)
        #[arg(short, long)]
        target: Option<PathBuf>,
        /// Only restore files matching these glob patterns
        #[arg(short, long)]
        pattern: Vec<String>,
        /// Replace files that already exist at the target
        #[arg(long, conflicts_with = "newer")]
        overwrite: bool,
        /// Replace existing files only when the backup copy is newer
        #[arg(long)]
        newer: bool,
        /// Device whose backup to restore (defaults to this machine)
        #[arg(long)]
        device_name: Option<String>,
        /// Show what would be restored without writing anything
        #[arg(long)]
        dry_run: bool,
        /// List restorable files instead of restoring
        #[arg(long)]
        list: bool,
        /// Number of parallel copy workers
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Check backed-up files against the manifest
    Verify {
        /// Backup medium root
        #[arg(short, long)]
        target: PathBuf,
        /// Device whose backup to verify (defaults to this machine)
        #[arg(long)]
        device_name: Option<String>,
    },
    /// Show manifest details for a backup
    Info {
        /// Backup medium root
        #[arg(short, long)]
        target: PathBuf,
        /// Device whose backup to inspect (defaults to this machine)
        #[arg(long)]
        device_name: Option<String>,
    },
    /// List device backups present on a medium
    Devices {
        /// Backup medium root
        #[arg(short, long)]
        target: PathBuf,
    },
    /// Zip a device backup folder for cold storage
    Compress {
        /// Backup medium root
        #[arg(short, long)]
        target: PathBuf,
        /// Device whose backup to compress (defaults to this machine)
        #[arg(long)]
        device_name: Option<String>,
        /// Archive format (only zip is supported)
        #[arg(long, default_value = "zip")]
        format: String,
        /// Delete the device folder after a successful compression
        #[arg(long)]
        remove_source: bool,
    },
}
