pub mod backup;
pub mod compress;
pub mod devices;
pub mod info;
pub mod restore;
pub mod verify;

pub use backup::backup;
pub use compress::compress;
pub use devices::devices;
pub use info::info;
pub use restore::restore;
pub use verify::verify;

use crate::error::{BackupError, Result};
use crate::identity;
use crate::manifest::MANIFEST_FILENAME;
use std::path::{Path, PathBuf};

/// Resolve the device-scoped backup folder under a backup root.
///
/// An explicit device name must exist. Without one, a manifest directly
/// under the root signals a legacy flat layout; otherwise this machine's
/// device subfolder is used when present, and the root itself as a last
/// resort.
pub fn resolve_device_dir(root: &Path, device: Option<&str>) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(BackupError::BackupDirNotFound(root.to_path_buf()));
    }

    if let Some(device) = device {
        let dir = root.join(identity::sanitize_device_name(device));
        if !dir.is_dir() {
            return Err(BackupError::BackupDirNotFound(dir));
        }
        return Ok(dir);
    }

    if root.join(MANIFEST_FILENAME).is_file() {
        return Ok(root.to_path_buf());
    }

    let own = root.join(identity::device_name());
    if own.is_dir() {
        return Ok(own);
    }

    Ok(root.to_path_buf())
}

/// Format a size in bytes to human-readable form.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_idx])
    }
}
