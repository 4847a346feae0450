//! Device identification for multi-device backup targets.
//!
//! The sanitized hostname keys the per-device subfolder on a shared drive, so
//! it must be stable and filesystem-safe on every platform.

pub const FALLBACK_DEVICE_NAME: &str = "unknown-device";

/// Filesystem-safe identifier for the current device, derived from the
/// system hostname.
pub fn device_name() -> String {
    let raw = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_device_name(&raw)
}

/// Sanitize a raw hostname into a directory-name-safe identifier.
///
/// Strips the domain suffix (macOS appends ".local", corporate machines may
/// carry FQDNs), maps anything outside alphanumerics, hyphen and underscore
/// to a hyphen, collapses hyphen runs, and falls back to a fixed placeholder
/// when nothing is left.
pub fn sanitize_device_name(raw: &str) -> String {
    let stem = raw.split('.').next().unwrap_or("");

    let mut sanitized = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_alphanumeric() || c == '_' {
            sanitized.push(c);
        } else if !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }

    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_DEVICE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
