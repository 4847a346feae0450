//! Exclusion rules for development artifacts.

use glob::{MatchOptions, Pattern};
use log::warn;
use std::collections::BTreeSet;
use std::path::Path;

/// Pure predicate deciding whether a path is excluded from the backup.
///
/// Matching order (first match wins, case-insensitive on the name):
/// exact name, file extension, glob pattern, then structural virtual
/// environment detection. Excluded directories are pruned along with their
/// entire subtree by the scanner.
pub struct ExclusionFilter {
    exact_matches: BTreeSet<String>,
    patterns: Vec<Pattern>,
    excluded_extensions: BTreeSet<String>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Marker paths whose existence identifies a virtual environment directory.
const VENV_MARKERS: &[&[&str]] = &[
    &["pyvenv.cfg"],
    &["Scripts", "activate"],
    &["bin", "activate"],
    &["Scripts", "python.exe"],
    &["bin", "python"],
    &["lib", "python3"],
];

impl ExclusionFilter {
    /// Build a filter from name/glob exclusions and an extension list.
    ///
    /// Entries containing `*` or `?` are compiled as glob patterns; the rest
    /// are exact name matches. Invalid patterns are skipped with a warning.
    pub fn new(exclusions: &BTreeSet<String>, excluded_extensions: &BTreeSet<String>) -> Self {
        let mut exact_matches = BTreeSet::new();
        let mut patterns = Vec::new();

        for excl in exclusions {
            if excl.contains('*') || excl.contains('?') {
                match Pattern::new(excl) {
                    Ok(pattern) => patterns.push(pattern),
                    Err(e) => warn!("Ignoring invalid exclusion pattern {excl}: {e}"),
                }
            } else {
                exact_matches.insert(excl.to_lowercase());
            }
        }

        let excluded_extensions = excluded_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        Self {
            exact_matches,
            patterns,
            excluded_extensions,
        }
    }

    /// Returns the exclusion reason, or `None` when the path is included.
    pub fn should_exclude(&self, path: &Path) -> Option<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if self.exact_matches.contains(&name) {
            return Some(format!("Exact match: {name}"));
        }

        // Extensions only apply to files.
        if !path.is_dir() {
            if let Some(ext) = path.extension() {
                let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
                if self.excluded_extensions.contains(&dotted) {
                    return Some(format!("Excluded extension: {dotted}"));
                }
            }
        }

        for pattern in &self.patterns {
            if pattern.matches_with(&name, MATCH_OPTIONS) {
                return Some(format!("Pattern match: {}", pattern.as_str()));
            }
        }

        if is_virtual_env(path) {
            return Some("Virtual environment detected".to_string());
        }

        None
    }
}

/// Structural virtual environment detection: existence-only check for a
/// fixed set of marker paths, no content inspection.
fn is_virtual_env(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }

    VENV_MARKERS.iter().any(|marker| {
        let mut candidate = path.to_path_buf();
        for part in *marker {
            candidate.push(part);
        }
        candidate.exists()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn filter(exclusions: &[&str], extensions: &[&str]) -> ExclusionFilter {
        let exclusions = exclusions.iter().map(|s| s.to_string()).collect();
        let extensions = extensions.iter().map(|s| s.to_string()).collect();
        ExclusionFilter::new(&exclusions, &extensions)
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let f = filter(&["node_modules"], &[]);
        assert!(f
            .should_exclude(Path::new("/project/NODE_MODULES"))
            .is_some());
        assert!(f.should_exclude(Path::new("/project/src")).is_none());
    }

    #[test]
    fn test_extension_match() {
        let f = filter(&[], &[".pyc"]);
        assert!(f.should_exclude(Path::new("/project/mod.PYC")).is_some());
        assert!(f.should_exclude(Path::new("/project/mod.py")).is_none());
    }

    #[test]
    fn test_extension_does_not_apply_to_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        let dir = temp.child("release.log");
        dir.create_dir_all().unwrap();

        let f = filter(&[], &[".log"]);
        assert!(f.should_exclude(dir.path()).is_none());
    }

    #[test]
    fn test_glob_pattern_match() {
        let f = filter(&["*.egg-info", "~*"], &[]);
        assert!(f
            .should_exclude(Path::new("/p/devsave.egg-info"))
            .is_some());
        assert!(f.should_exclude(Path::new("/p/~lockfile")).is_some());
        assert!(f.should_exclude(Path::new("/p/readme.md")).is_none());
    }

    #[test]
    fn test_virtual_env_detection() {
        let temp = assert_fs::TempDir::new().unwrap();
        let venv = temp.child("my-custom-env");
        venv.child("pyvenv.cfg").touch().unwrap();

        let f = filter(&[], &[]);
        let reason = f.should_exclude(venv.path());
        assert_eq!(reason.as_deref(), Some("Virtual environment detected"));
    }

    #[test]
    fn test_venv_detection_via_bin_activate() {
        let temp = assert_fs::TempDir::new().unwrap();
        let venv = temp.child("tooling");
        venv.child("bin/activate").touch().unwrap();

        let f = filter(&[], &[]);
        assert!(f.should_exclude(venv.path()).is_some());
    }

    #[test]
    fn test_should_exclude_is_pure() {
        let f = filter(&["node_modules", "*.tmp"], &[".pyc"]);
        let path = Path::new("/project/node_modules");
        assert_eq!(f.should_exclude(path), f.should_exclude(path));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        // "[" is not a valid glob pattern; the filter must still be usable.
        let f = filter(&["[*", "node_modules"], &[]);
        assert!(f.should_exclude(Path::new("/p/node_modules")).is_some());
    }
}
