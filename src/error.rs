use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Source directory does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("Source path is not a directory: {0}")]
    SourceNotDirectory(PathBuf),

    #[error("Backup medium not found: {0}")]
    TargetNotFound(PathBuf),

    #[error("No write permission on backup medium {path}: {source}")]
    TargetNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup directory not found: {0}")]
    BackupDirNotFound(PathBuf),

    #[error("No target path specified and no manifest source found")]
    NoRestoreTarget,

    #[error("No manifest found in backup directory: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Unsupported archive format: {0} (supported: zip)")]
    UnsupportedArchiveFormat(String),

    #[error("Invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
